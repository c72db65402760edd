//! End-to-end normalization sweeps over a SQLite store.

use chrono::{DateTime, Utc};
use labtrack_core::db::{DbError, DbResult, MigrationCheckpoint, OrderRecord};
use labtrack_core::migration::CHECKPOINT_NAME;
use labtrack_core::{
    CatalogEntry, CatalogSource, CheckpointStore, Database, MigrationConfig, MigrationError,
    MigrationRunner, NewOrder, Order, OrderCursor, OrderIdentifier, OrderRepository,
    TestLineItem,
};
use serde_json::{json, Value};

fn seeded() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.upsert_catalog_entry(&CatalogEntry {
        id: "hgb-01".into(),
        name: "Hemoglobin".into(),
        department: "Hematology".into(),
        price: serde_json::Number::from_f64(8.5),
        unit: Some("g/dL".into()),
        reference_range: Some("12.0-15.5".into()),
    })
    .unwrap();
    db
}

fn add_order(db: &Database, tests: Value) -> Order {
    let tests: Vec<TestLineItem> = serde_json::from_value(tests).unwrap();
    let order = NewOrder::new(tests)
        .with_attribute("patient", json!("P-0042"))
        .into_order(OrderIdentifier::fallback("LAB", Utc::now()));
    db.insert_order(&order).unwrap();
    order
}

fn stored_tests(db: &Database, order: &Order) -> Value {
    let stored = db.get_order(&order.order_key).unwrap().unwrap();
    serde_json::to_value(&stored.tests).unwrap()
}

/// Delegates to a real database, failing selected operations.
#[derive(Default)]
struct Faults {
    catalog: bool,
    pages_after: Option<OrderCursor>,
    updates: bool,
}

struct FaultyStore<'a> {
    db: &'a Database,
    faults: Faults,
}

fn injected() -> DbError {
    DbError::NotFound("injected fault".into())
}

impl OrderRepository for FaultyStore<'_> {
    fn latest_order_id_between(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> DbResult<Option<OrderIdentifier>> {
        self.db.latest_order_id_between(start, end)
    }

    fn order_page(&self, after: OrderCursor, limit: usize) -> DbResult<Vec<OrderRecord>> {
        match self.faults.pages_after {
            Some(limit_cursor) if after >= limit_cursor => Err(injected()),
            _ => self.db.order_page(after, limit),
        }
    }

    fn update_order_tests(&self, order_key: &str, tests: &[TestLineItem]) -> DbResult<bool> {
        if self.faults.updates {
            return Err(injected());
        }
        self.db.update_order_tests(order_key, tests)
    }

    fn insert_order(&self, order: &Order) -> DbResult<()> {
        self.db.insert_order(order)
    }

    fn insert_order_if_absent(&self, order: &Order) -> DbResult<bool> {
        self.db.insert_order_if_absent(order)
    }

    fn next_ticket(&self, day: &str, floor: u32) -> DbResult<u32> {
        self.db.next_ticket(day, floor)
    }
}

impl CatalogSource for FaultyStore<'_> {
    fn read_all(&self) -> DbResult<Vec<CatalogEntry>> {
        if self.faults.catalog {
            return Err(injected());
        }
        self.db.read_all()
    }
}

impl CheckpointStore for FaultyStore<'_> {
    fn load_checkpoint(&self, name: &str) -> DbResult<Option<MigrationCheckpoint>> {
        self.db.load_checkpoint(name)
    }

    fn save_checkpoint(&self, name: &str, checkpoint: &MigrationCheckpoint) -> DbResult<()> {
        self.db.save_checkpoint(name, checkpoint)
    }

    fn clear_checkpoint(&self, name: &str) -> DbResult<()> {
        self.db.clear_checkpoint(name)
    }
}

#[test]
fn test_mixed_order_is_normalized() {
    let db = seeded();
    let order = add_order(&db, json!(["Hemoglobin", "Unknown"]));

    let report = MigrationRunner::new(&db, MigrationConfig::default())
        .run()
        .unwrap();

    assert_eq!(report.orders_scanned, 1);
    assert_eq!(report.orders_updated, 1);
    assert_eq!(report.summary_line(), "Done. Updated 1 orders.");
    assert_eq!(
        stored_tests(&db, &order),
        json!([
            {
                "id": "hgb-01",
                "name": "Hemoglobin",
                "department": "Hematology",
                "price": 8.5,
                "unit": "g/dL",
                "referenceRange": "12.0-15.5"
            },
            "Unknown"
        ])
    );

    // Other order fields are untouched
    let stored = db.get_order(&order.order_key).unwrap().unwrap();
    assert_eq!(stored.order_id, order.order_id);
    assert_eq!(stored.attributes["patient"], json!("P-0042"));
}

#[test]
fn test_rerun_updates_nothing() {
    let db = seeded();
    add_order(&db, json!(["Hemoglobin"]));
    add_order(&db, json!([{"name": "Hemoglobin", "result": 13.2}]));

    let first = MigrationRunner::new(&db, MigrationConfig::default())
        .run()
        .unwrap();
    let second = MigrationRunner::new(&db, MigrationConfig::default())
        .run()
        .unwrap();

    assert_eq!(first.orders_updated, 2);
    assert_eq!(second.orders_scanned, 2);
    assert_eq!(second.orders_updated, 0);
}

#[test]
fn test_empty_store() {
    let db = seeded();
    let report = MigrationRunner::new(&db, MigrationConfig::default())
        .run()
        .unwrap();

    assert_eq!(report.orders_scanned, 0);
    assert_eq!(report.summary_line(), "Done. Updated 0 orders.");
}

#[test]
fn test_catalog_failure_is_fatal() {
    let db = seeded();
    let order = add_order(&db, json!(["Hemoglobin"]));
    let store = FaultyStore {
        db: &db,
        faults: Faults {
            catalog: true,
            ..Default::default()
        },
    };

    let result = MigrationRunner::new(&store, MigrationConfig::default()).run();

    assert!(matches!(result, Err(MigrationError::CatalogUnavailable(_))));
    assert_eq!(stored_tests(&db, &order), json!(["Hemoglobin"]));
}

#[test]
fn test_failed_writes_are_counted_and_retried() {
    let db = seeded();
    let order = add_order(&db, json!(["Hemoglobin"]));
    let store = FaultyStore {
        db: &db,
        faults: Faults {
            updates: true,
            ..Default::default()
        },
    };

    let report = MigrationRunner::new(&store, MigrationConfig::default())
        .run()
        .unwrap();
    assert_eq!(report.orders_failed, 1);
    assert_eq!(report.orders_updated, 0);
    assert!(!report.is_clean());

    let retry = MigrationRunner::new(&db, MigrationConfig::default())
        .run()
        .unwrap();
    assert_eq!(retry.orders_updated, 1);
    assert!(stored_tests(&db, &order)[0]["department"].is_string());
}

#[test]
fn test_malformed_orders_are_skipped() {
    let db = seeded();
    let broken = add_order(&db, json!([]));
    db.put_raw_tests(&broken.order_key, "[42]").unwrap();
    let garbage = add_order(&db, json!([]));
    db.put_raw_tests(&garbage.order_key, "not json").unwrap();
    let good = add_order(&db, json!(["Hemoglobin"]));

    let report = MigrationRunner::new(&db, MigrationConfig::default())
        .run()
        .unwrap();

    assert_eq!(report.orders_scanned, 3);
    assert_eq!(report.orders_malformed, 2);
    assert_eq!(report.orders_updated, 1);
    assert!(stored_tests(&db, &good)[0]["department"].is_string());
}

#[test]
fn test_interrupted_run_resumes_from_checkpoint() {
    let db = seeded();
    let orders: Vec<Order> = (0..5).map(|_| add_order(&db, json!(["Hemoglobin"]))).collect();

    // The scan breaks off once the first page of two has been handled
    let first_page_end = db.order_page(OrderCursor::START, 2).unwrap()[1].cursor;
    let store = FaultyStore {
        db: &db,
        faults: Faults {
            pages_after: Some(first_page_end),
            ..Default::default()
        },
    };
    let config = MigrationConfig {
        page_size: 2,
        ..Default::default()
    };

    let interrupted = MigrationRunner::new(&store, config.clone()).run();
    assert!(matches!(
        interrupted,
        Err(MigrationError::Scan { scanned: 2, .. })
    ));
    let checkpoint = db.load_checkpoint(CHECKPOINT_NAME).unwrap().unwrap();
    assert_eq!(checkpoint.cursor, first_page_end);
    assert_eq!(checkpoint.orders_updated, 2);

    let resumed = MigrationRunner::new(
        &db,
        MigrationConfig {
            resume: true,
            ..config
        },
    )
    .run()
    .unwrap();

    assert_eq!(resumed.resumed_from, Some(first_page_end));
    assert_eq!(resumed.orders_scanned, 5);
    assert_eq!(resumed.orders_updated, 5);
    assert!(db.load_checkpoint(CHECKPOINT_NAME).unwrap().is_none());
    for order in &orders {
        assert!(stored_tests(&db, order)[0]["department"].is_string());
    }
}

#[test]
fn test_resume_without_checkpoint_starts_over() {
    let db = seeded();
    add_order(&db, json!(["Hemoglobin"]));

    let config = MigrationConfig {
        resume: true,
        ..Default::default()
    };
    let report = MigrationRunner::new(&db, config).run().unwrap();

    assert_eq!(report.resumed_from, None);
    assert_eq!(report.orders_updated, 1);
}

#[test]
fn test_dry_run_reports_without_writing() {
    let db = seeded();
    let order = add_order(&db, json!(["Hemoglobin", "Hemoglobn"]));

    let config = MigrationConfig {
        dry_run: true,
        ..Default::default()
    };
    let report = MigrationRunner::new(&db, config).run().unwrap();

    assert_eq!(report.orders_updated, 1);
    assert_eq!(report.unresolved["Hemoglobn"], 1);
    assert_eq!(stored_tests(&db, &order), json!(["Hemoglobin", "Hemoglobn"]));
}
