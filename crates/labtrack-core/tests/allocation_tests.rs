//! Identifier allocation against a real SQLite store, including concurrent
//! creators.

use std::collections::HashSet;
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use labtrack_core::db::{DbResult, OrderRecord};
use labtrack_core::{
    AllocationStrategy, AllocatorConfig, Database, NewOrder, Order, OrderBook, OrderCursor,
    OrderIdentifier, OrderRepository, SequenceAllocator, TestLineItem,
};

fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 7, 9, 0, 0).unwrap() + Duration::minutes(minute)
}

fn config(strategy: AllocationStrategy) -> AllocatorConfig {
    AllocatorConfig {
        prefix: "LAB".into(),
        strategy,
    }
}

/// Serves a fixed "latest order" regardless of what has been inserted since,
/// like a creator that read the store just before a competitor inserted.
struct StaleReads<'a> {
    db: &'a Database,
    latest: Option<OrderIdentifier>,
}

impl OrderRepository for StaleReads<'_> {
    fn latest_order_id_between(
        &self,
        _start: &DateTime<Utc>,
        _end: &DateTime<Utc>,
    ) -> DbResult<Option<OrderIdentifier>> {
        Ok(self.latest.clone())
    }

    fn order_page(&self, after: OrderCursor, limit: usize) -> DbResult<Vec<OrderRecord>> {
        self.db.order_page(after, limit)
    }

    fn update_order_tests(&self, order_key: &str, tests: &[TestLineItem]) -> DbResult<bool> {
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

#[test]
fn test_sequential_allocations_count_up() {
    let db = Database::open_in_memory().unwrap();
    let book = OrderBook::new(&db, config(AllocationStrategy::ReadLatest));

    for i in 1..=12 {
        let order = book
            .create_order_in(NewOrder::new(vec![]).created_at(at(i)), &Utc)
            .unwrap();
        assert_eq!(order.order_id.as_str(), format!("LAB-2024-03-07-{:03}", i));
    }
}

#[test]
fn test_new_day_restarts_at_one() {
    let db = Database::open_in_memory().unwrap();
    let book = OrderBook::new(&db, config(AllocationStrategy::default()));

    book.create_order_in(NewOrder::new(vec![]).created_at(at(0)), &Utc)
        .unwrap();
    book.create_order_in(NewOrder::new(vec![]).created_at(at(1)), &Utc)
        .unwrap();
    let next_day = book
        .create_order_in(
            NewOrder::new(vec![]).created_at(at(0) + Duration::days(1)),
            &Utc,
        )
        .unwrap();

    assert_eq!(next_day.order_id.as_str(), "LAB-2024-03-08-001");
}

#[test]
fn test_sequence_past_width_is_not_truncated() {
    let db = Database::open_in_memory().unwrap();
    let order = NewOrder::new(vec![])
        .created_at(at(0))
        .into_order("LAB-2024-03-07-999".into());
    db.insert_order(&order).unwrap();

    let allocator = SequenceAllocator::new(&db, "LAB");
    assert_eq!(allocator.allocate_at(&at(1)).as_str(), "LAB-2024-03-07-1000");
}

#[test]
fn test_read_latest_race_duplicates_identifier() {
    // Both creators read before either inserts
    let db = Database::open_in_memory().unwrap();
    let allocator = SequenceAllocator::new(&db, "LAB");

    let first = allocator.allocate_at(&at(0));
    let second = allocator.allocate_at(&at(0));
    assert_eq!(first, second);

    db.insert_order(&NewOrder::new(vec![]).created_at(at(0)).into_order(first))
        .unwrap();
    db.insert_order(&NewOrder::new(vec![]).created_at(at(0)).into_order(second))
        .unwrap();
    assert_eq!(db.find_orders_by_identifier("LAB-2024-03-07-001").unwrap().len(), 2);
}

#[test]
fn test_compare_and_swap_survives_stale_read() {
    let db = Database::open_in_memory().unwrap();
    OrderBook::new(&db, config(AllocationStrategy::ReadLatest))
        .create_order_in(NewOrder::new(vec![]).created_at(at(0)), &Utc)
        .unwrap();

    // A competitor inserts 002 after our creator already read 001 as latest
    let stale = StaleReads {
        db: &db,
        latest: Some("LAB-2024-03-07-001".into()),
    };
    OrderBook::new(&stale, config(AllocationStrategy::ReadLatest))
        .create_order_in(NewOrder::new(vec![]).created_at(at(1)), &Utc)
        .unwrap();

    let order = OrderBook::new(&stale, config(AllocationStrategy::default()))
        .create_order_in(NewOrder::new(vec![]).created_at(at(2)), &Utc)
        .unwrap();

    assert_eq!(order.order_id.as_str(), "LAB-2024-03-07-003");
    assert_eq!(db.find_orders_by_identifier("LAB-2024-03-07-002").unwrap().len(), 1);
}

#[test]
fn test_ticket_survives_stale_read() {
    let db = Database::open_in_memory().unwrap();
    let stale = StaleReads {
        db: &db,
        latest: None,
    };
    let book = OrderBook::new(&stale, config(AllocationStrategy::Ticket));

    let first = book
        .create_order_in(NewOrder::new(vec![]).created_at(at(0)), &Utc)
        .unwrap();
    let second = book
        .create_order_in(NewOrder::new(vec![]).created_at(at(1)), &Utc)
        .unwrap();

    assert_eq!(first.order_id.as_str(), "LAB-2024-03-07-001");
    assert_eq!(second.order_id.as_str(), "LAB-2024-03-07-002");
}

fn create_concurrently(strategy: AllocationStrategy) -> Vec<String> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.db");
    Database::open(&path).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                let book = OrderBook::new(&db, config(strategy));
                (0..10)
                    .map(|_| {
                        book.create_order_in(NewOrder::new(vec![]).created_at(at(0)), &Utc)
                            .unwrap()
                            .order_id
                            .to_string()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect()
}

#[test]
fn test_concurrent_ticket_identifiers_are_unique() {
    let ids = create_concurrently(AllocationStrategy::Ticket);
    let unique: HashSet<_> = ids.iter().collect();

    assert_eq!(ids.len(), 40);
    assert_eq!(unique.len(), 40);
    assert!(ids.iter().all(|id| id.starts_with("LAB-2024-03-07-")));
}

#[test]
fn test_concurrent_compare_and_swap_identifiers_are_unique() {
    let ids = create_concurrently(AllocationStrategy::CompareAndSwap { max_attempts: 50 });
    let unique: HashSet<_> = ids.iter().collect();

    assert_eq!(ids.len(), 40);
    assert_eq!(unique.len(), 40);
}
