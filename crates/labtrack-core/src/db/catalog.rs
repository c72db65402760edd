//! Catalog database operations.

use rusqlite::types::Type;
use rusqlite::{params, Row};
use serde_json::Number;

use super::{CatalogSource, Database, DbResult};
use crate::models::CatalogEntry;

const CATALOG_COLUMNS: &str = "catalog_id, name, department, price, unit, reference_range";

const UPSERT_CATALOG_SQL: &str = r#"
    INSERT INTO test_catalog (
        catalog_id, name, department, price, unit, reference_range, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
    ON CONFLICT(catalog_id) DO UPDATE SET
        name = excluded.name,
        department = excluded.department,
        price = excluded.price,
        unit = excluded.unit,
        reference_range = excluded.reference_range,
        updated_at = datetime('now')
"#;

impl Database {
    /// Insert or update a catalog entry.
    pub fn upsert_catalog_entry(&self, entry: &CatalogEntry) -> DbResult<()> {
        self.conn.execute(
            UPSERT_CATALOG_SQL,
            params![
                entry.id,
                entry.name,
                entry.department,
                price_to_sql(entry),
                entry.unit,
                entry.reference_range,
            ],
        )?;
        Ok(())
    }

    /// Upsert many entries in one transaction.
    pub fn import_catalog(&mut self, entries: &[CatalogEntry]) -> DbResult<usize> {
        let tx = self.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT_CATALOG_SQL)?;
            for entry in entries {
                stmt.execute(params![
                    entry.id,
                    entry.name,
                    entry.department,
                    price_to_sql(entry),
                    entry.unit,
                    entry.reference_range,
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }
}

impl CatalogSource for Database {
    fn read_all(&self) -> DbResult<Vec<CatalogEntry>> {
        let sql = format!("SELECT {CATALOG_COLUMNS} FROM test_catalog ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], catalog_entry_from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

fn catalog_entry_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        price: price_from_sql(row.get(3)?)?,
        unit: row.get(4)?,
        reference_range: row.get(5)?,
    })
}

fn price_to_sql(entry: &CatalogEntry) -> Option<String> {
    entry.price.as_ref().map(Number::to_string)
}

fn price_from_sql(raw: Option<String>) -> rusqlite::Result<Option<Number>> {
    raw.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))
    })
    .transpose()
}
