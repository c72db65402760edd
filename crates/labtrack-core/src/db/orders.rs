//! Order database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{decode_timestamp, encode_timestamp, Database, DbError, DbResult, OrderRecord, OrderRepository};
use crate::models::{Order, OrderCursor, OrderIdentifier, TestLineItem};

impl Database {
    /// Get an order by its store key.
    pub fn get_order(&self, order_key: &str) -> DbResult<Option<Order>> {
        self.conn
            .query_row(
                r#"
                SELECT order_key, order_id, tests, attributes, created_at
                FROM orders
                WHERE order_key = ?
                "#,
                [order_key],
                order_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List orders carrying an identifier (normally zero or one).
    pub fn find_orders_by_identifier(&self, order_id: &str) -> DbResult<Vec<Order>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT order_key, order_id, tests, attributes, created_at
            FROM orders
            WHERE order_id = ?
            ORDER BY rowid
            "#,
        )?;
        let rows = stmt.query_map([order_id], order_row)?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?.try_into()?);
        }
        Ok(orders)
    }

    /// Count all orders.
    pub fn count_orders(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Overwrite the raw JSON of an order's tests column.
    ///
    /// Bypasses the line item model; used to load legacy data.
    pub fn put_raw_tests(&self, order_key: &str, tests_json: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE orders SET tests = ?2, updated_at = datetime('now') WHERE order_key = ?1",
            params![order_key, tests_json],
        )?;
        Ok(rows_affected > 0)
    }
}

impl OrderRepository for Database {
    fn latest_order_id_between(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> DbResult<Option<OrderIdentifier>> {
        let order_id: Option<String> = self
            .conn
            .query_row(
                r#"
                SELECT order_id
                FROM orders
                WHERE created_at >= ?1 AND created_at < ?2
                ORDER BY created_at DESC, rowid DESC
                LIMIT 1
                "#,
                params![encode_timestamp(start), encode_timestamp(end)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(order_id.map(OrderIdentifier::from))
    }

    fn order_page(&self, after: OrderCursor, limit: usize) -> DbResult<Vec<OrderRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT rowid, order_key, order_id, tests, attributes, created_at
            FROM orders
            WHERE rowid > ?1
            ORDER BY rowid
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![after.0, limit as i64], |row| {
            Ok((
                OrderCursor(row.get(0)?),
                OrderRow {
                    order_key: row.get(1)?,
                    order_id: row.get(2)?,
                    tests: row.get(3)?,
                    attributes: row.get(4)?,
                    created_at: row.get(5)?,
                },
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (cursor, row) = row?;
            records.push(OrderRecord {
                cursor,
                order_key: row.order_key.clone(),
                order: row.try_into(),
            });
        }
        Ok(records)
    }

    fn update_order_tests(&self, order_key: &str, tests: &[TestLineItem]) -> DbResult<bool> {
        let tests_json = serde_json::to_string(tests)?;
        let rows_affected = self.conn.execute(
            "UPDATE orders SET tests = ?2, updated_at = datetime('now') WHERE order_key = ?1",
            params![order_key, tests_json],
        )?;
        Ok(rows_affected > 0)
    }

    fn insert_order(&self, order: &Order) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO orders (order_key, order_id, tests, attributes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                order.order_key,
                order.order_id.as_str(),
                serde_json::to_string(&order.tests)?,
                serde_json::to_string(&order.attributes)?,
                encode_timestamp(&order.created_at),
            ],
        )?;
        Ok(())
    }

    fn insert_order_if_absent(&self, order: &Order) -> DbResult<bool> {
        // Single statement, so the existence check and the insert are atomic
        let rows_affected = self.conn.execute(
            r#"
            INSERT INTO orders (order_key, order_id, tests, attributes, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE NOT EXISTS (SELECT 1 FROM orders WHERE order_id = ?2)
            "#,
            params![
                order.order_key,
                order.order_id.as_str(),
                serde_json::to_string(&order.tests)?,
                serde_json::to_string(&order.attributes)?,
                encode_timestamp(&order.created_at),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    fn next_ticket(&self, day: &str, floor: u32) -> DbResult<u32> {
        let ticket: i64 = self.conn.query_row(
            r#"
            INSERT INTO order_counters (day, last_sequence, updated_at)
            VALUES (?1, ?2 + 1, datetime('now'))
            ON CONFLICT(day) DO UPDATE SET
                last_sequence = MAX(last_sequence, ?2) + 1,
                updated_at = datetime('now')
            RETURNING last_sequence
            "#,
            params![day, floor],
            |row| row.get(0),
        )?;
        u32::try_from(ticket)
            .map_err(|_| DbError::OutOfRange(format!("ticket {ticket} for {day}")))
    }
}

/// Intermediate row struct for database mapping.
struct OrderRow {
    order_key: String,
    order_id: String,
    tests: String,
    attributes: String,
    created_at: String,
}

fn order_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderRow> {
    Ok(OrderRow {
        order_key: row.get(0)?,
        order_id: row.get(1)?,
        tests: row.get(2)?,
        attributes: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            order_key: row.order_key,
            order_id: OrderIdentifier::from(row.order_id),
            tests: serde_json::from_str(&row.tests)?,
            attributes: serde_json::from_str(&row.attributes)?,
            created_at: decode_timestamp(&row.created_at)?,
        })
    }
}
