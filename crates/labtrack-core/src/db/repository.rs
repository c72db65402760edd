//! Store boundary used by the allocator and the migration runner.

use chrono::{DateTime, Utc};

use super::{DbResult, MigrationCheckpoint};
use crate::models::{CatalogEntry, Order, OrderCursor, OrderIdentifier, TestLineItem};

/// One row of an order page.
///
/// Rows whose stored JSON cannot be decoded still carry their key and
/// cursor, so a sweep can report them and move on.
#[derive(Debug)]
pub struct OrderRecord {
    pub cursor: OrderCursor,
    pub order_key: String,
    pub order: DbResult<Order>,
}

/// Reads and writes of orders.
pub trait OrderRepository {
    /// Identifier of the most recently created order with
    /// `start <= created_at < end`.
    fn latest_order_id_between(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> DbResult<Option<OrderIdentifier>>;

    /// Up to `limit` orders positioned strictly after `after`, in cursor order.
    fn order_page(&self, after: OrderCursor, limit: usize) -> DbResult<Vec<OrderRecord>>;

    /// Replace only the line items of an order. Returns false if no order
    /// has that key.
    fn update_order_tests(&self, order_key: &str, tests: &[TestLineItem]) -> DbResult<bool>;

    /// Insert an order unconditionally.
    fn insert_order(&self, order: &Order) -> DbResult<()>;

    /// Insert an order unless another order already holds its identifier.
    /// Returns false on conflict.
    fn insert_order_if_absent(&self, order: &Order) -> DbResult<bool>;

    /// Atomically take the next ticket for `day`.
    ///
    /// `floor` is the highest sequence already known to be in use; the
    /// returned ticket is always greater than both `floor` and every ticket
    /// handed out before.
    fn next_ticket(&self, day: &str, floor: u32) -> DbResult<u32>;
}

/// Read access to the test catalog.
pub trait CatalogSource {
    /// Every catalog entry, in insertion order.
    fn read_all(&self) -> DbResult<Vec<CatalogEntry>>;
}

/// Persistence for migration checkpoints.
pub trait CheckpointStore {
    fn load_checkpoint(&self, name: &str) -> DbResult<Option<MigrationCheckpoint>>;

    fn save_checkpoint(&self, name: &str, checkpoint: &MigrationCheckpoint) -> DbResult<()>;

    fn clear_checkpoint(&self, name: &str) -> DbResult<()>;
}
