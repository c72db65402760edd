//! LabTrack Core Library
//!
//! Same-day order identifier allocation and lab test record normalization
//! over a SQLite order store.
//!
//! # Architecture
//!
//! ```text
//!  create order ──► SequenceAllocator ──► OrderBook ──► orders
//!                    (read latest /        (insert,         │
//!                     CAS / ticket)         retry)          │
//!                                                           ▼
//!  test_catalog ──► CatalogIndex ──────► MigrationRunner ◄── OrderStream
//!                    (name → entry)        │
//!                                          ├─► normalize(tests)
//!                                          ├─► update_order_tests
//!                                          └─► migration_state checkpoint
//! ```
//!
//! # Core Principle
//!
//! **Normalization is idempotent.** A sweep can be interrupted and re-run at
//! any point without changing already-normalized orders.
//!
//! # Modules
//!
//! - [`db`]: SQLite store, repository traits and order paging
//! - [`models`]: Domain types (Order, TestLineItem, CatalogEntry, OrderIdentifier)
//! - [`sequence`]: Per-day identifier allocation and order creation
//! - [`normalize`]: Catalog index and line item normalization
//! - [`migration`]: Resumable normalization sweep over all orders

pub mod db;
pub mod migration;
pub mod models;
pub mod normalize;
pub mod sequence;

// Re-export commonly used types
pub use db::{CatalogSource, CheckpointStore, Database, DbError, OrderRepository};
pub use migration::{MigrationConfig, MigrationError, MigrationReport, MigrationRunner};
pub use models::{
    CatalogEntry, NewOrder, Order, OrderCursor, OrderIdentifier, TestLineItem, TestRecord,
};
pub use normalize::{normalize, CatalogIndex, Normalized};
pub use sequence::{AllocationStrategy, AllocatorConfig, OrderBook, SequenceAllocator};
