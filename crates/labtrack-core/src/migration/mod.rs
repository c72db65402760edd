//! Test record normalization sweep.
//!
//! Streams every order, normalizes its line items against the catalog and
//! writes back only the orders that changed. Progress is checkpointed so an
//! interrupted sweep can resume; re-running from scratch is also safe.

mod report;
mod runner;

pub use report::MigrationReport;
pub use runner::MigrationRunner;

use thiserror::Error;

use crate::db::DbError;

/// Name of the checkpoint row in `migration_state`.
pub const CHECKPOINT_NAME: &str = "normalize_tests";

/// Default number of orders fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Fatal migration errors. Per-order failures are counted in the report
/// instead.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(#[source] DbError),

    #[error("Order scan failed after {scanned} orders: {source}")]
    Scan {
        scanned: usize,
        #[source]
        source: DbError,
    },
}

pub type MigrationResult<T> = Result<T, MigrationError>;

/// Migration run options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Orders fetched per page, and orders between checkpoints
    pub page_size: usize,
    /// Report what would change without writing anything
    pub dry_run: bool,
    /// Continue from the saved checkpoint if one matches the catalog
    pub resume: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            dry_run: false,
            resume: false,
        }
    }
}
