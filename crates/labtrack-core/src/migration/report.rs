//! Migration outcome.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::OrderCursor;

/// Counters and findings of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub orders_scanned: usize,
    /// Orders whose line items were rewritten (or would be, on a dry run)
    pub orders_updated: usize,
    /// Orders whose write-back failed; picked up again by the next run
    pub orders_failed: usize,
    /// Orders whose stored record could not be decoded
    pub orders_malformed: usize,
    pub dry_run: bool,
    /// Checkpoint position the sweep started from, if it resumed
    pub resumed_from: Option<OrderCursor>,
    /// Test names without a catalog match, with occurrence counts
    pub unresolved: BTreeMap<String, usize>,
    /// Catalog names that appear on more than one entry
    pub duplicate_catalog_names: Vec<String>,
}

impl MigrationReport {
    /// The completion line printed by the CLI.
    pub fn summary_line(&self) -> String {
        format!("Done. Updated {} orders.", self.orders_updated)
    }

    /// True if every scanned order was decoded and written successfully.
    pub fn is_clean(&self) -> bool {
        self.orders_failed == 0 && self.orders_malformed == 0
    }

    pub(crate) fn record_unresolved<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            *self.unresolved.entry(name.to_string()).or_default() += 1;
        }
    }
}
