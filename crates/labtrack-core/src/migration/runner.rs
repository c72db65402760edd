//! The normalization sweep.

use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, info, warn};

use super::{MigrationConfig, MigrationError, MigrationReport, MigrationResult, CHECKPOINT_NAME};
use crate::db::{
    CatalogSource, CheckpointStore, MigrationCheckpoint, OrderRecord, OrderRepository,
    OrderStream,
};
use crate::models::OrderCursor;
use crate::normalize::{normalize, CatalogIndex};

/// Runs the normalization sweep over every order in a store.
pub struct MigrationRunner<'a, S>
where
    S: OrderRepository + CatalogSource + CheckpointStore,
{
    store: &'a S,
    config: MigrationConfig,
}

impl<'a, S> MigrationRunner<'a, S>
where
    S: OrderRepository + CatalogSource + CheckpointStore,
{
    pub fn new(store: &'a S, config: MigrationConfig) -> Self {
        Self { store, config }
    }

    /// Load the catalog and sweep all orders.
    ///
    /// Fails only if the catalog cannot be read or the order scan breaks
    /// off. Orders that cannot be decoded or written are counted and skipped.
    pub fn run(&self) -> MigrationResult<MigrationReport> {
        let catalog = CatalogIndex::load(self.store).map_err(|err| {
            error!(error = %err, "cannot read test catalog, aborting migration");
            MigrationError::CatalogUnavailable(err)
        })?;
        info!(
            entries = catalog.len(),
            fingerprint = %catalog.fingerprint(),
            "test catalog loaded"
        );

        self.run_with_catalog(&catalog)
    }

    /// Sweep all orders against an already loaded catalog.
    pub fn run_with_catalog(&self, catalog: &CatalogIndex) -> MigrationResult<MigrationReport> {
        let mut report = MigrationReport {
            dry_run: self.config.dry_run,
            duplicate_catalog_names: catalog.duplicates().to_vec(),
            ..Default::default()
        };
        let start = self.starting_point(catalog, &mut report);

        let checkpoint_every = self.config.page_size.max(1);
        let mut since_checkpoint = 0;
        for record in OrderStream::new(self.store, start, self.config.page_size) {
            let record = record.map_err(|source| {
                error!(
                    scanned = report.orders_scanned,
                    error = %source,
                    "order scan failed, aborting migration"
                );
                MigrationError::Scan {
                    scanned: report.orders_scanned,
                    source,
                }
            })?;
            let cursor = record.cursor;
            self.process(record, catalog, &mut report);

            since_checkpoint += 1;
            if since_checkpoint >= checkpoint_every {
                self.save_checkpoint(cursor, catalog, &report);
                since_checkpoint = 0;
            }
        }

        if !self.config.dry_run {
            if let Err(err) = self.store.clear_checkpoint(CHECKPOINT_NAME) {
                warn!(error = %err, "cannot clear migration checkpoint");
            }
        }

        self.log_findings(catalog, &report);
        info!(
            scanned = report.orders_scanned,
            updated = report.orders_updated,
            failed = report.orders_failed,
            malformed = report.orders_malformed,
            dry_run = report.dry_run,
            "migration finished"
        );
        Ok(report)
    }

    fn starting_point(&self, catalog: &CatalogIndex, report: &mut MigrationReport) -> OrderCursor {
        if !self.config.resume {
            return OrderCursor::START;
        }

        let checkpoint = match self.store.load_checkpoint(CHECKPOINT_NAME) {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => {
                debug!("no migration checkpoint, starting from the first order");
                return OrderCursor::START;
            }
            Err(err) => {
                warn!(error = %err, "cannot read migration checkpoint, starting from the first order");
                return OrderCursor::START;
            }
        };

        if checkpoint.catalog_fingerprint != catalog.fingerprint() {
            warn!(
                saved_at = %checkpoint.saved_at,
                "catalog changed since the checkpoint, starting from the first order"
            );
            return OrderCursor::START;
        }

        info!(
            cursor = checkpoint.cursor.0,
            scanned = checkpoint.orders_scanned,
            "resuming migration from checkpoint"
        );
        report.resumed_from = Some(checkpoint.cursor);
        report.orders_scanned = checkpoint.orders_scanned;
        report.orders_updated = checkpoint.orders_updated;
        report.orders_failed = checkpoint.orders_failed;
        report.orders_malformed = checkpoint.orders_malformed;
        checkpoint.cursor
    }

    fn process(&self, record: OrderRecord, catalog: &CatalogIndex, report: &mut MigrationReport) {
        report.orders_scanned += 1;

        let order = match record.order {
            Ok(order) => order,
            Err(err) => {
                report.orders_malformed += 1;
                warn!(order_key = %record.order_key, error = %err, "cannot decode order, skipping");
                return;
            }
        };

        let normalized = normalize(&order.tests, catalog);
        report.record_unresolved(normalized.unresolved());

        if !normalized.changed {
            debug!(order_id = %order.order_id, "order already normalized");
            return;
        }

        if self.config.dry_run {
            report.orders_updated += 1;
            info!(order_id = %order.order_id, "would update order");
            return;
        }

        match self.store.update_order_tests(&order.order_key, &normalized.items) {
            Ok(true) => {
                report.orders_updated += 1;
                info!(order_id = %order.order_id, "updated order");
            }
            Ok(false) => {
                report.orders_failed += 1;
                warn!(order_id = %order.order_id, "order disappeared before update");
            }
            Err(err) => {
                report.orders_failed += 1;
                error!(order_id = %order.order_id, error = %err, "failed to update order");
            }
        }
    }

    fn save_checkpoint(&self, cursor: OrderCursor, catalog: &CatalogIndex, report: &MigrationReport) {
        if self.config.dry_run {
            return;
        }

        let checkpoint = MigrationCheckpoint {
            cursor,
            catalog_fingerprint: catalog.fingerprint().to_string(),
            orders_scanned: report.orders_scanned,
            orders_updated: report.orders_updated,
            orders_failed: report.orders_failed,
            orders_malformed: report.orders_malformed,
            saved_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        match self.store.save_checkpoint(CHECKPOINT_NAME, &checkpoint) {
            Ok(()) => debug!(cursor = cursor.0, "migration checkpoint saved"),
            Err(err) => warn!(error = %err, "cannot save migration checkpoint"),
        }
    }

    fn log_findings(&self, catalog: &CatalogIndex, report: &MigrationReport) {
        for (name, count) in &report.unresolved {
            match catalog.suggest(name) {
                Some(suggestion) => {
                    warn!(test = %name, count, suggestion, "test not in catalog, did you mean");
                }
                None => warn!(test = %name, count, "test not in catalog"),
            }
        }
    }
}
