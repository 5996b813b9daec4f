//! End-of-run summary.

use serde::Serialize;
use tracing::{error, info, warn};

use termsync_core::SyncReport;

/// What happened to one configured collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectionStatus {
    Harvested { records: usize, levels: usize },
    /// The registry answered 304 for the cached ETag.
    Unchanged,
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionOutcome {
    pub collection: String,
    pub terminology_id: i32,
    #[serde(flatten)]
    pub status: CollectionStatus,
}

/// Per-collection outcomes and reconciliation totals of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub collections: Vec<CollectionOutcome>,
    pub sync: SyncReport,
    pub duration_ms: u64,
}

impl HarvestReport {
    pub fn harvested_records(&self) -> usize {
        self.collections
            .iter()
            .map(|c| match c.status {
                CollectionStatus::Harvested { records, .. } => records,
                _ => 0,
            })
            .sum()
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, CollectionStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, CollectionStatus::Skipped { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|s| matches!(s, CollectionStatus::Unchanged))
    }

    fn count(&self, pred: impl Fn(&CollectionStatus) -> bool) -> usize {
        self.collections.iter().filter(|c| pred(&c.status)).count()
    }

    /// Emit one line per collection and a summary line.
    pub fn log(&self) {
        for c in &self.collections {
            match &c.status {
                CollectionStatus::Harvested { records, levels } => info!(
                    subsystem = "harvest",
                    collection = %c.collection,
                    terminology_id = c.terminology_id,
                    record_count = records,
                    levels,
                    "Collection harvested"
                ),
                CollectionStatus::Unchanged => info!(
                    subsystem = "harvest",
                    collection = %c.collection,
                    terminology_id = c.terminology_id,
                    "Collection unchanged"
                ),
                CollectionStatus::Skipped { reason } => warn!(
                    subsystem = "harvest",
                    collection = %c.collection,
                    terminology_id = c.terminology_id,
                    reason = %reason,
                    "Collection skipped"
                ),
                CollectionStatus::Failed { error } => error!(
                    subsystem = "harvest",
                    collection = %c.collection,
                    terminology_id = c.terminology_id,
                    error = %error,
                    "Collection failed"
                ),
            }
        }

        info!(
            subsystem = "harvest",
            op = "run",
            record_count = self.harvested_records(),
            insert_count = self.sync.inserted,
            update_count = self.sync.updated,
            unchanged = self.sync.unchanged,
            duplicates = self.sync.duplicates,
            relation_count = self.sync.relations_written,
            dropped_count = self.sync.relations_dropped,
            failed = self.failed(),
            skipped = self.skipped(),
            dry_run = self.sync.dry_run,
            duration_ms = self.duration_ms,
            "Harvest complete"
        );
    }
}
