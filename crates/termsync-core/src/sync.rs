//! The two ordered write stages of a harvest.
//!
//! [`apply_term_diff`] writes inserts and updates; [`apply_relations`] runs
//! against an immutable [`StoreSnapshot`] re-read afterwards. A failure in
//! the first stage means the second never runs. Nothing is rolled back.
//!
//! The term diff only reads the terminologies present in the harvest. The
//! re-read may cover more: relations into a collection that was configured
//! but not downloaded this run still resolve against its persisted terms.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::error::Result;
use crate::models::TermRecord;
use crate::reconcile::{Reconciler, StoreSnapshot, TermDiff};
use crate::traits::TermStore;

/// Counts of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: usize,
    pub duplicates: usize,
    pub relations_written: u64,
    pub relations_dropped: usize,
    /// The term diff was computed but nothing was written.
    pub dry_run: bool,
}

/// Run both stages for the merged harvest of a run. Relations resolve
/// against the harvested terminologies only.
pub async fn synchronize(
    store: &dyn TermStore,
    reconciler: &Reconciler,
    harvested: &[TermRecord],
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<SyncReport> {
    synchronize_within(store, reconciler, harvested, &[], now, dry_run).await
}

/// Like [`synchronize`], but the relation stage also resolves targets in
/// the `relation_scope` terminologies.
pub async fn synchronize_within(
    store: &dyn TermStore,
    reconciler: &Reconciler,
    harvested: &[TermRecord],
    relation_scope: &[i32],
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<SyncReport> {
    let start = Instant::now();
    let terminology_ids = terminology_ids(harvested);
    let mut report = SyncReport {
        dry_run,
        ..SyncReport::default()
    };
    if harvested.is_empty() {
        info!(
            subsystem = "core",
            component = "sync",
            "Nothing harvested, reconciliation skipped"
        );
        return Ok(report);
    }

    let persisted = store.terms_for_terminologies(&terminology_ids).await?;
    let diff = reconciler.diff_terms(harvested, &persisted, now);
    report.unchanged = diff.unchanged;
    report.duplicates = diff.duplicates;

    if dry_run {
        report.inserted = diff.inserts.len() as u64;
        report.updated = diff.updates.len() as u64;
        info!(
            subsystem = "core",
            component = "sync",
            insert_count = report.inserted,
            update_count = report.updated,
            "Dry run: term diff computed, nothing written"
        );
        return Ok(report);
    }

    let (inserted, updated) = apply_term_diff(store, &diff).await.map_err(|e| {
        error!(
            subsystem = "core",
            component = "sync",
            op = "apply_term_diff",
            error = %e,
            "Term write failed, relation stage skipped"
        );
        e
    })?;
    report.inserted = inserted;
    report.updated = updated;

    let reread = store
        .terms_for_terminologies(&snapshot_scope(&terminology_ids, relation_scope))
        .await?;
    let snapshot = StoreSnapshot::new(&reread);
    let (written, dropped) = apply_relations(store, reconciler, harvested, &snapshot, now).await?;
    report.relations_written = written;
    report.relations_dropped = dropped;

    info!(
        subsystem = "core",
        component = "sync",
        op = "synchronize",
        insert_count = report.inserted,
        update_count = report.updated,
        unchanged = report.unchanged,
        relation_count = report.relations_written,
        dropped_count = report.relations_dropped,
        duration_ms = start.elapsed().as_millis() as u64,
        "Reconciliation complete"
    );
    Ok(report)
}

/// Write the term diff. Inserts go first; a failed insert leaves the
/// updates unwritten.
pub async fn apply_term_diff(store: &dyn TermStore, diff: &TermDiff) -> Result<(u64, u64)> {
    let inserted = if diff.inserts.is_empty() {
        0
    } else {
        store.insert_terms(&diff.inserts).await?
    };
    let updated = if diff.updates.is_empty() {
        0
    } else {
        store.update_terms(&diff.updates).await?
    };
    Ok((inserted, updated))
}

/// Resolve and write relations. Returns `(written, dropped)`.
pub async fn apply_relations(
    store: &dyn TermStore,
    reconciler: &Reconciler,
    harvested: &[TermRecord],
    snapshot: &StoreSnapshot,
    now: DateTime<Utc>,
) -> Result<(u64, usize)> {
    let resolution = reconciler.resolve_relations(harvested, snapshot);
    let written = if resolution.rows.is_empty() {
        0
    } else {
        let shaped = reconciler.shape_relations(&resolution.rows, now);
        store.upsert_relations(&shaped).await?
    };
    Ok((written, resolution.dropped()))
}

/// Distinct terminology ids of a harvest, ascending.
pub fn terminology_ids(harvested: &[TermRecord]) -> Vec<i32> {
    let mut ids: Vec<i32> = harvested.iter().map(|r| r.terminology_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Union of two id sets, ascending.
fn snapshot_scope(harvested: &[i32], relation_scope: &[i32]) -> Vec<i32> {
    let mut ids: Vec<i32> = harvested.iter().chain(relation_scope).copied().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
