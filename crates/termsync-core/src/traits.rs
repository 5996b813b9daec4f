//! Core traits for termsync abstractions.
//!
//! The reconciler only ever talks to the catalog through [`TermStore`], so
//! the PostgreSQL implementation and the in-memory test store are
//! interchangeable.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NewTerm, PersistedTerm, RelationUpsert, TermUpdate, TerminologyInfo};

/// Persisted term catalog.
///
/// Writes must be visible to subsequent reads through the same store
/// (read-after-write), since relation resolution re-reads the terms it
/// just inserted.
#[async_trait]
pub trait TermStore: Send + Sync {
    /// Ids of every terminology known to the catalog.
    async fn terminology_ids(&self) -> Result<BTreeSet<i32>>;

    /// One terminology row.
    async fn terminology(&self, terminology_id: i32) -> Result<Option<TerminologyInfo>>;

    /// Every term belonging to one of `terminology_ids`, ordered by `term_id`.
    async fn terms_for_terminologies(&self, terminology_ids: &[i32]) -> Result<Vec<PersistedTerm>>;

    /// Batch insert; returns the number of rows written.
    async fn insert_terms(&self, rows: &[NewTerm]) -> Result<u64>;

    /// Batch update by `term_id` of the harvested columns and the update
    /// audit stamp; returns the number of rows written.
    async fn update_terms(&self, rows: &[TermUpdate]) -> Result<u64>;

    /// Insert-or-update of `term_relation` rows keyed by
    /// `(source_term_id, target_term_id, relation_type_id)`.
    async fn upsert_relations(&self, rows: &[RelationUpsert]) -> Result<u64>;
}
