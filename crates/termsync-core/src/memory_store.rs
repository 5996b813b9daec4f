//! In-memory [`TermStore`] for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{
    NewTerm, PersistedTerm, RelationRow, RelationUpsert, TermUpdate, TerminologyInfo,
};
use crate::traits::TermStore;

#[derive(Debug, Default)]
struct State {
    terminologies: BTreeMap<i32, TerminologyInfo>,
    terms: Vec<PersistedTerm>,
    relations: BTreeMap<RelationRow, RelationUpsert>,
    next_term_id: i32,
    fail_inserts: bool,
    reads: usize,
}

/// Catalog held in memory. Term ids are assigned sequentially from 1.
#[derive(Debug, Default)]
pub struct MemoryTermStore {
    state: Mutex<State>,
}

impl MemoryTermStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a terminology row.
    pub fn with_terminology(self, info: TerminologyInfo) -> Self {
        self.state().terminologies.insert(info.terminology_id, info);
        self
    }

    /// Insert a term as if an earlier run had written it.
    pub fn seed_term(&self, mut term: PersistedTerm) -> i32 {
        let mut state = self.state();
        state.next_term_id = state.next_term_id.max(term.term_id);
        if term.term_id == 0 {
            state.next_term_id += 1;
            term.term_id = state.next_term_id;
        }
        let id = term.term_id;
        state.terms.push(term);
        id
    }

    /// Make every subsequent `insert_terms` fail.
    pub fn fail_inserts(&self) {
        self.state().fail_inserts = true;
    }

    pub fn terms(&self) -> Vec<PersistedTerm> {
        self.state().terms.clone()
    }

    pub fn term_by_uri(&self, uri: &str) -> Option<PersistedTerm> {
        self.state().terms.iter().find(|t| t.uri == uri).cloned()
    }

    pub fn relations(&self) -> Vec<RelationUpsert> {
        self.state().relations.values().copied().collect()
    }

    /// Number of `terms_for_terminologies` calls served.
    pub fn reads(&self) -> usize {
        self.state().reads
    }
}

#[async_trait]
impl TermStore for MemoryTermStore {
    async fn terminology_ids(&self) -> Result<BTreeSet<i32>> {
        Ok(self.state().terminologies.keys().copied().collect())
    }

    async fn terminology(&self, terminology_id: i32) -> Result<Option<TerminologyInfo>> {
        Ok(self.state().terminologies.get(&terminology_id).cloned())
    }

    async fn terms_for_terminologies(&self, terminology_ids: &[i32]) -> Result<Vec<PersistedTerm>> {
        let mut state = self.state();
        state.reads += 1;
        let mut terms: Vec<PersistedTerm> = state
            .terms
            .iter()
            .filter(|t| terminology_ids.contains(&t.terminology_id))
            .cloned()
            .collect();
        terms.sort_by_key(|t| t.term_id);
        Ok(terms)
    }

    async fn insert_terms(&self, rows: &[NewTerm]) -> Result<u64> {
        let mut state = self.state();
        if state.fail_inserts {
            return Err(Error::Database(sqlx::Error::PoolClosed));
        }
        for row in rows {
            state.next_term_id += 1;
            let term_id = state.next_term_id;
            state.terms.push(PersistedTerm {
                term_id,
                uri: row.uri.clone(),
                semantic_uri: Some(row.semantic_uri.clone()),
                name: row.name.clone(),
                description: Some(row.description.clone()),
                last_harvested_at: Some(row.last_harvested_at),
                terminology_id: row.terminology_id,
                term_status_id: row.term_status_id,
                term_category_id: row.term_category_id,
                created_by: row.created_by,
                created_at: row.created_at,
                updated_by: row.updated_by,
                updated_at: row.updated_at,
            });
        }
        Ok(rows.len() as u64)
    }

    async fn update_terms(&self, rows: &[TermUpdate]) -> Result<u64> {
        let mut state = self.state();
        let mut written = 0;
        for row in rows {
            if let Some(term) = state.terms.iter_mut().find(|t| t.term_id == row.term_id) {
                term.uri = row.uri.clone();
                term.semantic_uri = Some(row.semantic_uri.clone());
                term.name = row.name.clone();
                term.description = Some(row.description.clone());
                term.last_harvested_at = Some(row.last_harvested_at);
                term.term_status_id = row.term_status_id;
                term.updated_by = row.updated_by;
                term.updated_at = row.updated_at;
                written += 1;
            }
        }
        Ok(written)
    }

    async fn upsert_relations(&self, rows: &[RelationUpsert]) -> Result<u64> {
        let mut state = self.state();
        for upsert in rows {
            state
                .relations
                .entry(upsert.row)
                .and_modify(|existing| {
                    existing.actor_id = upsert.actor_id;
                    existing.at = upsert.at;
                })
                .or_insert(*upsert);
        }
        Ok(rows.len() as u64)
    }
}
