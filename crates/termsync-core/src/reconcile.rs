//! Reconciliation of a harvested snapshot against the persisted catalog.
//!
//! Two passes share one identity rule: a harvested record and a persisted
//! term are the same term iff their `uri` values are equal.
//!
//! - **Term diff** partitions harvested records into inserts, updates, and
//!   unchanged records.
//! - **Relation resolution** maps every `(target_uri, kind)` of every
//!   harvested record onto persisted term ids. It must run against a
//!   [`StoreSnapshot`] read after the term diff was written, since inserted
//!   terms only get their ids from the store.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use crate::models::{
    HarvestDefaults, NewTerm, PersistedTerm, RelationRow, RelationUpsert, TermRecord, TermUpdate,
};
use crate::semantic_uri;

/// Output of the term diff.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TermDiff {
    pub inserts: Vec<NewTerm>,
    pub updates: Vec<TermUpdate>,
    /// Records equal to their persisted counterpart on every tracked field.
    pub unchanged: usize,
    /// Records dropped because an earlier record had the same URI.
    pub duplicates: usize,
}

impl TermDiff {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// Output of relation resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationResolution {
    pub rows: Vec<RelationRow>,
    /// Relations whose source record has no persisted term.
    pub unresolved_sources: usize,
    /// Relations whose target URI matches no persisted term.
    pub unresolved_targets: usize,
}

impl RelationResolution {
    pub fn dropped(&self) -> usize {
        self.unresolved_sources + self.unresolved_targets
    }
}

/// How a relation target was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Uri,
    SemanticUri,
    Translated,
}

/// Immutable id lookup built from a read of the `term` table.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    by_uri: HashMap<String, i32>,
    by_semantic_uri: HashMap<String, i32>,
}

impl StoreSnapshot {
    /// Index persisted terms. When two rows share a key the first one wins.
    pub fn new(terms: &[PersistedTerm]) -> Self {
        let mut snapshot = Self::default();
        for term in terms {
            snapshot
                .by_uri
                .entry(term.uri.clone())
                .or_insert(term.term_id);
            if let Some(semantic) = term.semantic_uri.as_deref() {
                snapshot
                    .by_semantic_uri
                    .entry(semantic.to_string())
                    .or_insert(term.term_id);
            }
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.by_uri.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uri.is_empty()
    }

    pub fn term_id(&self, uri: &str) -> Option<i32> {
        self.by_uri.get(uri).copied()
    }

    /// Resolve a relation target: exact URI, then URI stored as a semantic
    /// URI, then the anchor translation for cross-collection targets.
    pub fn resolve_target(&self, target_uri: &str, anchor: Option<&str>) -> Option<(i32, Resolution)> {
        if let Some(id) = self.term_id(target_uri) {
            return Some((id, Resolution::Uri));
        }
        if let Some(&id) = self.by_semantic_uri.get(target_uri) {
            return Some((id, Resolution::SemanticUri));
        }
        let translated = semantic_uri::translate(target_uri, anchor?)?;
        self.by_semantic_uri
            .get(&translated)
            .map(|&id| (id, Resolution::Translated))
    }
}

/// Stateless reconciler configured with the catalog defaults.
#[derive(Debug, Clone)]
pub struct Reconciler {
    defaults: HarvestDefaults,
}

impl Reconciler {
    pub fn new(defaults: HarvestDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &HarvestDefaults {
        &self.defaults
    }

    /// Term diff of `harvested` against `persisted`.
    ///
    /// Persisted rows of terminologies absent from `harvested` are ignored.
    /// Rows are shaped for writing with the audit stamp `now`.
    pub fn diff_terms(
        &self,
        harvested: &[TermRecord],
        persisted: &[PersistedTerm],
        now: DateTime<Utc>,
    ) -> TermDiff {
        let terminologies: HashSet<i32> = harvested.iter().map(|r| r.terminology_id).collect();
        let mut by_uri: HashMap<&str, &PersistedTerm> = HashMap::new();
        for term in persisted
            .iter()
            .filter(|t| terminologies.contains(&t.terminology_id))
        {
            by_uri.entry(term.uri.as_str()).or_insert(term);
        }

        let mut diff = TermDiff::default();
        let mut seen: HashSet<&str> = HashSet::new();
        for record in harvested {
            if !seen.insert(record.uri.as_str()) {
                diff.duplicates += 1;
                continue;
            }
            match by_uri.get(record.uri.as_str()) {
                None => diff.inserts.push(self.shape_insert(record, now)),
                Some(existing) if differs(record, existing) => {
                    trace!(
                        subsystem = "core",
                        component = "reconciler",
                        uri = %record.uri,
                        term_id = existing.term_id,
                        "Term changed"
                    );
                    diff.updates.push(self.shape_update(record, existing.term_id, now));
                }
                Some(_) => diff.unchanged += 1,
            }
        }

        debug!(
            subsystem = "core",
            component = "reconciler",
            op = "term_diff",
            record_count = harvested.len(),
            insert_count = diff.inserts.len(),
            update_count = diff.updates.len(),
            unchanged = diff.unchanged,
            duplicates = diff.duplicates,
            "Term diff computed"
        );
        diff
    }

    /// Resolve every harvested relation against a snapshot read after the
    /// term diff was written. Rows from distinct sources that happen to
    /// coincide are all kept.
    pub fn resolve_relations(
        &self,
        harvested: &[TermRecord],
        snapshot: &StoreSnapshot,
    ) -> RelationResolution {
        let mut out = RelationResolution::default();
        for record in harvested {
            let Some(source_term_id) = snapshot.term_id(&record.uri) else {
                out.unresolved_sources += record.relations.len();
                if !record.relations.is_empty() {
                    debug!(
                        subsystem = "core",
                        component = "reconciler",
                        uri = %record.uri,
                        dropped_count = record.relations.len(),
                        "Source term not persisted, relations dropped"
                    );
                }
                continue;
            };

            let anchor = record.subroot_semantic_uri.as_deref();
            for relation in &record.relations {
                match snapshot.resolve_target(&relation.target_uri, anchor) {
                    Some((target_term_id, how)) => {
                        trace!(
                            subsystem = "core",
                            component = "reconciler",
                            uri = %record.uri,
                            target = %relation.target_uri,
                            resolution = ?how,
                            "Relation resolved"
                        );
                        out.rows.push(RelationRow {
                            source_term_id,
                            target_term_id,
                            relation_type_id: relation
                                .kind
                                .relation_type_id(&self.defaults.relation_types),
                        });
                    }
                    None => {
                        out.unresolved_targets += 1;
                        debug!(
                            subsystem = "core",
                            component = "reconciler",
                            uri = %record.uri,
                            target = %relation.target_uri,
                            kind = %relation.kind,
                            "Unresolved relation target, relation dropped"
                        );
                    }
                }
            }
        }

        debug!(
            subsystem = "core",
            component = "reconciler",
            op = "resolve_relations",
            relation_count = out.rows.len(),
            dropped_count = out.dropped(),
            "Relations resolved"
        );
        out
    }

    /// Stamp resolved relation rows for an insert-or-update write.
    pub fn shape_relations(&self, rows: &[RelationRow], now: DateTime<Utc>) -> Vec<RelationUpsert> {
        rows.iter()
            .map(|&row| RelationUpsert {
                row,
                actor_id: self.defaults.actor_id,
                at: now,
            })
            .collect()
    }

    fn shape_insert(&self, record: &TermRecord, now: DateTime<Utc>) -> NewTerm {
        NewTerm {
            uri: record.uri.clone(),
            semantic_uri: record.semantic_uri.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            last_harvested_at: record.last_harvested_at,
            terminology_id: record.terminology_id,
            term_status_id: record.term_status_id,
            term_category_id: self.defaults.term_category_id,
            created_by: self.defaults.actor_id,
            created_at: now,
            updated_by: self.defaults.actor_id,
            updated_at: now,
        }
    }

    fn shape_update(&self, record: &TermRecord, term_id: i32, now: DateTime<Utc>) -> TermUpdate {
        TermUpdate {
            term_id,
            uri: record.uri.clone(),
            semantic_uri: record.semantic_uri.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            last_harvested_at: record.last_harvested_at,
            term_status_id: record.term_status_id,
            updated_by: self.defaults.actor_id,
            updated_at: now,
        }
    }
}

/// True when any tracked field differs.
fn differs(record: &TermRecord, existing: &PersistedTerm) -> bool {
    record.name != existing.name
        || existing.description.as_deref() != Some(record.description.as_str())
        || existing.last_harvested_at != Some(record.last_harvested_at)
        || record.term_status_id != existing.term_status_id
        || existing.semantic_uri.as_deref() != Some(record.semantic_uri.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RelationKind, RelationRef, RelationTypeIds};
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn record(uri: &str, name: &str) -> TermRecord {
        TermRecord {
            uri: uri.to_string(),
            semantic_uri: uri.to_string(),
            name: name.to_string(),
            description: format!("{name} description"),
            last_harvested_at: ts(1),
            terminology_id: 21,
            term_status_id: 3,
            relations: Vec::new(),
            subroot_semantic_uri: None,
        }
    }

    fn persisted(term_id: i32, r: &TermRecord) -> PersistedTerm {
        PersistedTerm {
            term_id,
            uri: r.uri.clone(),
            semantic_uri: Some(r.semantic_uri.clone()),
            name: r.name.clone(),
            description: Some(r.description.clone()),
            last_harvested_at: Some(r.last_harvested_at),
            terminology_id: r.terminology_id,
            term_status_id: r.term_status_id,
            term_category_id: 1,
            created_by: 0,
            created_at: ts(1),
            updated_by: 0,
            updated_at: ts(1),
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(HarvestDefaults {
            term_status_accepted_id: 3,
            term_category_id: 5,
            actor_id: 42,
            relation_types: RelationTypeIds {
                broader: 1,
                related_to: 7,
            },
        })
    }

    #[test]
    fn test_diff_changed_name_is_update_with_persisted_id() {
        let old = record("X", "old");
        let new = record("X", "new");
        let diff = reconciler().diff_terms(&[new], &[persisted(99, &old)], ts(2));

        assert!(diff.inserts.is_empty());
        assert_eq!(diff.updates.len(), 1);
        let update = &diff.updates[0];
        assert_eq!(update.term_id, 99);
        assert_eq!(update.uri, "X");
        assert_eq!(update.name, "new");
        assert_eq!(update.updated_by, 42);
        assert_eq!(update.updated_at, ts(2));
    }

    #[test]
    fn test_diff_new_uri_is_insert_with_audit_defaults() {
        let diff = reconciler().diff_terms(&[record("Y", "y")], &[], ts(2));

        assert!(diff.updates.is_empty());
        assert_eq!(diff.inserts.len(), 1);
        let insert = &diff.inserts[0];
        assert_eq!(insert.term_category_id, 5);
        assert_eq!(insert.created_by, 42);
        assert_eq!(insert.updated_by, 42);
        assert_eq!(insert.created_at, ts(2));
        assert_eq!(insert.updated_at, ts(2));
    }

    #[test]
    fn test_diff_each_tracked_field_triggers_update() {
        let base = record("X", "x");
        let existing = persisted(1, &base);
        let mutations: Vec<Box<dyn Fn(&mut TermRecord)>> = vec![
            Box::new(|r: &mut TermRecord| r.name = "other".to_string()),
            Box::new(|r: &mut TermRecord| r.description = "other".to_string()),
            Box::new(|r: &mut TermRecord| r.last_harvested_at = ts(9)),
            Box::new(|r: &mut TermRecord| r.term_status_id = 4),
            Box::new(|r: &mut TermRecord| r.semantic_uri = "SDN:X::1".to_string()),
        ];

        for mutate in mutations {
            let mut changed = base.clone();
            mutate(&mut changed);
            let diff = reconciler().diff_terms(&[changed], std::slice::from_ref(&existing), ts(2));
            assert_eq!(diff.updates.len(), 1);
            assert_eq!(diff.unchanged, 0);
        }
    }

    #[test]
    fn test_diff_untracked_field_is_ignored() {
        let base = record("X", "x");
        let mut existing = persisted(1, &base);
        existing.term_category_id = 77;
        existing.updated_by = 13;
        let diff = reconciler().diff_terms(&[base], &[existing], ts(2));
        assert!(diff.is_empty());
        assert_eq!(diff.unchanged, 1);
    }

    #[test]
    fn test_diff_null_persisted_columns_count_as_changed() {
        let base = record("X", "x");
        let mut existing = persisted(1, &base);
        existing.description = None;
        existing.semantic_uri = None;
        existing.last_harvested_at = None;
        let diff = reconciler().diff_terms(&[base], &[existing], ts(2));
        assert_eq!(diff.updates.len(), 1);
    }

    #[test]
    fn test_diff_partitions_mixed_input() {
        let same = record("A", "a");
        let changed_old = record("B", "b");
        let changed_new = record("B", "b2");
        let fresh = record("C", "c");
        let persisted = vec![persisted(1, &same), persisted(2, &changed_old)];

        let diff = reconciler().diff_terms(
            &[same.clone(), changed_new, fresh],
            &persisted,
            ts(2),
        );

        let inserts: Vec<_> = diff.inserts.iter().map(|t| t.uri.as_str()).collect();
        let updates: Vec<_> = diff.updates.iter().map(|t| t.uri.as_str()).collect();
        assert_eq!(inserts, vec!["C"]);
        assert_eq!(updates, vec!["B"]);
        assert_eq!(diff.unchanged, 1);
    }

    #[test]
    fn test_diff_ignores_persisted_rows_of_other_terminologies() {
        let harvested = record("X", "x");
        let mut foreign = persisted(1, &harvested);
        foreign.terminology_id = 99;
        let diff = reconciler().diff_terms(&[harvested], &[foreign], ts(2));
        assert_eq!(diff.inserts.len(), 1);
    }

    #[test]
    fn test_diff_collapses_duplicate_uris() {
        let diff = reconciler().diff_terms(&[record("D", "d"), record("D", "d")], &[], ts(2));
        assert_eq!(diff.inserts.len(), 1);
        assert_eq!(diff.duplicates, 1);
    }

    #[test]
    fn test_diff_empty_inputs() {
        let diff = reconciler().diff_terms(&[], &[], ts(2));
        assert!(diff.is_empty());
        assert_eq!(diff, TermDiff::default());
    }

    #[test]
    fn test_diff_is_idempotent_after_apply() {
        let harvested = vec![record("A", "a"), record("B", "b")];
        let first = reconciler().diff_terms(&harvested, &[], ts(2));
        let applied: Vec<PersistedTerm> = harvested
            .iter()
            .enumerate()
            .map(|(i, r)| persisted(i as i32 + 1, r))
            .collect();
        assert_eq!(first.inserts.len(), 2);

        let second = reconciler().diff_terms(&harvested, &applied, ts(3));
        assert!(second.is_empty());
        assert_eq!(second.unchanged, 2);
    }

    #[test]
    fn test_resolve_drops_unknown_target() {
        let mut y = record("Y", "y");
        y.relations.push(RelationRef {
            target_uri: "Z".to_string(),
            kind: RelationKind::Broader,
        });
        let snapshot = StoreSnapshot::new(&[persisted(1, &y)]);

        let resolved = reconciler().resolve_relations(&[y], &snapshot);
        assert!(resolved.rows.is_empty());
        assert_eq!(resolved.unresolved_targets, 1);
    }

    #[test]
    fn test_resolve_maps_kinds_to_type_ids() {
        let mut a = record("A", "a");
        a.relations = vec![
            RelationRef {
                target_uri: "B".to_string(),
                kind: RelationKind::Broader,
            },
            RelationRef {
                target_uri: "C".to_string(),
                kind: RelationKind::RelatedTo,
            },
        ];
        let snapshot = StoreSnapshot::new(&[
            persisted(10, &a),
            persisted(20, &record("B", "b")),
            persisted(30, &record("C", "c")),
        ]);

        let resolved = reconciler().resolve_relations(&[a], &snapshot);
        assert_eq!(
            resolved.rows,
            vec![
                RelationRow {
                    source_term_id: 10,
                    target_term_id: 20,
                    relation_type_id: 1
                },
                RelationRow {
                    source_term_id: 10,
                    target_term_id: 30,
                    relation_type_id: 7
                },
            ]
        );
        assert_eq!(resolved.dropped(), 0);
    }

    #[test]
    fn test_resolve_unpersisted_source_drops_its_relations() {
        let mut a = record("A", "a");
        a.relations.push(RelationRef {
            target_uri: "B".to_string(),
            kind: RelationKind::Broader,
        });
        let snapshot = StoreSnapshot::new(&[persisted(20, &record("B", "b"))]);

        let resolved = reconciler().resolve_relations(&[a], &snapshot);
        assert!(resolved.rows.is_empty());
        assert_eq!(resolved.unresolved_sources, 1);
    }

    #[test]
    fn test_resolve_cross_collection_by_translation() {
        let mut a = record("http://vocab.nerc.ac.uk/collection/L05/current/1/", "a");
        a.subroot_semantic_uri = Some("SDN:L05".to_string());
        a.relations.push(RelationRef {
            target_uri: "http://vocab.nerc.ac.uk/collection/L22/current/TOOL1/".to_string(),
            kind: RelationKind::RelatedTo,
        });
        let mut target = persisted(50, &record("urn:legacy:tool1", "tool"));
        target.semantic_uri = Some("SDN:L22::TOOL1".to_string());
        let snapshot = StoreSnapshot::new(&[persisted(10, &a), target]);

        let resolved = reconciler().resolve_relations(&[a], &snapshot);
        assert_eq!(resolved.rows.len(), 1);
        assert_eq!(resolved.rows[0].target_term_id, 50);
        assert_eq!(
            snapshot.resolve_target(
                "http://vocab.nerc.ac.uk/collection/L22/current/TOOL1/",
                Some("SDN:L05")
            ),
            Some((50, Resolution::Translated))
        );
    }

    #[test]
    fn test_resolve_target_by_semantic_uri() {
        let mut target = persisted(50, &record("urn:t", "t"));
        target.semantic_uri = Some("http://x/legacy".to_string());
        let snapshot = StoreSnapshot::new(&[target]);
        assert_eq!(
            snapshot.resolve_target("http://x/legacy", None),
            Some((50, Resolution::SemanticUri))
        );
        assert_eq!(snapshot.resolve_target("http://x/other", None), None);
    }

    #[test]
    fn test_resolve_keeps_coinciding_rows() {
        let rel = RelationRef {
            target_uri: "T".to_string(),
            kind: RelationKind::Broader,
        };
        let mut a = record("A", "a");
        a.relations.push(rel.clone());
        let mut a_again = a.clone();
        a_again.name = "dup".to_string();

        let snapshot = StoreSnapshot::new(&[persisted(1, &a), persisted(2, &record("T", "t"))]);
        let resolved = reconciler().resolve_relations(&[a, a_again], &snapshot);
        assert_eq!(resolved.rows.len(), 2);
        assert_eq!(resolved.rows[0], resolved.rows[1]);
    }

    #[test]
    fn test_shape_relations_stamps_actor() {
        let row = RelationRow {
            source_term_id: 1,
            target_term_id: 2,
            relation_type_id: 1,
        };
        let shaped = reconciler().shape_relations(&[row], ts(4));
        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped[0].actor_id, 42);
        assert_eq!(shaped[0].at, ts(4));
        assert_eq!(shaped[0].row, row);
    }
}
