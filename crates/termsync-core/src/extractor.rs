//! Conversion of discovered concepts into [`TermRecord`]s.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use tracing::trace;

use crate::error::{Error, Result};
use crate::graph::{vocab, ConceptNode};
use crate::models::{HarvestDefaults, RelationKind, RelationRef, TermRecord};

/// Builds term records for one collection.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    defaults: HarvestDefaults,
    terminology_id: i32,
}

impl RecordExtractor {
    pub fn new(defaults: HarvestDefaults, terminology_id: i32) -> Self {
        Self {
            defaults,
            terminology_id,
        }
    }

    /// Extract one record.
    ///
    /// Only edges whose kind maps to one of `relation_kinds` become
    /// relations, grouped in the order of `relation_kinds`.
    pub fn extract(
        &self,
        node: &ConceptNode,
        relation_kinds: &[RelationKind],
        subroot_semantic_uri: Option<&str>,
    ) -> Result<TermRecord> {
        let uri = node.uri().trim();
        if uri.is_empty() {
            return Err(Error::missing_field("<anonymous>", "uri"));
        }
        let name = required(node, uri, vocab::PREF_LABEL)?;
        let description = required(node, uri, vocab::DEFINITION)?;
        let modified = required(node, uri, vocab::MODIFIED)?;
        let last_harvested_at = parse_timestamp(&modified).ok_or_else(|| Error::MalformedRecord {
            uri: uri.to_string(),
            field: vocab::MODIFIED,
            reason: format!("is not a timestamp: {modified:?}"),
        })?;

        let mut relations = Vec::new();
        for &kind in relation_kinds {
            for edge in node.edges() {
                if RelationKind::from_edge_kind(&edge.kind) == Some(kind) {
                    relations.push(RelationRef {
                        target_uri: edge.target.clone(),
                        kind,
                    });
                }
            }
        }

        trace!(
            subsystem = "core",
            component = "extractor",
            uri,
            relation_count = relations.len(),
            "Record extracted"
        );

        Ok(TermRecord {
            uri: uri.to_string(),
            semantic_uri: uri.to_string(),
            name,
            description,
            last_harvested_at,
            terminology_id: self.terminology_id,
            term_status_id: self.defaults.term_status_accepted_id,
            relations,
            subroot_semantic_uri: subroot_semantic_uri.map(str::to_string),
        })
    }

    /// Extract every node, failing on the first malformed one.
    pub fn extract_all<'a, I>(
        &self,
        nodes: I,
        relation_kinds: &[RelationKind],
        subroot_semantic_uri: Option<&str>,
    ) -> Result<Vec<TermRecord>>
    where
        I: IntoIterator<Item = &'a ConceptNode>,
    {
        nodes
            .into_iter()
            .map(|node| self.extract(node, relation_kinds, subroot_semantic_uri))
            .collect()
    }
}

fn required(node: &ConceptNode, uri: &str, field: &'static str) -> Result<String> {
    node.attribute(field)
        .map(|v| v.trim().to_string())
        .ok_or_else(|| Error::missing_field(uri, field))
}

/// Parse a registry timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DDTHH:MM:SS[.f]` and
/// bare dates. Naive values are UTC. The result is truncated to microseconds,
/// the precision the store keeps.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })?;

    let micros = parsed.nanosecond() / 1_000 * 1_000;
    parsed.with_nanosecond(micros)
}
