//! Core data models for termsync.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::Error;

// =============================================================================
// RELATION KINDS
// =============================================================================

/// Closed set of relation kinds a harvest records between terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationKind {
    /// `skos:broader` edge, stored as "has broader term".
    #[serde(rename = "broader")]
    Broader,
    /// `skos:related` edge, stored as "is related to".
    #[serde(rename = "related", alias = "relatedTo")]
    RelatedTo,
}

impl RelationKind {
    pub const ALL: [RelationKind; 2] = [RelationKind::Broader, RelationKind::RelatedTo];

    /// Map an edge tag from the concept graph. Any other tag is not a
    /// relation this system records.
    pub fn from_edge_kind(kind: &str) -> Option<Self> {
        match kind {
            "broader" => Some(RelationKind::Broader),
            "related" => Some(RelationKind::RelatedTo),
            _ => None,
        }
    }

    /// Edge tag this kind is harvested from.
    pub fn edge_kind(self) -> &'static str {
        match self {
            RelationKind::Broader => "broader",
            RelationKind::RelatedTo => "related",
        }
    }

    /// Store primary key of the relation type.
    pub fn relation_type_id(self, ids: &RelationTypeIds) -> i32 {
        match self {
            RelationKind::Broader => ids.broader,
            RelationKind::RelatedTo => ids.related_to,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.edge_kind())
    }
}

impl FromStr for RelationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "broader" => Ok(RelationKind::Broader),
            "related" | "relatedTo" => Ok(RelationKind::RelatedTo),
            other => Err(Error::Config(format!("unknown relation kind: {other}"))),
        }
    }
}

/// Store primary keys of the `relation_type` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTypeIds {
    pub broader: i32,
    pub related_to: i32,
}

impl Default for RelationTypeIds {
    fn default() -> Self {
        Self {
            broader: defaults::BROADER_RELATION_TYPE_ID,
            related_to: defaults::RELATED_RELATION_TYPE_ID,
        }
    }
}

/// Catalog identifiers stamped on harvested rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestDefaults {
    /// Status given to every harvested term.
    pub term_status_accepted_id: i32,
    /// Category given to newly inserted terms.
    pub term_category_id: i32,
    /// User recorded in the audit columns.
    pub actor_id: i32,
    pub relation_types: RelationTypeIds,
}

impl Default for HarvestDefaults {
    fn default() -> Self {
        Self {
            term_status_accepted_id: defaults::TERM_STATUS_ACCEPTED_ID,
            term_category_id: defaults::TERM_CATEGORY_ID,
            actor_id: defaults::ACTOR_ID,
            relation_types: RelationTypeIds::default(),
        }
    }
}

// =============================================================================
// HARVESTED RECORDS
// =============================================================================

/// Outbound relation of a harvested record, still addressed by URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRef {
    pub target_uri: String,
    pub kind: RelationKind,
}

/// Normalized representation of one harvested concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRecord {
    /// Identity of the term.
    pub uri: String,
    pub semantic_uri: String,
    pub name: String,
    pub description: String,
    /// The concept's last-modified stamp in the registry.
    pub last_harvested_at: DateTime<Utc>,
    pub terminology_id: i32,
    pub term_status_id: i32,
    pub relations: Vec<RelationRef>,
    /// Semantic URI of the collection's subroot, used to translate
    /// relation targets that live in other collections.
    pub subroot_semantic_uri: Option<String>,
}

// =============================================================================
// PERSISTED ROWS
// =============================================================================

/// A row of the `term` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTerm {
    pub term_id: i32,
    pub uri: String,
    pub semantic_uri: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub last_harvested_at: Option<DateTime<Utc>>,
    pub terminology_id: i32,
    pub term_status_id: i32,
    pub term_category_id: i32,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_by: i32,
    pub updated_at: DateTime<Utc>,
}

/// A `term` row ready to be inserted; the store assigns `term_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTerm {
    pub uri: String,
    pub semantic_uri: String,
    pub name: String,
    pub description: String,
    pub last_harvested_at: DateTime<Utc>,
    pub terminology_id: i32,
    pub term_status_id: i32,
    pub term_category_id: i32,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_by: i32,
    pub updated_at: DateTime<Utc>,
}

/// Changed columns of an existing `term` row, addressed by `term_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermUpdate {
    pub term_id: i32,
    pub uri: String,
    pub semantic_uri: String,
    pub name: String,
    pub description: String,
    pub last_harvested_at: DateTime<Utc>,
    pub term_status_id: i32,
    pub updated_by: i32,
    pub updated_at: DateTime<Utc>,
}

/// A resolved relation between two persisted terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationRow {
    pub source_term_id: i32,
    pub target_term_id: i32,
    pub relation_type_id: i32,
}

/// A `term_relation` row with its audit stamp, ready for insert-or-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationUpsert {
    pub row: RelationRow,
    pub actor_id: i32,
    pub at: DateTime<Utc>,
}

/// A row of the `terminology` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminologyInfo {
    pub terminology_id: i32,
    pub name: String,
    /// URI of the collection's subroot concept.
    pub uri: Option<String>,
    /// Semantic URI anchor of the collection, e.g. `SDN:L05`.
    pub semantic_uri: Option<String>,
}
