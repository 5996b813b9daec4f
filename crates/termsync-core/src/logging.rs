//! Structured logging field names for termsync.
//!
//! `tracing` macros take field names as identifiers, so call sites spell
//! them literally (`subsystem = "db"`, `insert_count = n`). The constants
//! below are the schema those literals must follow; log queries and the
//! tests that inspect emitted events use them, never the macros.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | A collection or a pass was aborted |
//! | WARN  | Collection skipped, relation dropped in bulk |
//! | INFO  | Run lifecycle, per-collection and per-pass completions |
//! | DEBUG | Decision points (content type, ETag, resolution path) |
//! | TRACE | Per-record iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "harvest", "db", "core"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "walker", "reconciler", "fetch", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "walk", "term_diff", "resolve_relations", "insert_terms"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Collection name from the harvest configuration.
pub const COLLECTION: &str = "collection";

/// Terminology primary key.
pub const TERMINOLOGY_ID: &str = "terminology_id";

/// Concept or term URI.
pub const URI: &str = "uri";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of harvested records.
pub const RECORD_COUNT: &str = "record_count";

/// Number of frontier expansions in a walk.
pub const LEVELS: &str = "levels";

/// Number of term rows inserted.
pub const INSERT_COUNT: &str = "insert_count";

/// Number of term rows updated.
pub const UPDATE_COUNT: &str = "update_count";

/// Number of relation rows written.
pub const RELATION_COUNT: &str = "relation_count";

/// Number of relations dropped as unresolvable.
pub const DROPPED_COUNT: &str = "dropped_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
