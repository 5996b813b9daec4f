//! Centralized default constants for termsync.
//!
//! Store-specific identifiers (status, category, relation types) have no
//! universal value; the defaults below match a freshly migrated catalog and
//! are overridden through [`crate::HarvestDefaults`] at startup.

// =============================================================================
// GRAPH WALK
// =============================================================================

/// Level ceiling for the narrower walk. Real vocabularies are a handful of
/// levels deep; reaching this means the narrower edges form a cycle.
pub const MAX_WALK_DEPTH: usize = 64;

// =============================================================================
// CATALOG IDENTIFIERS
// =============================================================================

/// `term_status` row meaning "accepted".
pub const TERM_STATUS_ACCEPTED_ID: i32 = 3;

/// `term_category` row assigned to harvested terms.
pub const TERM_CATEGORY_ID: i32 = 1;

/// User recorded in `created_by` / `updated_by` audit columns.
pub const ACTOR_ID: i32 = 0;

/// `relation_type` row for "has broader term".
pub const BROADER_RELATION_TYPE_ID: i32 = 1;

/// `relation_type` row for "is related to".
pub const RELATED_RELATION_TYPE_ID: i32 = 7;

// =============================================================================
// STORE
// =============================================================================

/// Rows per UNNEST batch statement.
pub const WRITE_BATCH_SIZE: usize = 500;

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Request timeout for vocabulary downloads, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;
