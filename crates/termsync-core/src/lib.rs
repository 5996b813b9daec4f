//! # termsync-core
//!
//! Core types and algorithms for harvesting a SKOS vocabulary into a term
//! catalog.
//!
//! This crate provides:
//! - the in-memory [`ConceptGraph`] produced by the deserializer
//! - the narrower [`walk`](walker::walk) below a collection subroot
//! - [`RecordExtractor`], turning concepts into [`TermRecord`]s
//! - [`Reconciler`], the term diff and relation resolution passes
//! - [`TermStore`], the catalog abstraction, and the ordered write stages in
//!   [`sync`]

pub mod defaults;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod logging;
#[cfg(any(test, feature = "test-util"))]
pub mod memory_store;
pub mod models;
pub mod reconcile;
pub mod semantic_uri;
pub mod sync;
pub mod traits;
pub mod walker;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use extractor::{parse_timestamp, RecordExtractor};
pub use graph::{vocab, ConceptGraph, ConceptNode, Edge};
#[cfg(any(test, feature = "test-util"))]
pub use memory_store::MemoryTermStore;
pub use models::*;
pub use reconcile::{Reconciler, RelationResolution, Resolution, StoreSnapshot, TermDiff};
pub use sync::{apply_relations, apply_term_diff, synchronize, synchronize_within, SyncReport};
pub use traits::TermStore;
pub use walker::{walk, walk_from, walk_with_limit, WalkOutcome};
