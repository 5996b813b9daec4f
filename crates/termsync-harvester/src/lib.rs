//! # termsync-harvester
//!
//! Retrieval and orchestration around `termsync-core`: collection
//! configuration, the registry HTTP client, the RDF/XML reader and the
//! per-run pipeline driven by the `termsync-harvester` binary.

pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod rdfxml;
pub mod report;
pub mod telemetry;

pub use config::{Cli, CollectionConfig, HarvesterConfig};
pub use fetch::{EtagCache, FetchOutcome, Fetcher};
pub use pipeline::{harvest_document, resolve_subroot, CollectionHarvest, Harvester};
pub use report::{CollectionOutcome, CollectionStatus, HarvestReport};
pub use telemetry::{LogFormat, LogSettings};
