//! Harvester configuration.
//!
//! Configuration comes from three places:
//! - the command line (`--collections`, `--dry-run`, `--migrate`)
//! - environment variables, optionally loaded from `.env`
//! - a JSON collection list, one entry per harvested collection
//!
//! ```json
//! [
//!   {
//!     "collection_name": "L05",
//!     "source_url": "https://vocab.nerc.ac.uk/collection/L05/current/?_profile=nvs&_mediatype=application/rdf+xml",
//!     "relation_kinds": ["broader", "related"],
//!     "terminology_id": 21
//!   }
//! ]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use termsync_core::defaults;
use termsync_core::{Error, HarvestDefaults, RelationKind, RelationTypeIds, Result};

pub const ENV_STATUS_ACCEPTED_ID: &str = "TERMSYNC_STATUS_ACCEPTED_ID";
pub const ENV_TERM_CATEGORY_ID: &str = "TERMSYNC_TERM_CATEGORY_ID";
pub const ENV_ACTOR_ID: &str = "TERMSYNC_ACTOR_ID";
pub const ENV_BROADER_RELATION_ID: &str = "TERMSYNC_BROADER_RELATION_ID";
pub const ENV_RELATED_RELATION_ID: &str = "TERMSYNC_RELATED_RELATION_ID";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "TERMSYNC_HTTP_TIMEOUT_SECS";

/// Command line of the harvester binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "termsync-harvester")]
#[command(author, version, about = "Harvest SKOS collections into the term catalog")]
pub struct Cli {
    /// JSON file listing the collections to harvest
    #[arg(short, long, env = "TERMSYNC_COLLECTIONS")]
    pub collections: PathBuf,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// JSON file remembering the last ETag per collection
    #[arg(long, env = "TERMSYNC_ETAG_CACHE")]
    pub etag_cache: Option<PathBuf>,

    /// Harvest and diff, but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Run pending schema migrations before harvesting
    #[arg(long)]
    pub migrate: bool,
}

/// One collection of the registry to harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Short name, used in logs and as the ETag cache key.
    pub collection_name: String,
    /// URL of the RDF/XML document.
    pub source_url: String,
    /// Concept the walk starts from. Falls back to the terminology's URI.
    #[serde(default)]
    pub subroot_uri: Option<String>,
    /// Relation kinds harvested for every concept of the collection.
    #[serde(default)]
    pub relation_kinds: Vec<RelationKind>,
    pub terminology_id: i32,
}

/// Fully resolved harvester configuration.
#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    pub database_url: String,
    pub collections: Vec<CollectionConfig>,
    pub defaults: HarvestDefaults,
    pub http_timeout: Duration,
    pub etag_cache: Option<PathBuf>,
    pub dry_run: bool,
    pub migrate: bool,
}

impl HarvesterConfig {
    /// Build the configuration from the parsed command line and the process
    /// environment.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        Self::from_cli_with_lookup(cli, |key| std::env::var(key).ok())
    }

    /// Same as [`from_cli`](Self::from_cli) with an explicit variable lookup.
    pub fn from_cli_with_lookup<F>(cli: Cli, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let collections = load_collections(&cli.collections)?;
        let defaults = defaults_from_lookup(&lookup)?;
        let http_timeout = Duration::from_secs(env_parse(
            &lookup,
            ENV_HTTP_TIMEOUT_SECS,
            defaults::HTTP_TIMEOUT_SECS,
        )?);

        info!(
            subsystem = "harvest",
            component = "config",
            collection_count = collections.len(),
            http_timeout_secs = http_timeout.as_secs(),
            dry_run = cli.dry_run,
            etag_cache = cli.etag_cache.is_some(),
            "Configuration loaded"
        );

        Ok(Self {
            database_url: cli.database_url,
            collections,
            defaults,
            http_timeout,
            etag_cache: cli.etag_cache,
            dry_run: cli.dry_run,
            migrate: cli.migrate,
        })
    }
}

/// Read the catalog defaults, falling back to the built-in ids.
pub fn defaults_from_lookup<F>(lookup: &F) -> Result<HarvestDefaults>
where
    F: Fn(&str) -> Option<String>,
{
    let builtin = HarvestDefaults::default();
    Ok(HarvestDefaults {
        term_status_accepted_id: env_parse(
            lookup,
            ENV_STATUS_ACCEPTED_ID,
            builtin.term_status_accepted_id,
        )?,
        term_category_id: env_parse(lookup, ENV_TERM_CATEGORY_ID, builtin.term_category_id)?,
        actor_id: env_parse(lookup, ENV_ACTOR_ID, builtin.actor_id)?,
        relation_types: RelationTypeIds {
            broader: env_parse(
                lookup,
                ENV_BROADER_RELATION_ID,
                builtin.relation_types.broader,
            )?,
            related_to: env_parse(
                lookup,
                ENV_RELATED_RELATION_ID,
                builtin.relation_types.related_to,
            )?,
        },
    })
}

fn env_parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} is not a valid number: {raw:?}"))),
        _ => Ok(default),
    }
}

/// Load and validate a JSON collection list.
pub fn load_collections(path: &Path) -> Result<Vec<CollectionConfig>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "cannot read collection list {}: {e}",
            path.display()
        ))
    })?;
    let collections = parse_collections(&raw)?;
    debug!(
        subsystem = "harvest",
        component = "config",
        path = %path.display(),
        collection_count = collections.len(),
        "Collection list read"
    );
    Ok(collections)
}

/// Parse and validate a JSON collection list. Unknown relation kinds are
/// rejected here, before anything is fetched.
pub fn parse_collections(raw: &str) -> Result<Vec<CollectionConfig>> {
    let collections: Vec<CollectionConfig> = serde_json::from_str(raw)
        .map_err(|e| Error::Config(format!("invalid collection list: {e}")))?;
    validate(&collections)?;
    Ok(collections)
}

fn validate(collections: &[CollectionConfig]) -> Result<()> {
    let mut names = HashSet::new();
    for c in collections {
        if c.collection_name.trim().is_empty() {
            return Err(Error::Config("collection_name must not be empty".into()));
        }
        if c.source_url.trim().is_empty() {
            return Err(Error::Config(format!(
                "collection {} has an empty source_url",
                c.collection_name
            )));
        }
        if !names.insert(c.collection_name.as_str()) {
            return Err(Error::Config(format!(
                "collection {} is listed twice",
                c.collection_name
            )));
        }
    }
    Ok(())
}
