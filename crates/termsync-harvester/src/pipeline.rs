//! One harvest run over the configured collections.
//!
//! Collections are harvested in configuration order. A failure confined to
//! one collection (fetch, parse, walk or a malformed concept) is recorded in
//! the report and the run moves on; store errors end the run. The merged
//! records of every harvested collection are then reconciled in one go.
//! Relations resolve against every configured terminology the store knows,
//! including collections that were unchanged or failed this run.

use std::collections::BTreeSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use termsync_core::{
    synchronize_within, walk_from, HarvestDefaults, Reconciler, RecordExtractor, Result, TermRecord,
    TermStore, TerminologyInfo,
};

use crate::config::CollectionConfig;
use crate::fetch::{EtagCache, FetchOutcome, Fetcher};
use crate::rdfxml;
use crate::report::{CollectionOutcome, CollectionStatus, HarvestReport};

/// Records harvested from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionHarvest {
    pub records: Vec<TermRecord>,
    pub levels: usize,
}

/// Parse a document, walk it from the collection's subroot and extract
/// every descendant concept.
pub fn harvest_document(
    document: &str,
    collection: &CollectionConfig,
    subroot_uri: &str,
    terminology: &TerminologyInfo,
    defaults: HarvestDefaults,
) -> Result<CollectionHarvest> {
    let graph = rdfxml::parse(document)?;
    let outcome = walk_from(&graph, subroot_uri)?;
    let extractor = RecordExtractor::new(defaults, collection.terminology_id);
    let records = extractor.extract_all(
        outcome.nodes.iter().copied(),
        &collection.relation_kinds,
        terminology.semantic_uri.as_deref(),
    )?;
    Ok(CollectionHarvest {
        records,
        levels: outcome.levels,
    })
}

/// Subroot of a collection: configured explicitly or the terminology's URI.
pub fn resolve_subroot<'a>(
    collection: &'a CollectionConfig,
    terminology: &'a TerminologyInfo,
) -> Option<&'a str> {
    collection
        .subroot_uri
        .as_deref()
        .or(terminology.uri.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Terminology ids of the configured collections that exist in the store.
fn configured_terminologies(collections: &[CollectionConfig], known: &BTreeSet<i32>) -> Vec<i32> {
    collections
        .iter()
        .map(|c| c.terminology_id)
        .filter(|id| known.contains(id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Drives fetch, harvest and reconciliation against a store.
pub struct Harvester<'a> {
    store: &'a dyn TermStore,
    fetcher: &'a Fetcher,
    defaults: HarvestDefaults,
}

enum Step {
    Harvested(CollectionHarvest, Option<String>),
    Unchanged,
    Skipped(String),
}

impl<'a> Harvester<'a> {
    pub fn new(store: &'a dyn TermStore, fetcher: &'a Fetcher, defaults: HarvestDefaults) -> Self {
        Self {
            store,
            fetcher,
            defaults,
        }
    }

    /// Harvest every collection and reconcile the merged result. ETags of
    /// harvested collections are stored only after a successful write.
    pub async fn run(
        &self,
        collections: &[CollectionConfig],
        mut etags: Option<&mut EtagCache>,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Result<HarvestReport> {
        let start = Instant::now();
        let known = self.store.terminology_ids().await?;
        info!(
            subsystem = "harvest",
            op = "run",
            collection_count = collections.len(),
            dry_run,
            "Harvest started"
        );

        let mut report = HarvestReport::default();
        let mut merged: Vec<TermRecord> = Vec::new();
        let mut fresh_etags: Vec<(String, String)> = Vec::new();

        for collection in collections {
            let cached = etags
                .as_deref()
                .and_then(|cache| cache.get(&collection.collection_name))
                .map(str::to_string);
            let status = match self
                .harvest_collection(collection, &known, cached.as_deref())
                .await
            {
                Ok(Step::Harvested(harvest, etag)) => {
                    let status = CollectionStatus::Harvested {
                        records: harvest.records.len(),
                        levels: harvest.levels,
                    };
                    merged.extend(harvest.records);
                    if let Some(etag) = etag {
                        fresh_etags.push((collection.collection_name.clone(), etag));
                    }
                    status
                }
                Ok(Step::Unchanged) => CollectionStatus::Unchanged,
                Ok(Step::Skipped(reason)) => {
                    warn!(
                        subsystem = "harvest",
                        collection = %collection.collection_name,
                        terminology_id = collection.terminology_id,
                        reason = %reason,
                        "Collection skipped"
                    );
                    CollectionStatus::Skipped { reason }
                }
                Err(e) if e.is_collection_scoped() => {
                    error!(
                        subsystem = "harvest",
                        collection = %collection.collection_name,
                        terminology_id = collection.terminology_id,
                        error = %e,
                        "Collection aborted"
                    );
                    CollectionStatus::Failed {
                        error: e.to_string(),
                    }
                }
                Err(e) => return Err(e),
            };
            report.collections.push(CollectionOutcome {
                collection: collection.collection_name.clone(),
                terminology_id: collection.terminology_id,
                status,
            });
        }

        let relation_scope = configured_terminologies(collections, &known);
        let reconciler = Reconciler::new(self.defaults);
        report.sync = synchronize_within(
            self.store,
            &reconciler,
            &merged,
            &relation_scope,
            now,
            dry_run,
        )
        .await?;

        if let Some(cache) = etags.as_deref_mut() {
            if !dry_run && !fresh_etags.is_empty() {
                for (name, etag) in fresh_etags {
                    cache.set(name, etag);
                }
                if let Err(e) = cache.save() {
                    warn!(
                        subsystem = "harvest",
                        component = "etag_cache",
                        path = %cache.path().display(),
                        error = %e,
                        "ETag cache not saved"
                    );
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    async fn harvest_collection(
        &self,
        collection: &CollectionConfig,
        known: &BTreeSet<i32>,
        cached_etag: Option<&str>,
    ) -> Result<Step> {
        let start = Instant::now();
        if !known.contains(&collection.terminology_id) {
            return Ok(Step::Skipped(format!(
                "terminology {} is not in the store",
                collection.terminology_id
            )));
        }
        let Some(terminology) = self.store.terminology(collection.terminology_id).await? else {
            return Ok(Step::Skipped(format!(
                "terminology {} is not in the store",
                collection.terminology_id
            )));
        };
        let Some(subroot) = resolve_subroot(collection, &terminology) else {
            return Ok(Step::Skipped(format!(
                "no subroot_uri configured and terminology {} has no uri",
                collection.terminology_id
            )));
        };

        let (document, etag) = match self.fetcher.fetch(&collection.source_url, cached_etag).await? {
            FetchOutcome::NotModified => return Ok(Step::Unchanged),
            FetchOutcome::Document { body, etag } => (body, etag),
        };
        debug!(
            subsystem = "harvest",
            collection = %collection.collection_name,
            subroot,
            anchor = terminology.semantic_uri.as_deref().unwrap_or(""),
            "Walking collection"
        );

        let harvest = harvest_document(&document, collection, subroot, &terminology, self.defaults)?;
        info!(
            subsystem = "harvest",
            collection = %collection.collection_name,
            terminology_id = collection.terminology_id,
            record_count = harvest.records.len(),
            levels = harvest.levels,
            duration_ms = start.elapsed().as_millis() as u64,
            "Collection harvested"
        );
        Ok(Step::Harvested(harvest, etag))
    }
}
