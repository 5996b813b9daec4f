//! Vocabulary document retrieval.
//!
//! A `HEAD` request decides whether the registry serves RDF/XML before the
//! document is downloaded. An optional [`EtagCache`] turns the download into
//! a conditional `GET`; `304 Not Modified` means the collection is skipped.
//! No retries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use termsync_core::{Error, Result};

/// Content types accepted for a vocabulary document.
const ACCEPTED_CONTENT_TYPES: &[&str] = &["application/rdf+xml", "text/xml"];

/// Result of one retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Document { body: String, etag: Option<String> },
    /// The registry confirmed the cached ETag.
    NotModified,
}

/// HTTP client for registry documents.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Download `url` if it is served as RDF/XML. With `cached_etag` the
    /// download is conditional.
    pub async fn fetch(&self, url: &str, cached_etag: Option<&str>) -> Result<FetchOutcome> {
        let start = Instant::now();
        self.check_content_type(url).await?;

        let mut request = self.client.get(url);
        if let Some(etag) = cached_etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        let response = request.send().await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            debug!(
                subsystem = "harvest",
                component = "fetch",
                url,
                "Document not modified since last harvest"
            );
            return Ok(FetchOutcome::NotModified);
        }
        if !response.status().is_success() {
            return Err(Error::Fetch(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        debug!(
            subsystem = "harvest",
            component = "fetch",
            url,
            bytes = body.len(),
            has_etag = etag.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Document downloaded"
        );
        Ok(FetchOutcome::Document { body, etag })
    }

    async fn check_content_type(&self, url: &str) -> Result<()> {
        let head = self.client.head(url).send().await?;
        if !head.status().is_success() {
            return Err(Error::Fetch(format!("HEAD {url} returned {}", head.status())));
        }
        let content_type = head
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        debug!(
            subsystem = "harvest",
            component = "fetch",
            url,
            content_type,
            "Content type checked"
        );
        if is_accepted_content_type(content_type) {
            Ok(())
        } else {
            Err(Error::Fetch(format!(
                "{url} is served as {content_type:?}, not RDF/XML"
            )))
        }
    }
}

fn is_accepted_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    ACCEPTED_CONTENT_TYPES.iter().any(|t| lower.contains(t))
}

/// Last seen ETag per collection name, kept in a JSON file.
#[derive(Debug, Clone, Default)]
pub struct EtagCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl EtagCache {
    /// Load the cache. A missing or unreadable file starts an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(
                    subsystem = "harvest",
                    component = "etag_cache",
                    path = %path.display(),
                    error = %e,
                    "ETag cache unreadable, starting empty"
                );
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, collection: &str) -> Option<&str> {
        self.entries.get(collection).map(String::as_str)
    }

    pub fn set(&mut self, collection: impl Into<String>, etag: impl Into<String>) {
        self.entries.insert(collection.into(), etag.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}
