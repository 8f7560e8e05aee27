//! Knowledge loader for consumers.
//!
//! Fetches the four published resources from an [`ArtifactSource`] and
//! assembles a [`KnowledgeBase`]. Each resource is fetched and parsed on its
//! own: a missing, slow or malformed resource is logged and left out, and
//! never prevents the others from loading.
//!
//! Snapshot binding: `CURRENT` is read first. When it names a version, all
//! four resources come from `snapshots/<version>/`, so a consumer never
//! mixes files from two runs. Without `CURRENT` the flat layout
//! (`<base>/graph.json`, ...) is used.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use knowledge_harness_core::artifacts::{
    parse_resource, snapshot_path, ContentIndexResource, GraphResource, MetadataResource,
    OntologyResource, CONTENT_INDEX_FILE, CURRENT_FILE, GRAPH_FILE, METADATA_FILE, ONTOLOGY_FILE,
};
use knowledge_harness_core::knowledge::KnowledgeBase;
use knowledge_harness_core::KnowledgeError;

use crate::config::Config;

/// Where published artifacts are read from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Human-readable location for logs.
    fn describe(&self) -> String;

    /// Body of the artifact at `name`, relative to the base.
    async fn fetch(&self, name: &str) -> Result<String, KnowledgeError>;
}

/// Artifacts served over HTTP(S).
pub struct HttpArtifacts {
    client: reqwest::Client,
    base: String,
}

impl HttpArtifacts {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifacts {
    fn describe(&self) -> String {
        self.base.clone()
    }

    async fn fetch(&self, name: &str) -> Result<String, KnowledgeError> {
        let url = format!("{}/{}", self.base, name);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| KnowledgeError::unavailable(name, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KnowledgeError::unavailable(name, format!("HTTP {}", status)));
        }
        response
            .text()
            .await
            .map_err(|e| KnowledgeError::unavailable(name, e))
    }
}

/// Artifacts in a local directory (typically the publish directory).
pub struct DirArtifacts {
    root: PathBuf,
}

impl DirArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactSource for DirArtifacts {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn fetch(&self, name: &str) -> Result<String, KnowledgeError> {
        tokio::fs::read_to_string(self.root.join(name))
            .await
            .map_err(|e| KnowledgeError::unavailable(name, e))
    }
}

/// `http://` and `https://` bases are fetched over the network; anything
/// else is a directory.
pub fn source_for(base: &str) -> Result<Box<dyn ArtifactSource>> {
    if base.starts_with("http://") || base.starts_with("https://") {
        Ok(Box::new(HttpArtifacts::new(base)?))
    } else {
        Ok(Box::new(DirArtifacts::new(base)))
    }
}

async fn fetch_with_timeout(
    source: &dyn ArtifactSource,
    name: &str,
    timeout: Duration,
) -> Result<String, KnowledgeError> {
    match tokio::time::timeout(timeout, source.fetch(name)).await {
        Ok(result) => result,
        Err(_) => Err(KnowledgeError::unavailable(
            name,
            format!("timed out after {:?}", timeout),
        )),
    }
}

async fn load_resource<T: DeserializeOwned>(
    source: &dyn ArtifactSource,
    name: &str,
    timeout: Duration,
) -> Option<T> {
    let parsed = match fetch_with_timeout(source, name, timeout).await {
        Ok(body) => parse_resource::<T>(name, &body),
        Err(e) => Err(e),
    };
    match parsed {
        Ok(resource) => Some(resource),
        Err(e) => {
            tracing::warn!(source = %source.describe(), error = %e, "knowledge resource not loaded");
            None
        }
    }
}

/// Snapshot named by `CURRENT`, if any.
async fn current_snapshot(source: &dyn ArtifactSource, timeout: Duration) -> Option<u64> {
    let text = match fetch_with_timeout(source, CURRENT_FILE, timeout).await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "no CURRENT pointer, using flat layout");
            return None;
        }
    };
    match text.trim().parse() {
        Ok(version) => Some(version),
        Err(_) => {
            tracing::warn!(current = %text.trim(), "CURRENT does not name a snapshot, using flat layout");
            None
        }
    }
}

/// Fetch all four resources concurrently and assemble a knowledge base.
pub async fn load_knowledge(
    source: &dyn ArtifactSource,
    timeout: Duration,
    extra_terms: &[String],
) -> KnowledgeBase {
    let snapshot = current_snapshot(source, timeout).await;
    let path = |file: &str| match snapshot {
        Some(version) => snapshot_path(version, file),
        None => file.to_string(),
    };
    let (metadata_path, ontology_path, graph_path, index_path) = (
        path(METADATA_FILE),
        path(ONTOLOGY_FILE),
        path(GRAPH_FILE),
        path(CONTENT_INDEX_FILE),
    );

    let (metadata, ontology, graph, content_index) = tokio::join!(
        load_resource::<MetadataResource>(source, &metadata_path, timeout),
        load_resource::<OntologyResource>(source, &ontology_path, timeout),
        load_resource::<GraphResource>(source, &graph_path, timeout),
        load_resource::<ContentIndexResource>(source, &index_path, timeout),
    );

    let kb = KnowledgeBase::new(snapshot, metadata, ontology, graph, content_index, extra_terms);
    tracing::info!(
        source = %source.describe(),
        snapshot = ?snapshot,
        loaded = kb.loaded_count(),
        "knowledge loaded"
    );
    kb
}

/// What the loader remembers between calls.
enum Cached {
    Loaded(Arc<KnowledgeBase>),
    /// A load that produced nothing, reused until the retry window passes.
    Empty { kb: Arc<KnowledgeBase>, at: Instant },
}

/// Memoizing loader shared by the CLI and the server.
///
/// Fetches never run under the cache lock, so slow sources do not
/// serialize readers.
pub struct KnowledgeLoader {
    source: Box<dyn ArtifactSource>,
    timeout: Duration,
    extra_terms: Vec<String>,
    empty_retry: Duration,
    cached: RwLock<Option<Cached>>,
}

impl KnowledgeLoader {
    pub fn new(source: Box<dyn ArtifactSource>, timeout: Duration, extra_terms: Vec<String>) -> Self {
        Self {
            source,
            timeout,
            extra_terms,
            empty_retry: Duration::from_secs(5),
            cached: RwLock::new(None),
        }
    }

    /// How long an empty load is reused before [`Self::initialize`] fetches
    /// again. Zero retries on every call.
    pub fn with_empty_retry(mut self, window: Duration) -> Self {
        self.empty_retry = window;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            source_for(&config.artifact_base())?,
            Duration::from_secs(config.consumer.fetch_timeout_secs),
            config.consumer.vocabulary.clone(),
        )
        .with_empty_retry(Duration::from_secs(config.consumer.empty_retry_secs)))
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    async fn fetch(&self) -> Arc<KnowledgeBase> {
        Arc::new(load_knowledge(self.source.as_ref(), self.timeout, &self.extra_terms).await)
    }

    /// The cached knowledge base, loading it on first use.
    ///
    /// A load that produced at least one resource is kept for good. An
    /// empty one is reused for the retry window, then fetched again.
    pub async fn initialize(&self) -> Arc<KnowledgeBase> {
        match self.cached.read().await.as_ref() {
            Some(Cached::Loaded(kb)) => return kb.clone(),
            Some(Cached::Empty { kb, at }) if at.elapsed() < self.empty_retry => return kb.clone(),
            _ => {}
        }

        let kb = self.fetch().await;
        let mut cached = self.cached.write().await;
        // Another caller may have finished a load while this one fetched.
        if let Some(Cached::Loaded(existing)) = cached.as_ref() {
            return existing.clone();
        }
        *cached = Some(if kb.is_empty() {
            Cached::Empty {
                kb: kb.clone(),
                at: Instant::now(),
            }
        } else {
            Cached::Loaded(kb.clone())
        });
        kb
    }

    /// Reload unconditionally. The cache is replaced only when the new load
    /// produced at least one resource; otherwise the previous knowledge base
    /// stays in place and is returned.
    pub async fn refresh(&self) -> Arc<KnowledgeBase> {
        let kb = self.fetch().await;
        let mut cached = self.cached.write().await;
        if kb.is_empty() {
            if let Some(Cached::Loaded(previous)) = cached.as_ref() {
                tracing::warn!("reload produced no resources, keeping previous knowledge");
                return previous.clone();
            }
            *cached = Some(Cached::Empty {
                kb: kb.clone(),
                at: Instant::now(),
            });
            return kb;
        }
        *cached = Some(Cached::Loaded(kb.clone()));
        kb
    }

    /// The cached non-empty knowledge base, if any.
    pub async fn current(&self) -> Option<Arc<KnowledgeBase>> {
        match self.cached.read().await.as_ref() {
            Some(Cached::Loaded(kb)) => Some(kb.clone()),
            _ => None,
        }
    }
}
