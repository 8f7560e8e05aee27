//! Sync pipeline orchestration.
//!
//! One run takes the complete current document set from a connector and
//! produces the next knowledge snapshot:
//!
//! load → detect changes → classify → extract + merge → embed → index →
//! ledger → stage artifacts → commit → swap `CURRENT`
//!
//! Everything up to the commit mutates a private working set, so a failed
//! run leaves the committed snapshot and the published pointer untouched.
//! Recoverable problems (ambiguous classification, definition conflicts,
//! embedding failures) become ledger notes; only a failed commit aborts.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use knowledge_harness_core::change::{detect_changes, ChangeSet};
use knowledge_harness_core::extract::Extractor;
use knowledge_harness_core::graph::{DefinitionPolicy, MergeReport};
use knowledge_harness_core::highlight::Vocabulary;
use knowledge_harness_core::ledger::{RunSummary, SyncCounts, SyncRecord};
use knowledge_harness_core::models::{DocumentRecord, Fingerprint, PendingEmbedding, SourceDocument};
use knowledge_harness_core::state::KnowledgeState;
use knowledge_harness_core::store::StateStore;
use knowledge_harness_core::KnowledgeError;

use crate::classify::AxisClassifier;
use crate::config::Config;
use crate::connector_fs::FilesystemConnector;
use crate::embedding::{create_provider, generate_embeddings, EmbeddingProvider, EmbeddingTarget};
use crate::publish::Publisher;
use crate::sqlite_store::SqliteStateStore;
use crate::traits::{Connector, SourceSet};

/// How the embedding step behaves for a run.
pub enum EmbeddingStage {
    /// Step skipped; nothing is left pending.
    Disabled,
    Provider(Box<dyn EmbeddingProvider>),
    /// The provider could not be constructed; every target goes pending
    /// with this reason.
    Unavailable(String),
}

/// Stages of a sync run, built once from config.
pub struct SyncPipeline {
    classifier: AxisClassifier,
    extractor: Extractor,
    policy: DefinitionPolicy,
    embedding: EmbeddingStage,
    batch_size: usize,
    publisher: Option<Publisher>,
}

impl SyncPipeline {
    /// Pipeline without embeddings or publishing.
    pub fn new(classifier: AxisClassifier, extractor: Extractor, policy: DefinitionPolicy) -> Self {
        Self {
            classifier,
            extractor,
            policy,
            embedding: EmbeddingStage::Disabled,
            batch_size: 64,
            publisher: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let classifier = AxisClassifier::new(&config.classifier)?;
        let terms = Vocabulary::from_terms(
            config
                .extraction
                .terms
                .iter()
                .map(|t| (t.as_str(), None::<String>)),
        );

        let embedding = match create_provider(&config.embedding) {
            Ok(Some(provider)) => EmbeddingStage::Provider(provider),
            Ok(None) => EmbeddingStage::Disabled,
            Err(e) => {
                tracing::warn!(error = %e, "embedding provider unavailable, documents will be left pending");
                EmbeddingStage::Unavailable(e.to_string())
            }
        };

        Ok(Self::new(classifier, Extractor::new(terms), config.graph.definition_policy)
            .with_embedding(embedding, config.embedding.batch_size)
            .with_publisher(Publisher::new(&config.publish)))
    }

    pub fn with_embedding(mut self, stage: EmbeddingStage, batch_size: usize) -> Self {
        self.embedding = stage;
        self.batch_size = batch_size;
        self
    }

    pub fn with_publisher(mut self, publisher: Publisher) -> Self {
        self.publisher = Some(publisher);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub revision: Option<String>,
    pub repository: Option<String>,
    /// Detect and classify only; nothing is written.
    pub dry_run: bool,
}

/// What a run did.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub changes: ChangeSet,
    pub low_confidence: usize,
    /// Previously synced ids the source could not read; kept as unchanged.
    pub unreadable: Vec<String>,
    pub merge: MergeReport,
    pub nodes_pruned: usize,
    pub edges_removed: usize,
    pub embedded: usize,
    /// Ledger record of the committed run; `None` for a dry run.
    pub record: Option<SyncRecord>,
    pub published: Option<PathBuf>,
    /// Old snapshot directories removed after publishing.
    pub snapshots_pruned: usize,
}

/// Run the pipeline over `source` against `store`.
pub async fn sync_documents(
    store: &dyn StateStore,
    pipeline: &SyncPipeline,
    source: impl Into<SourceSet>,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let SourceSet {
        documents: docs,
        unreadable,
    } = source.into();
    let base = store.load().await?;
    let mut changes = detect_changes(&docs, &base.fingerprints);
    let kept = changes.keep_unreadable(&unreadable);
    if !kept.is_empty() {
        tracing::warn!(count = kept.len(), "unreadable documents kept at their previous version");
    }

    let mut incoming: BTreeMap<String, SourceDocument> = BTreeMap::new();
    for doc in docs {
        incoming.insert(doc.id.clone(), doc);
    }

    let mut report = SyncReport {
        unreadable: kept,
        ..Default::default()
    };

    if options.dry_run {
        report.low_confidence = changes
            .changed()
            .filter_map(|id| incoming.get(id))
            .filter(|doc| pipeline.classifier.classify(doc).0.low_confidence)
            .count();
        report.changes = changes;
        return Ok(report);
    }

    let now = Utc::now();
    let mut next = base.next_working_set();
    let mut notes: Vec<String> = report
        .unreadable
        .iter()
        .map(|id| KnowledgeError::unavailable(id.as_str(), "unreadable, previous version kept").to_string())
        .collect();

    for id in &changes.deleted {
        let pruned = next.remove_document(id);
        tracing::debug!(document = %id, nodes_pruned = pruned.nodes_pruned.len(), "document deleted");
        report.nodes_pruned += pruned.nodes_pruned.len();
        report.edges_removed += pruned.edges_removed;
    }

    for id in changes.changed() {
        let Some(doc) = incoming.get(id) else { continue };
        let hash = changes.hashes[id].clone();

        let (classification, note) = pipeline.classifier.classify(doc);
        if let Some(note) = note {
            tracing::info!(%note, "low-confidence classification");
            notes.push(note.to_string());
            report.low_confidence += 1;
        }

        next.documents.insert(
            id.clone(),
            DocumentRecord {
                id: id.clone(),
                title: doc.title(),
                doc_type: doc.doc_type(),
                category: doc.category.clone(),
                axes: classification.axes.clone(),
                low_confidence: classification.low_confidence,
                content_hash: hash.clone(),
            },
        );
        next.fingerprints.insert(
            id.clone(),
            Fingerprint {
                document_id: id.clone(),
                content_hash: hash,
                last_synced: now,
            },
        );

        let extraction = pipeline.extractor.extract(&doc.content);
        let merged = next
            .graph
            .merge_document(id, &classification.axes, &extraction, pipeline.policy);
        notes.extend(merged.conflicts.iter().map(|c| c.to_string()));
        report.merge.absorb(merged);
    }

    report.embedded = embed_stage(pipeline, &mut next, &incoming, &changes, now, &mut notes).await;

    let touched: BTreeSet<&String> = changes.changed().chain(changes.deleted.iter()).collect();
    next.index
        .refresh(touched.into_iter(), &next.documents, &next.graph);

    next.ledger.append(
        RunSummary {
            snapshot: next.version,
            revision: options.revision.clone(),
            repository: options.repository.clone(),
            counts: SyncCounts {
                added: changes.new.len() as u64,
                updated: changes.modified.len() as u64,
                unchanged: changes.unchanged.len() as u64,
                deleted: changes.deleted.len() as u64,
            },
            document_count: next.documents.len() as u64,
            concept_count: next.graph.node_count() as u64,
            edge_count: next.graph.edge_count() as u64,
            pending_embeddings: next.pending.len() as u64,
            notes,
        },
        now,
    );

    let version = next.version;
    if let Some(publisher) = &pipeline.publisher {
        match publisher.stage(&next).await {
            Ok(dir) => report.published = Some(dir),
            Err(e) => {
                publisher.discard(version).await;
                return Err(KnowledgeError::SnapshotPersist {
                    version,
                    reason: format!("{:#}", e),
                }
                .into());
            }
        }
    }

    let committed = match store.commit(next).await {
        Ok(committed) => committed,
        Err(e) => {
            if let Some(publisher) = &pipeline.publisher {
                publisher.discard(version).await;
            }
            tracing::error!(version, error = %e, "snapshot commit failed");
            return Err(KnowledgeError::SnapshotPersist {
                version,
                reason: format!("{:#}", e),
            }
            .into());
        }
    };

    if let Some(publisher) = &pipeline.publisher {
        publisher
            .swap_current(version)
            .await
            .with_context(|| format!("snapshot {} committed but CURRENT was not updated", version))?;
        report.snapshots_pruned = publisher.prune(version).await.len();
    }

    tracing::info!(
        snapshot = version,
        added = changes.new.len(),
        updated = changes.modified.len(),
        deleted = changes.deleted.len(),
        concepts = committed.graph.node_count(),
        edges = committed.graph.edge_count(),
        "sync committed"
    );

    report.record = committed.ledger.latest().cloned();
    report.changes = changes;
    Ok(report)
}

/// Embed changed documents plus everything still pending from earlier
/// runs. Returns the number of vectors written.
async fn embed_stage(
    pipeline: &SyncPipeline,
    next: &mut KnowledgeState,
    incoming: &BTreeMap<String, SourceDocument>,
    changes: &ChangeSet,
    now: DateTime<Utc>,
    notes: &mut Vec<String>,
) -> usize {
    // A vector computed from older content is stale once the text changes.
    for id in changes.changed() {
        if next
            .embeddings
            .get(id)
            .is_some_and(|e| e.content_hash != changes.hashes[id])
        {
            next.embeddings.remove(id);
        }
    }

    let ids: BTreeSet<&String> = changes.changed().chain(next.pending.keys()).collect();
    let targets: Vec<EmbeddingTarget> = ids
        .into_iter()
        .filter_map(|id| {
            let doc = incoming.get(id)?;
            Some(EmbeddingTarget {
                document_id: id.clone(),
                text: doc.content.clone(),
                content_hash: changes.hashes.get(id)?.clone(),
            })
        })
        .collect();

    match &pipeline.embedding {
        EmbeddingStage::Disabled => {
            next.pending.clear();
            0
        }
        EmbeddingStage::Unavailable(reason) => {
            for target in &targets {
                mark_pending(next, &target.document_id, reason, now);
            }
            if !targets.is_empty() {
                notes.push(format!(
                    "embedding provider unavailable, {} document(s) pending: {}",
                    targets.len(),
                    reason
                ));
            }
            0
        }
        EmbeddingStage::Provider(provider) => {
            if targets.is_empty() {
                return 0;
            }
            let outcome =
                generate_embeddings(provider.as_ref(), &targets, pipeline.batch_size, now).await;
            let written = outcome.records.len();
            for record in outcome.records {
                next.pending.remove(&record.document_id);
                next.embeddings.insert(record.document_id.clone(), record);
            }
            for pending in outcome.pending {
                notes.push(
                    KnowledgeError::EmbeddingProviderFailure {
                        document: pending.document_id.clone(),
                        reason: pending.reason.clone(),
                    }
                    .to_string(),
                );
                mark_pending(next, &pending.document_id, &pending.reason, now);
            }
            written
        }
    }
}

/// Record a pending embedding, keeping the time it first went pending.
fn mark_pending(next: &mut KnowledgeState, id: &str, reason: &str, now: DateTime<Utc>) {
    let since = next.pending.get(id).map(|p| p.since).unwrap_or(now);
    next.pending.insert(
        id.to_string(),
        PendingEmbedding {
            document_id: id.to_string(),
            reason: reason.to_string(),
            since,
        },
    );
}

pub async fn run_sync(config: &Config, revision: Option<String>, dry_run: bool) -> Result<()> {
    let connector = FilesystemConnector::new(config.source.clone());
    let source = connector.scan().await?;

    let store = SqliteStateStore::open(&config.db.path).await?;
    let pipeline = SyncPipeline::from_config(config)?;
    let options = SyncOptions {
        revision,
        repository: config.source.repository.clone(),
        dry_run,
    };

    let report = sync_documents(&store, &pipeline, source, &options).await;
    store.pool().close().await;
    let report = report?;

    let changes = &report.changes;
    if dry_run {
        println!("sync {} (dry-run)", connector.name());
        println!("  new: {}", changes.new.len());
        println!("  modified: {}", changes.modified.len());
        println!("  unchanged: {}", changes.unchanged.len());
        println!("  deleted: {}", changes.deleted.len());
        println!("  unreadable: {}", report.unreadable.len());
        println!("  low-confidence: {}", report.low_confidence);
        return Ok(());
    }

    println!("sync {}", connector.name());
    println!("  new: {}", changes.new.len());
    println!("  modified: {}", changes.modified.len());
    println!("  unchanged: {}", changes.unchanged.len());
    println!("  deleted: {}", changes.deleted.len());
    if !report.unreadable.is_empty() {
        println!("  unreadable (kept): {}", report.unreadable.len());
    }
    println!(
        "  concepts added: {}  edges added: {}",
        report.merge.nodes_added, report.merge.edges_added
    );
    if report.nodes_pruned > 0 {
        println!(
            "  concepts pruned: {}  edges removed: {}",
            report.nodes_pruned, report.edges_removed
        );
    }
    println!("  embeddings written: {}", report.embedded);
    if let Some(record) = &report.record {
        println!("  embeddings pending: {}", record.pending_embeddings);
        println!(
            "  graph: {} concepts, {} edges",
            record.concept_count, record.edge_count
        );
        if !record.notes.is_empty() {
            println!("  notes: {}", record.notes.len());
        }
        println!("  snapshot: {}", record.snapshot);
    }
    if let Some(dir) = &report.published {
        println!("  published: {}", dir.display());
    }
    if report.snapshots_pruned > 0 {
        println!("  old snapshots removed: {}", report.snapshots_pruned);
    }
    println!("ok");

    Ok(())
}
