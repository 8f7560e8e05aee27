//! SQLite-backed [`StateStore`].
//!
//! A commit rewrites every state table and appends the new ledger rows in
//! one transaction, so a failed commit leaves the previous snapshot fully
//! intact. Ledger rows are insert-only. The content index is not stored; it
//! is rebuilt from documents and graph on load.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use knowledge_harness_core::graph::{ConceptNode, Edge, KnowledgeGraph};
use knowledge_harness_core::ledger::{Ledger, SyncRecord};
use knowledge_harness_core::models::{
    DocumentRecord, EmbeddingRecord, Fingerprint, PendingEmbedding,
};
use knowledge_harness_core::state::KnowledgeState;
use knowledge_harness_core::store::{check_successor, StateStore};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::{db, migrate};

pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `path`, creating the schema if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect_path(path).await?;
        migrate::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn committed_version(&self) -> Result<u64> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM snapshot_meta WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.unwrap_or(0) as u64)
    }

    /// Full ledger, oldest first.
    pub async fn ledger(&self) -> Result<Ledger> {
        let rows = sqlx::query("SELECT record_json FROM sync_ledger ORDER BY sequence")
            .fetch_all(&self.pool)
            .await?;
        let records = rows
            .iter()
            .map(|row| {
                let json: String = row.get("record_json");
                serde_json::from_str::<SyncRecord>(&json).context("corrupt ledger row")
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Ledger::from_records(records))
    }
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid timestamp '{}'", value))?
        .with_timezone(&Utc))
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self) -> Result<Arc<KnowledgeState>> {
        let mut state = KnowledgeState {
            version: self.committed_version().await?,
            ..Default::default()
        };

        for row in sqlx::query("SELECT document_id, content_hash, last_synced FROM fingerprints")
            .fetch_all(&self.pool)
            .await?
        {
            let document_id: String = row.get("document_id");
            let last_synced: String = row.get("last_synced");
            state.fingerprints.insert(
                document_id.clone(),
                Fingerprint {
                    document_id,
                    content_hash: row.get("content_hash"),
                    last_synced: parse_ts(&last_synced)?,
                },
            );
        }

        for row in sqlx::query(
            "SELECT id, title, doc_type, category, axes_json, low_confidence, content_hash FROM documents",
        )
        .fetch_all(&self.pool)
        .await?
        {
            let id: String = row.get("id");
            let axes_json: String = row.get("axes_json");
            let low_confidence: i64 = row.get("low_confidence");
            state.documents.insert(
                id.clone(),
                DocumentRecord {
                    id,
                    title: row.get("title"),
                    doc_type: row.get("doc_type"),
                    category: row.get("category"),
                    axes: serde_json::from_str(&axes_json)?,
                    low_confidence: low_confidence != 0,
                    content_hash: row.get("content_hash"),
                },
            );
        }

        let mut nodes = Vec::new();
        for row in sqlx::query("SELECT id, name, definition, axes_json, sources_json FROM concepts")
            .fetch_all(&self.pool)
            .await?
        {
            let axes_json: String = row.get("axes_json");
            let sources_json: String = row.get("sources_json");
            nodes.push(ConceptNode {
                id: row.get("id"),
                name: row.get("name"),
                definition: row.get("definition"),
                axes: serde_json::from_str(&axes_json)?,
                sources: serde_json::from_str(&sources_json)?,
            });
        }

        let mut edges = Vec::new();
        for row in sqlx::query("SELECT source, target, relation, provenance_json FROM edges")
            .fetch_all(&self.pool)
            .await?
        {
            let provenance_json: String = row.get("provenance_json");
            edges.push(Edge {
                source: row.get("source"),
                target: row.get("target"),
                relation: row.get("relation"),
                provenance: serde_json::from_str(&provenance_json)?,
            });
        }
        state.graph = KnowledgeGraph::from_parts(nodes, edges);

        for row in
            sqlx::query("SELECT document_id, model, dims, content_hash, embedding FROM embeddings")
                .fetch_all(&self.pool)
                .await?
        {
            let document_id: String = row.get("document_id");
            let dims: i64 = row.get("dims");
            let blob: Vec<u8> = row.get("embedding");
            state.embeddings.insert(
                document_id.clone(),
                EmbeddingRecord {
                    document_id,
                    model: row.get("model"),
                    dims: dims as usize,
                    content_hash: row.get("content_hash"),
                    vector: blob_to_vec(&blob),
                },
            );
        }

        for row in sqlx::query("SELECT document_id, reason, since FROM pending_embeddings")
            .fetch_all(&self.pool)
            .await?
        {
            let document_id: String = row.get("document_id");
            let since: String = row.get("since");
            state.pending.insert(
                document_id.clone(),
                PendingEmbedding {
                    document_id,
                    reason: row.get("reason"),
                    since: parse_ts(&since)?,
                },
            );
        }

        state.ledger = self.ledger().await?;
        state.rebuild_index();
        Ok(Arc::new(state))
    }

    async fn commit(&self, next: KnowledgeState) -> Result<Arc<KnowledgeState>> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM snapshot_meta WHERE id = 1")
                .fetch_optional(&mut *tx)
                .await?;
        check_successor(current.unwrap_or(0) as u64, next.version)?;

        for table in [
            "fingerprints",
            "documents",
            "concepts",
            "edges",
            "embeddings",
            "pending_embeddings",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        for fp in next.fingerprints.values() {
            sqlx::query(
                "INSERT INTO fingerprints (document_id, content_hash, last_synced) VALUES (?, ?, ?)",
            )
            .bind(&fp.document_id)
            .bind(&fp.content_hash)
            .bind(fp.last_synced.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        for doc in next.documents.values() {
            sqlx::query(
                "INSERT INTO documents (id, title, doc_type, category, axes_json, low_confidence, content_hash) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&doc.id)
            .bind(&doc.title)
            .bind(&doc.doc_type)
            .bind(&doc.category)
            .bind(serde_json::to_string(&doc.axes)?)
            .bind(doc.low_confidence as i64)
            .bind(&doc.content_hash)
            .execute(&mut *tx)
            .await?;
        }

        for node in next.graph.nodes() {
            sqlx::query(
                "INSERT INTO concepts (id, name, definition, axes_json, sources_json) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&node.id)
            .bind(&node.name)
            .bind(&node.definition)
            .bind(serde_json::to_string(&node.axes)?)
            .bind(serde_json::to_string(&node.sources)?)
            .execute(&mut *tx)
            .await?;
        }

        for edge in next.graph.edges() {
            sqlx::query(
                "INSERT INTO edges (source, target, relation, provenance_json) VALUES (?, ?, ?, ?)",
            )
            .bind(&edge.source)
            .bind(&edge.target)
            .bind(&edge.relation)
            .bind(serde_json::to_string(&edge.provenance)?)
            .execute(&mut *tx)
            .await?;
        }

        for emb in next.embeddings.values() {
            sqlx::query(
                "INSERT INTO embeddings (document_id, model, dims, content_hash, embedding) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&emb.document_id)
            .bind(&emb.model)
            .bind(emb.dims as i64)
            .bind(&emb.content_hash)
            .bind(vec_to_blob(&emb.vector))
            .execute(&mut *tx)
            .await?;
        }

        for pending in next.pending.values() {
            sqlx::query(
                "INSERT INTO pending_embeddings (document_id, reason, since) VALUES (?, ?, ?)",
            )
            .bind(&pending.document_id)
            .bind(&pending.reason)
            .bind(pending.since.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        let max_sequence: Option<i64> = sqlx::query_scalar("SELECT MAX(sequence) FROM sync_ledger")
            .fetch_one(&mut *tx)
            .await?;
        let max_sequence = max_sequence.unwrap_or(0) as u64;
        for record in next
            .ledger
            .records()
            .iter()
            .filter(|r| r.sequence > max_sequence)
        {
            sqlx::query(
                "INSERT INTO sync_ledger (sequence, snapshot, record_json, timestamp) VALUES (?, ?, ?, ?)",
            )
            .bind(record.sequence as i64)
            .bind(record.snapshot as i64)
            .bind(serde_json::to_string(record)?)
            .bind(record.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO snapshot_meta (id, version, committed_at) VALUES (1, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET version = excluded.version, committed_at = excluded.committed_at",
        )
        .bind(next.version as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Arc::new(next))
    }
}

/// Axis coverage counts keyed by axis name, straight from the database.
pub async fn axis_document_counts(pool: &SqlitePool) -> Result<BTreeMap<String, i64>> {
    let rows = sqlx::query(
        "SELECT value AS axis, COUNT(*) AS n FROM documents, json_each(documents.axes_json) GROUP BY value",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|r| (r.get::<String, _>("axis"), r.get::<i64, _>("n")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_harness_core::extract::{ConceptMention, Extraction, RelationMention};
    use knowledge_harness_core::graph::DefinitionPolicy;
    use knowledge_harness_core::ledger::RunSummary;
    use knowledge_harness_core::models::{Axis, AxisSet};
    use tempfile::TempDir;

    fn sample_state() -> KnowledgeState {
        let mut state = KnowledgeState::default().next_working_set();
        let axes = AxisSet::from([Axis::Ontology, Axis::Graph]);
        state.fingerprints.insert(
            "D1".into(),
            Fingerprint {
                document_id: "D1".into(),
                content_hash: "abc".into(),
                last_synced: Utc::now(),
            },
        );
        state.documents.insert(
            "D1".into(),
            DocumentRecord {
                id: "D1".into(),
                title: "D1".into(),
                doc_type: "file".into(),
                category: Some("glossary".into()),
                axes: axes.clone(),
                low_confidence: false,
                content_hash: "abc".into(),
            },
        );
        state.graph.merge_document(
            "D1",
            &axes,
            &Extraction {
                concepts: vec![ConceptMention {
                    name: "BRRE".into(),
                    definition: Some("engine".into()),
                }],
                relations: vec![RelationMention {
                    source: "BRRE".into(),
                    target: "AUTOAGENCY".into(),
                    relation: Some("RELATES_TO".into()),
                }],
            },
            DefinitionPolicy::FirstNonEmpty,
        );
        state.embeddings.insert(
            "D1".into(),
            EmbeddingRecord {
                document_id: "D1".into(),
                model: "hashed-bow".into(),
                dims: 2,
                content_hash: "abc".into(),
                vector: vec![0.6, 0.8],
            },
        );
        state.ledger.append(
            RunSummary {
                snapshot: 1,
                document_count: 1,
                ..Default::default()
            },
            Utc::now(),
        );
        state.rebuild_index();
        state
    }

    #[tokio::test]
    async fn commit_then_load_restores_state() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStateStore::open(&tmp.path().join("kh.sqlite")).await.unwrap();
        assert_eq!(store.load().await.unwrap().version, 0);

        let state = sample_state();
        store.commit(state.clone()).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.fingerprints.len(), 1);
        assert_eq!(loaded.documents, state.documents);
        assert_eq!(loaded.graph, state.graph);
        assert_eq!(loaded.embeddings, state.embeddings);
        assert_eq!(loaded.index, state.index);
        assert_eq!(loaded.ledger.len(), 1);

        let counts = axis_document_counts(store.pool()).await.unwrap();
        assert_eq!(counts.get("graph"), Some(&1));
    }

    #[tokio::test]
    async fn rejected_commit_leaves_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStateStore::open(&tmp.path().join("kh.sqlite")).await.unwrap();
        store.commit(sample_state()).await.unwrap();

        // Same version again does not follow the committed one.
        let mut stale = sample_state();
        stale.documents.clear();
        assert!(store.commit(stale).await.is_err());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.documents.len(), 1);
    }
}
