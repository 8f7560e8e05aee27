//! Published resource shapes.
//!
//! Each committed snapshot is published as four independently fetchable
//! JSON documents. Producers build them from a [`KnowledgeState`];
//! consumers parse them leniently (every non-identifying field has a
//! serde default), so older or hand-written artifacts still load.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::KnowledgeError;
use crate::graph::KnowledgeGraph;
use crate::index::{ContentIndex, IndexEntry};
use crate::ledger::{CumulativeTotals, SyncRecord};
use crate::models::{Axis, AxisSet};
use crate::state::KnowledgeState;

pub const METADATA_FILE: &str = "metadata.json";
pub const ONTOLOGY_FILE: &str = "ontology.json";
pub const GRAPH_FILE: &str = "graph.json";
pub const CONTENT_INDEX_FILE: &str = "content_index.json";
/// Pointer file naming the current snapshot version.
pub const CURRENT_FILE: &str = "CURRENT";

/// Relative path of a resource inside snapshot `version`.
pub fn snapshot_path(version: u64, file: &str) -> String {
    format!("snapshots/{}/{}", version, file)
}

/// Parse a resource body, mapping failures to `MalformedArtifact`.
pub fn parse_resource<T: DeserializeOwned>(name: &str, body: &str) -> Result<T, KnowledgeError> {
    serde_json::from_str(body).map_err(|e| KnowledgeError::malformed(name, e))
}

// ============ Metadata ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    #[serde(default)]
    pub documents_per_axis: BTreeMap<Axis, usize>,
    #[serde(default)]
    pub axes_populated: usize,
    #[serde(default)]
    pub coverage_percentage: f64,
    #[serde(default)]
    pub low_confidence_documents: usize,
    #[serde(default)]
    pub pending_embeddings: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncInfo {
    #[serde(default)]
    pub snapshot: u64,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataResource {
    #[serde(default)]
    pub last_sync: Option<SyncRecord>,
    #[serde(default)]
    pub totals: CumulativeTotals,
    /// Most recent records, oldest first.
    #[serde(default)]
    pub history: Vec<SyncRecord>,
    #[serde(default)]
    pub quality: QualityMetrics,
    #[serde(default)]
    pub sync_info: SyncInfo,
    #[serde(default)]
    pub api_endpoints: BTreeMap<String, String>,
}

impl MetadataResource {
    pub fn from_state(state: &KnowledgeState, history_limit: usize) -> Self {
        let coverage = state.axis_coverage();
        let axes_populated = coverage.values().filter(|n| **n > 0).count();
        let last = state.ledger.latest().cloned();

        Self {
            totals: state.ledger.totals(),
            history: state.ledger.recent(history_limit).to_vec(),
            quality: QualityMetrics {
                axes_populated,
                coverage_percentage: axes_populated as f64 * 100.0 / Axis::ALL.len() as f64,
                documents_per_axis: coverage,
                low_confidence_documents: state
                    .documents
                    .values()
                    .filter(|d| d.low_confidence)
                    .count(),
                pending_embeddings: state.pending.len(),
            },
            sync_info: SyncInfo {
                snapshot: state.version,
                revision: last.as_ref().and_then(|r| r.revision.clone()),
                repository: last.as_ref().and_then(|r| r.repository.clone()),
                generated_at: last.as_ref().map(|r| r.timestamp),
            },
            api_endpoints: api_endpoints(),
            last_sync: last,
        }
    }
}

/// Routes served by `kh serve`.
pub fn api_endpoints() -> BTreeMap<String, String> {
    [
        ("metadata", "/api/background/metadata"),
        ("search", "/api/background/search"),
        ("concepts", "/api/background/concepts"),
        ("graph", "/api/background/graph"),
        ("enhance", "/api/background/enhance"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

// ============ Ontology ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyConcept {
    pub term: String,
    #[serde(default)]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OntologyResource {
    #[serde(default)]
    pub concepts: Vec<OntologyConcept>,
}

impl OntologyResource {
    /// Concepts on the ontology axis, by key, capped at `sample`.
    pub fn from_graph(graph: &KnowledgeGraph, sample: usize) -> Self {
        let concepts = graph
            .nodes()
            .filter(|n| n.axes.contains(&Axis::Ontology))
            .take(sample)
            .map(|n| OntologyConcept {
                term: n.name.clone(),
                definition: n.definition.clone(),
            })
            .collect();
        Self { concepts }
    }
}

// ============ Graph ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub axes: AxisSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphResource {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl GraphResource {
    pub fn from_graph(graph: &KnowledgeGraph) -> Self {
        Self {
            nodes: graph
                .nodes()
                .map(|n| GraphNode {
                    id: n.id.clone(),
                    name: n.name.clone(),
                    axes: n.axes.clone(),
                    definition: n.definition.clone(),
                })
                .collect(),
            edges: graph
                .edges()
                .map(|e| GraphEdge {
                    source: e.source.clone(),
                    target: e.target.clone(),
                    relation: e.relation.clone(),
                })
                .collect(),
        }
    }
}

// ============ Content index ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentIndexResource {
    #[serde(default)]
    pub search_index: Vec<IndexEntry>,
}

impl ContentIndexResource {
    pub fn from_index(index: &ContentIndex) -> Self {
        Self {
            search_index: index.entries().cloned().collect(),
        }
    }
}

/// The four resources of one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotArtifacts {
    pub version: u64,
    pub metadata: MetadataResource,
    pub ontology: OntologyResource,
    pub graph: GraphResource,
    pub content_index: ContentIndexResource,
}

impl SnapshotArtifacts {
    pub fn from_state(state: &KnowledgeState, history_limit: usize, ontology_sample: usize) -> Self {
        Self {
            version: state.version,
            metadata: MetadataResource::from_state(state, history_limit),
            ontology: OntologyResource::from_graph(&state.graph, ontology_sample),
            graph: GraphResource::from_graph(&state.graph),
            content_index: ContentIndexResource::from_index(&state.index),
        }
    }

    /// `(file name, pretty JSON)` for each resource.
    pub fn render(&self) -> Result<Vec<(&'static str, String)>, serde_json::Error> {
        Ok(vec![
            (METADATA_FILE, serde_json::to_string_pretty(&self.metadata)?),
            (ONTOLOGY_FILE, serde_json::to_string_pretty(&self.ontology)?),
            (GRAPH_FILE, serde_json::to_string_pretty(&self.graph)?),
            (
                CONTENT_INDEX_FILE,
                serde_json::to_string_pretty(&self.content_index)?,
            ),
        ])
    }
}
