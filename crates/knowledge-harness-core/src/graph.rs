//! Concept graph with growth-preserving merge semantics.
//!
//! Nodes are keyed by a normalized concept name; edges by the unordered pair
//! of their endpoint keys. The graph only grows while documents are added
//! or modified. Nodes and edges disappear solely through
//! [`KnowledgeGraph::remove_document`]:
//!
//! - a node is pruned once no surviving document references it;
//! - an edge is dropped when an endpoint is pruned or when every document
//!   that asserted it is gone.
//!
//! Definitions follow a [`DefinitionPolicy`]; neither policy ever replaces
//! a non-empty definition with an empty one.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;
use crate::extract::Extraction;
use crate::models::AxisSet;

/// Fold a concept name into its canonical key.
///
/// Lower-cases, trims and collapses every run of non-alphanumeric
/// characters into a single `_`: `"Peer-AI "` → `"peer_ai"`.
pub fn normalize_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    key
}

/// How conflicting definitions from different documents are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionPolicy {
    /// The first non-empty definition seen is kept forever.
    #[default]
    FirstNonEmpty,
    /// A longer non-empty definition replaces a shorter one.
    Richest,
}

impl std::str::FromStr for DefinitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first_non_empty" | "first-non-empty" => Ok(Self::FirstNonEmpty),
            "richest" => Ok(Self::Richest),
            other => Err(format!(
                "unknown definition policy '{}': expected first_non_empty or richest",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    /// Canonical key, see [`normalize_key`].
    pub id: String,
    /// Display form as first seen.
    pub name: String,
    pub axes: AxisSet,
    pub definition: Option<String>,
    /// Documents that mention this concept. Never empty in a merged graph.
    pub sources: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relation: Option<String>,
    /// Documents asserting this pair.
    pub provenance: BTreeSet<String>,
}

impl Edge {
    pub fn touches(&self, key: &str) -> bool {
        self.source == key || self.target == key
    }

    /// The endpoint opposite `key`, if the edge touches it.
    pub fn other(&self, key: &str) -> Option<&str> {
        if self.source == key {
            Some(&self.target)
        } else if self.target == key {
            Some(&self.source)
        } else {
            None
        }
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// What a single merge changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub nodes_added: usize,
    pub edges_added: usize,
    pub definitions_set: usize,
    /// Definition disagreements resolved by the policy.
    pub conflicts: Vec<KnowledgeError>,
}

impl MergeReport {
    pub fn absorb(&mut self, other: MergeReport) {
        self.nodes_added += other.nodes_added;
        self.edges_added += other.edges_added;
        self.definitions_set += other.definitions_set;
        self.conflicts.extend(other.conflicts);
    }
}

/// What a document removal pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub nodes_pruned: BTreeSet<String>,
    pub edges_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeGraph {
    nodes: BTreeMap<String, ConceptNode>,
    edges: BTreeMap<(String, String), Edge>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from persisted parts. Edges with a missing endpoint
    /// are dropped.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = ConceptNode>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Self {
        let nodes: BTreeMap<_, _> = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        let edges = edges
            .into_iter()
            .filter(|e| nodes.contains_key(&e.source) && nodes.contains_key(&e.target))
            .map(|e| (pair_key(&e.source, &e.target), e))
            .collect();
        Self { nodes, edges }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ConceptNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node(&self, key: &str) -> Option<&ConceptNode> {
        self.nodes.get(key)
    }

    /// Look a node up by display name (normalized before lookup).
    pub fn find(&self, name: &str) -> Option<&ConceptNode> {
        self.nodes.get(&normalize_key(name))
    }

    pub fn edge_between(&self, a: &str, b: &str) -> Option<&Edge> {
        self.edges.get(&pair_key(&normalize_key(a), &normalize_key(b)))
    }

    /// Nodes sourced from `document_id`.
    pub fn concepts_of<'a>(&'a self, document_id: &'a str) -> impl Iterator<Item = &'a ConceptNode> {
        self.nodes
            .values()
            .filter(move |n| n.sources.contains(document_id))
    }

    /// Nodes adjacent to `key` through an edge in either direction, deduplicated.
    pub fn neighbors(&self, key: &str) -> Vec<&ConceptNode> {
        let mut seen = BTreeSet::new();
        self.edges
            .values()
            .filter_map(|e| e.other(key))
            .filter(|other| *other != key && seen.insert(other.to_string()))
            .filter_map(|other| self.nodes.get(other))
            .collect()
    }

    /// Merge one document's extraction into the graph.
    pub fn merge_document(
        &mut self,
        document_id: &str,
        axes: &AxisSet,
        extraction: &Extraction,
        policy: DefinitionPolicy,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        for concept in &extraction.concepts {
            self.upsert_node(
                document_id,
                axes,
                &concept.name,
                concept.definition.as_deref(),
                policy,
                &mut report,
            );
        }

        for relation in &extraction.relations {
            let Some(a) =
                self.upsert_node(document_id, axes, &relation.source, None, policy, &mut report)
            else {
                continue;
            };
            let Some(b) =
                self.upsert_node(document_id, axes, &relation.target, None, policy, &mut report)
            else {
                continue;
            };
            if a == b {
                continue;
            }

            let pair = pair_key(&a, &b);
            match self.edges.get_mut(&pair) {
                Some(edge) => {
                    edge.provenance.insert(document_id.to_string());
                }
                None => {
                    self.edges.insert(
                        pair,
                        Edge {
                            source: a,
                            target: b,
                            relation: relation.relation.clone(),
                            provenance: BTreeSet::from([document_id.to_string()]),
                        },
                    );
                    report.edges_added += 1;
                }
            }
        }

        for conflict in &report.conflicts {
            tracing::warn!(%conflict, "definition conflict resolved by policy");
        }
        report
    }

    fn upsert_node(
        &mut self,
        document_id: &str,
        axes: &AxisSet,
        name: &str,
        definition: Option<&str>,
        policy: DefinitionPolicy,
        report: &mut MergeReport,
    ) -> Option<String> {
        let key = normalize_key(name);
        if key.is_empty() {
            return None;
        }
        let definition = definition.map(str::trim).filter(|d| !d.is_empty());

        let node = self.nodes.entry(key.clone()).or_insert_with(|| {
            report.nodes_added += 1;
            ConceptNode {
                id: key.clone(),
                name: name.trim().to_string(),
                axes: AxisSet::new(),
                definition: None,
                sources: BTreeSet::new(),
            }
        });
        node.sources.insert(document_id.to_string());
        node.axes.extend(axes.iter().copied());

        if let Some(new_def) = definition {
            match node.definition.as_deref() {
                None => {
                    node.definition = Some(new_def.to_string());
                    report.definitions_set += 1;
                }
                Some(old) if old == new_def => {}
                Some(old) => {
                    let replace = policy == DefinitionPolicy::Richest
                        && new_def.chars().count() > old.chars().count();
                    let (kept, ignored) = if replace {
                        (new_def.to_string(), old.to_string())
                    } else {
                        (old.to_string(), new_def.to_string())
                    };
                    report.conflicts.push(KnowledgeError::MergeConflict {
                        concept: node.name.clone(),
                        kept: kept.clone(),
                        ignored,
                        document: document_id.to_string(),
                    });
                    if replace {
                        node.definition = Some(kept);
                    }
                }
            }
        }

        Some(key)
    }

    /// Remove every reference to a deleted document.
    ///
    /// `axes_of` returns the axes of a surviving document so node axis
    /// membership can be recomputed from what is left.
    pub fn remove_document<F>(&mut self, document_id: &str, axes_of: F) -> PruneReport
    where
        F: Fn(&str) -> Option<AxisSet>,
    {
        let mut report = PruneReport::default();

        for node in self.nodes.values_mut() {
            if node.sources.remove(document_id) {
                if node.sources.is_empty() {
                    report.nodes_pruned.insert(node.id.clone());
                } else {
                    node.axes = node
                        .sources
                        .iter()
                        .filter_map(|s| axes_of(s))
                        .flatten()
                        .collect();
                }
            }
        }
        self.nodes.retain(|key, _| !report.nodes_pruned.contains(key));

        let before = self.edges.len();
        self.edges.retain(|_, edge| {
            edge.provenance.remove(document_id);
            !edge.provenance.is_empty()
                && !report.nodes_pruned.contains(&edge.source)
                && !report.nodes_pruned.contains(&edge.target)
        });
        report.edges_removed = before - self.edges.len();

        report
    }
}
