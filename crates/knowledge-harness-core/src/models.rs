//! Core data models for the sync pipeline.
//!
//! [`SourceDocument`]s come in from a connector, get fingerprinted and
//! classified onto one or more [`Axis`] values, and are remembered as
//! [`DocumentRecord`]s in the knowledge state.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract;

/// Raw document produced by a connector. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Stable, path-derived key (`guides/brre.md`).
    pub id: String,
    pub content: String,
    /// Declared category, if the source supplies one.
    pub category: Option<String>,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            category: None,
        }
    }

    /// Build a document from file text, taking the category from the
    /// front-matter block when present.
    pub fn from_text(id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let category = extract::FrontMatter::parse(&content).category;
        Self {
            id: id.into(),
            content,
            category,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn title(&self) -> String {
        extract::extract_title(&self.id, &self.content)
    }

    pub fn doc_type(&self) -> String {
        extract::document_type(&self.id, &self.content)
    }
}

/// One of the four fixed knowledge categories.
///
/// Declaration order is the precedence order: the first axis of a set is
/// the document's primary axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Ontology,
    Parsing,
    Vectors,
    Graph,
}

/// Ordered set of axes; iteration yields the primary axis first.
pub type AxisSet = BTreeSet<Axis>;

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::Ontology, Axis::Parsing, Axis::Vectors, Axis::Graph];

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Ontology => "ontology",
            Axis::Parsing => "parsing",
            Axis::Vectors => "vectors",
            Axis::Graph => "graph",
        }
    }

    /// Resolve a single category word (case-insensitive) to its axes.
    ///
    /// `glossary` maps to both ontology and graph. Unknown words map to
    /// nothing.
    pub fn from_category_word(word: &str) -> Vec<Axis> {
        match word.trim().to_lowercase().as_str() {
            "ontology" | "ontologies" | "concept" | "concepts" | "taxonomy" | "taxonomies"
            | "framework" | "frameworks" => vec![Axis::Ontology],
            "parsing" | "parsings" | "structured" | "markdown" | "extracted" => {
                vec![Axis::Parsing]
            }
            "vector" | "vectors" | "embedding" | "embeddings" => vec![Axis::Vectors],
            "graph" | "graphs" | "relationship" | "relationships" | "knowledge" => {
                vec![Axis::Graph]
            }
            "glossary" => vec![Axis::Ontology, Axis::Graph],
            _ => Vec::new(),
        }
    }

    /// Resolve a declared category such as `"ontology, graph"`.
    pub fn parse_category(category: &str) -> AxisSet {
        category
            .split([',', ';', '|'])
            .flat_map(Axis::from_category_word)
            .collect()
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ontology" => Ok(Axis::Ontology),
            "parsing" => Ok(Axis::Parsing),
            "vectors" => Ok(Axis::Vectors),
            "graph" => Ok(Axis::Graph),
            other => Err(format!(
                "unknown axis '{}': expected ontology, parsing, vectors or graph",
                other
            )),
        }
    }
}

/// Content hash remembered per document across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub document_id: String,
    pub content_hash: String,
    pub last_synced: DateTime<Utc>,
}

/// Result of classifying one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub axes: AxisSet,
    /// Set when no rule matched and the ontology default was applied.
    pub low_confidence: bool,
}

/// What the state remembers about a classified document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub doc_type: String,
    pub category: Option<String>,
    pub axes: AxisSet,
    pub low_confidence: bool,
    pub content_hash: String,
}

impl DocumentRecord {
    pub fn primary_axis(&self) -> Option<Axis> {
        self.axes.iter().next().copied()
    }
}

/// Stored embedding vector for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub document_id: String,
    pub model: String,
    pub dims: usize,
    /// Fingerprint of the content the vector was computed from.
    pub content_hash: String,
    pub vector: Vec<f32>,
}

/// A document whose embedding is deferred to the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEmbedding {
    pub document_id: String,
    pub reason: String,
    pub since: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_aliases_resolve() {
        assert_eq!(
            Axis::parse_category("Ontology"),
            AxisSet::from([Axis::Ontology])
        );
        assert_eq!(
            Axis::parse_category("glossary"),
            AxisSet::from([Axis::Ontology, Axis::Graph])
        );
        assert_eq!(
            Axis::parse_category("embeddings, relationships"),
            AxisSet::from([Axis::Vectors, Axis::Graph])
        );
        assert!(Axis::parse_category("misc").is_empty());
    }

    #[test]
    fn primary_axis_follows_declaration_order() {
        let record = DocumentRecord {
            id: "a".into(),
            title: "A".into(),
            doc_type: "markdown".into(),
            category: None,
            axes: AxisSet::from([Axis::Graph, Axis::Parsing]),
            low_confidence: false,
            content_hash: String::new(),
        };
        assert_eq!(record.primary_axis(), Some(Axis::Parsing));
    }

    #[test]
    fn axis_from_str_rejects_unknown() {
        assert_eq!("GRAPH".parse::<Axis>(), Ok(Axis::Graph));
        assert!("tree".parse::<Axis>().is_err());
    }

    #[test]
    fn from_text_reads_front_matter_category() {
        let doc = SourceDocument::from_text(
            "notes/brre.md",
            "---\ncategory: ontology\n---\n# BRRE\n\nBody",
        );
        assert_eq!(doc.category.as_deref(), Some("ontology"));
        assert_eq!(doc.title(), "BRRE");
    }
}
