//! Content index: the flat, search-oriented view over classified documents.
//!
//! The index is a cache. [`ContentIndex::build`] derives it entirely from
//! the document records and the concept graph; [`ContentIndex::refresh`]
//! recomputes only the given ids and yields the same result as a full build
//! as long as every changed or deleted id is passed.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::extract::filename_keywords;
use crate::graph::KnowledgeGraph;
use crate::models::DocumentRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Originating document id.
    #[serde(default)]
    pub path: String,
}

/// Build the index entry for one document.
pub fn index_entry(record: &DocumentRecord, graph: &KnowledgeGraph) -> IndexEntry {
    let category = record
        .category
        .clone()
        .or_else(|| record.primary_axis().map(|a| a.to_string()))
        .unwrap_or_default();

    let mut keywords = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |word: &str| {
        let word = word.trim();
        if !word.is_empty() && seen.insert(word.to_lowercase()) {
            keywords.push(word.to_string());
        }
    };

    for word in filename_keywords(&record.id) {
        push(&word);
    }
    for node in graph.concepts_of(&record.id) {
        push(&node.name);
    }
    for axis in &record.axes {
        push(axis.as_str());
    }
    push(&category);
    push(&record.doc_type);

    IndexEntry {
        title: record.title.clone(),
        category,
        doc_type: record.doc_type.clone(),
        keywords,
        path: record.id.clone(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentIndex {
    entries: BTreeMap<String, IndexEntry>,
}

impl ContentIndex {
    /// Full rebuild over every document with at least one axis.
    pub fn build(documents: &BTreeMap<String, DocumentRecord>, graph: &KnowledgeGraph) -> Self {
        let entries = documents
            .values()
            .filter(|r| !r.axes.is_empty())
            .map(|r| (r.id.clone(), index_entry(r, graph)))
            .collect();
        Self { entries }
    }

    /// Recompute the entries for `ids`; ids without a record are removed.
    pub fn refresh<'a, I>(
        &mut self,
        ids: I,
        documents: &BTreeMap<String, DocumentRecord>,
        graph: &KnowledgeGraph,
    ) where
        I: IntoIterator<Item = &'a String>,
    {
        for id in ids {
            match documents.get(id).filter(|r| !r.axes.is_empty()) {
                Some(record) => {
                    self.entries.insert(id.clone(), index_entry(record, graph));
                }
                None => {
                    self.entries.remove(id);
                }
            }
        }
    }

    /// Entries in document id order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ConceptMention, Extraction};
    use crate::graph::DefinitionPolicy;
    use crate::models::{Axis, AxisSet};

    fn record(id: &str, category: Option<&str>, axes: &[Axis]) -> DocumentRecord {
        DocumentRecord {
            id: id.into(),
            title: format!("Title of {id}"),
            doc_type: "markdown".into(),
            category: category.map(String::from),
            axes: axes.iter().copied().collect(),
            low_confidence: false,
            content_hash: String::new(),
        }
    }

    fn graph_with(doc: &str, names: &[&str]) -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new();
        let extraction = Extraction {
            concepts: names
                .iter()
                .map(|n| ConceptMention {
                    name: n.to_string(),
                    definition: None,
                })
                .collect(),
            relations: vec![],
        };
        g.merge_document(doc, &AxisSet::new(), &extraction, DefinitionPolicy::FirstNonEmpty);
        g
    }

    #[test]
    fn keywords_are_ordered_and_deduplicated() {
        let g = graph_with("docs/brre-engine.md", &["BRRE", "Engine"]);
        let entry = index_entry(
            &record("docs/brre-engine.md", Some("ontology"), &[Axis::Ontology]),
            &g,
        );
        assert_eq!(entry.category, "ontology");
        assert_eq!(entry.keywords, vec!["brre", "engine", "ontology", "markdown"]);
        assert_eq!(entry.path, "docs/brre-engine.md");
    }

    #[test]
    fn category_defaults_to_primary_axis() {
        let g = KnowledgeGraph::new();
        let entry = index_entry(&record("D1", None, &[Axis::Graph, Axis::Parsing]), &g);
        assert_eq!(entry.category, "parsing");
        assert_eq!(entry.keywords, vec!["parsing", "graph", "markdown"]);
    }

    #[test]
    fn concept_names_become_keywords() {
        let g = graph_with("D1", &["BRRE"]);
        let entry = index_entry(&record("D1", Some("ontology"), &[Axis::Ontology]), &g);
        assert!(entry.keywords.contains(&"BRRE".to_string()));
    }

    #[test]
    fn refresh_matches_full_build() {
        let mut docs = BTreeMap::new();
        docs.insert("a".to_string(), record("a", None, &[Axis::Ontology]));
        docs.insert("b".to_string(), record("b", None, &[Axis::Graph]));
        let g = graph_with("a", &["ALPHA"]);

        let mut index = ContentIndex::build(&docs, &g);
        assert_eq!(index.len(), 2);

        docs.remove("b");
        docs.insert("c".to_string(), record("c", Some("glossary"), &[Axis::Ontology]));
        let changed = ["b".to_string(), "c".to_string()];
        index.refresh(changed.iter(), &docs, &g);

        assert_eq!(index, ContentIndex::build(&docs, &g));
        let paths: Vec<_> = index.entries().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "c"]);
    }

    #[test]
    fn documents_without_axes_are_not_indexed() {
        let mut docs = BTreeMap::new();
        docs.insert("x".to_string(), record("x", None, &[]));
        assert!(ContentIndex::build(&docs, &KnowledgeGraph::new()).is_empty());
    }

    #[test]
    fn entry_serializes_type_field() {
        let g = KnowledgeGraph::new();
        let json = serde_json::to_value(index_entry(&record("D1", None, &[Axis::Vectors]), &g)).unwrap();
        assert_eq!(json["type"], "markdown");
        assert_eq!(json["category"], "vectors");
    }
}
