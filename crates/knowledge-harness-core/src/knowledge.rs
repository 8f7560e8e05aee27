//! A loaded snapshot as seen by consumers.
//!
//! Every resource is optional. Operations never fail; a missing resource
//! turns the operations that depend on it into empty results.

use crate::artifacts::{
    ContentIndexResource, GraphNode, GraphResource, MetadataResource, OntologyResource,
};
use crate::highlight::{self, Segment, Vocabulary};
use crate::search::{self, SearchResults};
use crate::traversal;

#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    /// Snapshot the resources were bound to, when known.
    pub snapshot: Option<u64>,
    pub metadata: Option<MetadataResource>,
    pub ontology: Option<OntologyResource>,
    pub graph: Option<GraphResource>,
    pub content_index: Option<ContentIndexResource>,
    vocabulary: Vocabulary,
}

impl KnowledgeBase {
    /// Assemble from whatever resources loaded. The highlight vocabulary is
    /// the ontology terms (with definitions) plus `extra_terms`.
    pub fn new(
        snapshot: Option<u64>,
        metadata: Option<MetadataResource>,
        ontology: Option<OntologyResource>,
        graph: Option<GraphResource>,
        content_index: Option<ContentIndexResource>,
        extra_terms: &[String],
    ) -> Self {
        let ontology_terms = ontology
            .iter()
            .flat_map(|o| o.concepts.iter())
            .map(|c| (c.term.clone(), c.definition.clone()));
        let extra = extra_terms.iter().map(|t| (t.clone(), None));
        let vocabulary = Vocabulary::from_terms(ontology_terms.chain(extra));

        Self {
            snapshot,
            metadata,
            ontology,
            graph,
            content_index,
            vocabulary,
        }
    }

    /// Resources that loaded, out of four.
    pub fn loaded_count(&self) -> usize {
        [
            self.metadata.is_some(),
            self.ontology.is_some(),
            self.graph.is_some(),
            self.content_index.is_some(),
        ]
        .iter()
        .filter(|loaded| **loaded)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded_count() == 0
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn search(&self, query: &str) -> SearchResults {
        let entries = self
            .content_index
            .as_ref()
            .map(|i| i.search_index.as_slice())
            .unwrap_or(&[]);
        search::search(entries, query)
    }

    pub fn related_concepts(&self, name: &str) -> Vec<GraphNode> {
        self.graph
            .as_ref()
            .map(|g| traversal::related_concepts(g, name))
            .unwrap_or_default()
    }

    pub fn highlight(&self, text: &str) -> Vec<Segment> {
        highlight::highlight(text, &self.vocabulary)
    }

    pub fn highlight_segments(&self, segments: &[Segment]) -> Vec<Segment> {
        highlight::highlight_segments(segments, &self.vocabulary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{GraphEdge, OntologyConcept};
    use crate::index::IndexEntry;

    fn index() -> ContentIndexResource {
        ContentIndexResource {
            search_index: vec![IndexEntry {
                title: "Voither Overview".into(),
                category: "ontology".into(),
                doc_type: "markdown".into(),
                keywords: vec!["BRRE".into()],
                path: "overview.md".into(),
            }],
        }
    }

    #[test]
    fn empty_base_degrades_to_empty_results() {
        let kb = KnowledgeBase::default();
        assert!(kb.is_empty());
        assert!(kb.search("voither").is_empty());
        assert!(kb.related_concepts("BRRE").is_empty());
        assert_eq!(
            kb.highlight("BRRE"),
            vec![Segment::Plain { text: "BRRE".into() }]
        );
    }

    #[test]
    fn search_works_without_graph() {
        let kb = KnowledgeBase::new(None, None, None, None, Some(index()), &[]);
        assert_eq!(kb.loaded_count(), 1);
        assert_eq!(kb.search("voither").matches.len(), 1);
        assert!(kb.related_concepts("BRRE").is_empty());
    }

    #[test]
    fn vocabulary_unions_ontology_and_extra_terms() {
        let ontology = OntologyResource {
            concepts: vec![OntologyConcept {
                term: "BRRE".into(),
                definition: Some("reasoning engine".into()),
            }],
        };
        let kb = KnowledgeBase::new(
            Some(3),
            None,
            Some(ontology),
            None,
            None,
            &["kairos".to_string()],
        );
        assert_eq!(kb.vocabulary().len(), 2);
        let segments = kb.highlight("BRRE meets Kairos");
        assert!(matches!(
            &segments[0],
            Segment::Term { definition: Some(d), .. } if d == "reasoning engine"
        ));
        assert_eq!(segments.iter().filter(|s| s.is_term()).count(), 2);
    }

    #[test]
    fn related_concepts_uses_graph() {
        let graph = GraphResource {
            nodes: vec![
                GraphNode {
                    id: "brre".into(),
                    name: "BRRE".into(),
                    axes: Default::default(),
                    definition: None,
                },
                GraphNode {
                    id: "autoagency".into(),
                    name: "AUTOAGENCY".into(),
                    axes: Default::default(),
                    definition: None,
                },
            ],
            edges: vec![GraphEdge {
                source: "brre".into(),
                target: "autoagency".into(),
                relation: Some("RELATES_TO".into()),
            }],
        };
        let kb = KnowledgeBase::new(None, None, None, Some(graph), None, &[]);
        let related = kb.related_concepts("autoagency");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].name, "BRRE");
    }
}
