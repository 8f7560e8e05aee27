//! The versioned knowledge state a sync run reads and replaces.
//!
//! A run clones the committed state into a working set, mutates only the
//! working set, and hands it to a [`StateStore`](crate::store::StateStore)
//! as a whole. Readers keep whatever snapshot they bound to.

use std::collections::BTreeMap;

use crate::graph::{KnowledgeGraph, PruneReport};
use crate::index::ContentIndex;
use crate::ledger::Ledger;
use crate::models::{Axis, DocumentRecord, EmbeddingRecord, Fingerprint, PendingEmbedding};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeState {
    /// Snapshot number; 0 until the first commit.
    pub version: u64,
    pub fingerprints: BTreeMap<String, Fingerprint>,
    pub documents: BTreeMap<String, DocumentRecord>,
    pub graph: KnowledgeGraph,
    pub embeddings: BTreeMap<String, EmbeddingRecord>,
    pub pending: BTreeMap<String, PendingEmbedding>,
    pub index: ContentIndex,
    pub ledger: Ledger,
}

impl KnowledgeState {
    /// Working copy for the next run, numbered `version + 1`.
    pub fn next_working_set(&self) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;
        next
    }

    /// Drop every trace of a deleted document (the only path that shrinks
    /// the graph).
    pub fn remove_document(&mut self, id: &str) -> PruneReport {
        self.fingerprints.remove(id);
        self.documents.remove(id);
        self.embeddings.remove(id);
        self.pending.remove(id);
        let documents = &self.documents;
        self.graph
            .remove_document(id, |doc| documents.get(doc).map(|r| r.axes.clone()))
    }

    /// Number of documents on each axis, all four axes present.
    pub fn axis_coverage(&self) -> BTreeMap<Axis, usize> {
        let mut coverage: BTreeMap<Axis, usize> = Axis::ALL.iter().map(|a| (*a, 0)).collect();
        for record in self.documents.values() {
            for axis in &record.axes {
                *coverage.entry(*axis).or_default() += 1;
            }
        }
        coverage
    }

    /// Rebuild the content index from scratch.
    pub fn rebuild_index(&mut self) {
        self.index = ContentIndex::build(&self.documents, &self.graph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ConceptMention, Extraction};
    use crate::graph::DefinitionPolicy;
    use crate::models::AxisSet;
    use chrono::Utc;

    fn add(state: &mut KnowledgeState, id: &str, axes: AxisSet, concept: &str) {
        state.fingerprints.insert(
            id.into(),
            Fingerprint {
                document_id: id.into(),
                content_hash: "h".into(),
                last_synced: Utc::now(),
            },
        );
        state.documents.insert(
            id.into(),
            DocumentRecord {
                id: id.into(),
                title: id.into(),
                doc_type: "text".into(),
                category: None,
                axes: axes.clone(),
                low_confidence: false,
                content_hash: "h".into(),
            },
        );
        let extraction = Extraction {
            concepts: vec![ConceptMention {
                name: concept.into(),
                definition: None,
            }],
            relations: vec![],
        };
        state
            .graph
            .merge_document(id, &axes, &extraction, DefinitionPolicy::FirstNonEmpty);
    }

    #[test]
    fn working_set_is_isolated_and_numbered() {
        let state = KnowledgeState::default();
        let mut next = state.next_working_set();
        add(&mut next, "D1", AxisSet::from([Axis::Ontology]), "BRRE");
        assert_eq!(next.version, 1);
        assert!(state.documents.is_empty());
        assert_eq!(state.graph.node_count(), 0);
    }

    #[test]
    fn remove_document_clears_all_tables() {
        let mut state = KnowledgeState::default();
        add(&mut state, "D1", AxisSet::from([Axis::Ontology]), "SHARED");
        add(&mut state, "D2", AxisSet::from([Axis::Graph]), "SHARED");
        add(&mut state, "D2", AxisSet::from([Axis::Graph]), "ONLY2");

        let report = state.remove_document("D2");
        assert!(!state.fingerprints.contains_key("D2"));
        assert!(!state.documents.contains_key("D2"));
        assert_eq!(report.nodes_pruned.len(), 1);
        assert_eq!(
            state.graph.find("SHARED").unwrap().axes,
            AxisSet::from([Axis::Ontology])
        );
    }

    #[test]
    fn coverage_lists_every_axis() {
        let mut state = KnowledgeState::default();
        add(
            &mut state,
            "D1",
            AxisSet::from([Axis::Ontology, Axis::Graph]),
            "X1X",
        );
        let coverage = state.axis_coverage();
        assert_eq!(coverage.len(), 4);
        assert_eq!(coverage[&Axis::Ontology], 1);
        assert_eq!(coverage[&Axis::Vectors], 0);
    }
}
