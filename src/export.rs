//! Export the committed concept graph for graph databases and
//! visualization tools.
//!
//! | Format | Output |
//! |--------|--------|
//! | `json` | Nodes with sources, edges with provenance |
//! | `graphml` | GraphML for Gephi, yEd, Cytoscape |
//! | `cypher` | Idempotent `MERGE` statements for Neo4j |

use anyhow::Result;
use clap::ValueEnum;
use quick_xml::escape::escape;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use knowledge_harness_core::graph::{ConceptNode, Edge, KnowledgeGraph};
use knowledge_harness_core::store::StateStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Graphml,
    Cypher,
}

#[derive(Serialize)]
struct ExportGraph<'a> {
    snapshot: u64,
    nodes: Vec<&'a ConceptNode>,
    edges: Vec<&'a Edge>,
}

pub fn render_json(graph: &KnowledgeGraph, snapshot: u64) -> Result<String> {
    let data = ExportGraph {
        snapshot,
        nodes: graph.nodes().collect(),
        edges: graph.edges().collect(),
    };
    Ok(serde_json::to_string_pretty(&data)?)
}

pub fn render_graphml(graph: &KnowledgeGraph) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    out.push_str("  <key id=\"name\" for=\"node\" attr.name=\"name\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"axes\" for=\"node\" attr.name=\"axes\" attr.type=\"string\"/>\n");
    out.push_str(
        "  <key id=\"definition\" for=\"node\" attr.name=\"definition\" attr.type=\"string\"/>\n",
    );
    out.push_str(
        "  <key id=\"relation\" for=\"edge\" attr.name=\"relation\" attr.type=\"string\"/>\n",
    );
    out.push_str("  <graph id=\"knowledge\" edgedefault=\"directed\">\n");

    for node in graph.nodes() {
        let axes: Vec<&str> = node.axes.iter().map(|a| a.as_str()).collect();
        let _ = writeln!(out, "    <node id=\"{}\">", escape(node.id.as_str()));
        let _ = writeln!(out, "      <data key=\"name\">{}</data>", escape(node.name.as_str()));
        let _ = writeln!(out, "      <data key=\"axes\">{}</data>", axes.join(","));
        if let Some(definition) = &node.definition {
            let _ = writeln!(
                out,
                "      <data key=\"definition\">{}</data>",
                escape(definition.as_str())
            );
        }
        out.push_str("    </node>\n");
    }

    for (i, edge) in graph.edges().enumerate() {
        let _ = write!(
            out,
            "    <edge id=\"e{}\" source=\"{}\" target=\"{}\"",
            i,
            escape(edge.source.as_str()),
            escape(edge.target.as_str())
        );
        match &edge.relation {
            Some(relation) => {
                let _ = writeln!(
                    out,
                    ">\n      <data key=\"relation\">{}</data>\n    </edge>",
                    escape(relation.as_str())
                );
            }
            None => out.push_str("/>\n"),
        }
    }

    out.push_str("  </graph>\n</graphml>\n");
    out
}

/// Neo4j statements; unlabelled edges become `RELATED`.
pub fn render_cypher(graph: &KnowledgeGraph) -> String {
    let mut out = String::new();
    out.push_str("CREATE CONSTRAINT concept_id IF NOT EXISTS FOR (c:Concept) REQUIRE c.id IS UNIQUE;\n");

    for node in graph.nodes() {
        let axes: Vec<String> = node
            .axes
            .iter()
            .map(|a| format!("'{}'", a.as_str()))
            .collect();
        let _ = write!(
            out,
            "MERGE (c:Concept {{id: '{}'}}) SET c.name = '{}', c.axes = [{}]",
            cypher_str(&node.id),
            cypher_str(&node.name),
            axes.join(", ")
        );
        if let Some(definition) = &node.definition {
            let _ = write!(out, ", c.definition = '{}'", cypher_str(definition));
        }
        out.push_str(";\n");
    }

    for edge in graph.edges() {
        let _ = writeln!(
            out,
            "MATCH (a:Concept {{id: '{}'}}), (b:Concept {{id: '{}'}}) MERGE (a)-[:{}]->(b);",
            cypher_str(&edge.source),
            cypher_str(&edge.target),
            cypher_label(edge.relation.as_deref().unwrap_or("RELATED"))
        );
    }
    out
}

fn cypher_str(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Relationship types are identifiers: keep `[A-Z0-9_]` only.
fn cypher_label(relation: &str) -> String {
    let label: String = relation
        .to_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if label.is_empty() {
        "RELATED".to_string()
    } else {
        label
    }
}

/// Export the committed graph. Writes to `output` when given, otherwise
/// to stdout for piping.
pub async fn run_export(config: &Config, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let store = SqliteStateStore::open(&config.db.path).await?;
    let state = store.load().await?;
    store.pool().close().await;

    let rendered = match format {
        ExportFormat::Json => render_json(&state.graph, state.version)?,
        ExportFormat::Graphml => render_graphml(&state.graph),
        ExportFormat::Cypher => render_cypher(&state.graph),
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &rendered)?;
            eprintln!(
                "Exported {} concepts, {} edges to {}",
                state.graph.node_count(),
                state.graph.edge_count(),
                path.display()
            );
        }
        None => {
            print!("{}", rendered);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_harness_core::extract::{ConceptMention, Extraction, RelationMention};
    use knowledge_harness_core::graph::DefinitionPolicy;
    use knowledge_harness_core::models::{Axis, AxisSet};

    fn graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        let extraction = Extraction {
            concepts: vec![
                ConceptMention {
                    name: "BRRE".into(),
                    definition: Some("Reasoning <engine> & friends".into()),
                },
                ConceptMention {
                    name: "AUTOAGENCY".into(),
                    definition: None,
                },
            ],
            relations: vec![RelationMention {
                source: "BRRE".into(),
                target: "AUTOAGENCY".into(),
                relation: Some("RELATES_TO".into()),
            }],
        };
        graph.merge_document(
            "doc.md",
            &AxisSet::from([Axis::Ontology]),
            &extraction,
            DefinitionPolicy::FirstNonEmpty,
        );
        graph
    }

    #[test]
    fn graphml_escapes_and_lists_everything() {
        let xml = render_graphml(&graph());
        assert!(xml.contains("<node id=\"brre\">"));
        assert!(xml.contains("Reasoning &lt;engine&gt; &amp; friends"));
        assert!(xml.contains("source=\"brre\" target=\"autoagency\""));
        assert!(xml.contains("<data key=\"relation\">RELATES_TO</data>"));
        assert!(xml.trim_end().ends_with("</graphml>"));
    }

    #[test]
    fn cypher_merges_nodes_and_labels_edges() {
        let cypher = render_cypher(&graph());
        assert!(cypher.contains("MERGE (c:Concept {id: 'brre'}) SET c.name = 'BRRE'"));
        assert!(cypher.contains("MERGE (a)-[:RELATES_TO]->(b);"));
        assert_eq!(cypher_str("it's"), "it\\'s");
        assert_eq!(cypher_label("part of"), "PART_OF");
    }

    #[test]
    fn json_carries_provenance() {
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&graph(), 4).unwrap()).unwrap();
        assert_eq!(json["snapshot"], 4);
        assert_eq!(json["edges"][0]["provenance"][0], "doc.md");
        assert_eq!(json["nodes"].as_array().unwrap().len(), 2);
    }
}
