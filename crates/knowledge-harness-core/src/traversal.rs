//! Related-concept lookup over a published graph.
//!
//! Edges are read as undirected. The result holds the other endpoint of
//! every edge touching the named node, deduplicated in first-seen order.

use std::collections::{HashMap, HashSet};

use crate::artifacts::{GraphNode, GraphResource};

/// Neighbors of the node whose name equals `name` (case-insensitive).
///
/// Unknown names and dangling edge endpoints yield nothing.
pub fn related_concepts(graph: &GraphResource, name: &str) -> Vec<GraphNode> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return Vec::new();
    }
    let Some(node) = graph.nodes.iter().find(|n| n.name.to_lowercase() == wanted) else {
        return Vec::new();
    };

    let by_id: HashMap<&str, &GraphNode> = graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut seen = HashSet::new();
    let mut related = Vec::new();

    for edge in &graph.edges {
        let other = if edge.source == node.id {
            &edge.target
        } else if edge.target == node.id {
            &edge.source
        } else {
            continue;
        };
        if *other == node.id || !seen.insert(other.as_str()) {
            continue;
        }
        if let Some(neighbor) = by_id.get(other.as_str()) {
            related.push((*neighbor).clone());
        }
    }
    related
}
