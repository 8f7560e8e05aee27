//! Consumer commands over the published knowledge: `kh search`,
//! `kh related` and `kh highlight`.
//!
//! All three read through the [`KnowledgeLoader`], so they see exactly what
//! the HTTP API and other consumers see.

use anyhow::{Context, Result};
use std::path::Path;

use knowledge_harness_core::highlight::Segment;
use knowledge_harness_core::search::{MIN_QUERY_CHARS, TOP_N};

use crate::config::Config;
use crate::loader::KnowledgeLoader;

pub async fn run_search(config: &Config, query: &str, all: bool) -> Result<()> {
    if query.trim().chars().count() < MIN_QUERY_CHARS {
        println!("Query must be at least {} characters.", MIN_QUERY_CHARS);
        return Ok(());
    }

    let loader = KnowledgeLoader::from_config(config)?;
    let kb = loader.initialize().await;
    let results = kb.search(query);

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let shown = if all { &results.matches[..] } else { results.top() };
    for (i, entry) in shown.iter().enumerate() {
        println!("{}. {}", i + 1, entry.title);
        println!("    category: {}  type: {}", entry.category, entry.doc_type);
        if !entry.path.is_empty() {
            println!("    path: {}", entry.path);
        }
        if !entry.keywords.is_empty() {
            println!("    keywords: {}", entry.keywords.join(", "));
        }
        println!();
    }
    if !all && results.matches.len() > TOP_N {
        println!(
            "{} more result(s); use --all to list everything.",
            results.matches.len() - TOP_N
        );
    }
    Ok(())
}

pub async fn run_related(config: &Config, name: &str) -> Result<()> {
    let loader = KnowledgeLoader::from_config(config)?;
    let kb = loader.initialize().await;
    let related = kb.related_concepts(name);

    if related.is_empty() {
        println!("No related concepts.");
        return Ok(());
    }

    for node in &related {
        match &node.definition {
            Some(definition) => println!("{}  ({})\n    {}", node.name, node.id, definition),
            None => println!("{}  ({})", node.name, node.id),
        }
    }
    Ok(())
}

pub async fn run_highlight(config: &Config, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let loader = KnowledgeLoader::from_config(config)?;
    let kb = loader.initialize().await;
    let segments = kb.highlight(&text);

    println!("{}", render_marked(&segments));

    let mut glossary: Vec<(&str, &str)> = segments
        .iter()
        .filter_map(|s| match s {
            Segment::Term {
                term,
                definition: Some(definition),
                ..
            } => Some((term.as_str(), definition.as_str())),
            _ => None,
        })
        .collect();
    glossary.sort();
    glossary.dedup();

    if !glossary.is_empty() {
        println!();
        println!("--- Terms ---");
        for (term, definition) in glossary {
            println!("{}: {}", term, definition);
        }
    }
    Ok(())
}

/// Plain text with every matched term wrapped as `[[text]]`.
pub fn render_marked(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| match s {
            Segment::Plain { text } => text.clone(),
            Segment::Term { text, .. } => format!("[[{}]]", text),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marked_rendering_wraps_terms_only() {
        let segments = vec![
            Segment::Plain {
                text: "uses ".into(),
            },
            Segment::Term {
                text: "brre".into(),
                term: "BRRE".into(),
                definition: None,
            },
            Segment::Plain { text: ".".into() },
        ];
        assert_eq!(render_marked(&segments), "uses [[brre]].");
    }
}
