//! Axis classifier.
//!
//! Resolution order for one document:
//!
//! 1. A declared category that names at least one axis
//!    ([`Axis::parse_category`]).
//! 2. Every matching glob rule over the document id: configured
//!    `[[classifier.rules]]` plus, unless disabled, the built-in layout
//!    rules below. Matching rules union.
//! 3. Otherwise `{ontology}`, flagged low-confidence.
//!
//! | Built-in glob | Axes |
//! |---------------|------|
//! | `**/*glossary*` | ontology, graph |
//! | `**/{ontolog*,concepts,taxonom*,frameworks}/**` | ontology |
//! | `**/{graph*,relationship*}/**` | graph |
//! | `**/{vector*,embedding*}/**` | vectors |
//! | `**/*.{md,txt,yml,yaml,json}` | parsing |

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use knowledge_harness_core::models::{Axis, AxisSet, Classification, SourceDocument};
use knowledge_harness_core::KnowledgeError;

use crate::config::ClassifierConfig;

const DEFAULT_RULES: &[(&str, &[Axis])] = &[
    ("**/*glossary*", &[Axis::Ontology, Axis::Graph]),
    (
        "**/{ontolog*,concepts,taxonom*,frameworks}/**",
        &[Axis::Ontology],
    ),
    ("**/{graph*,relationship*}/**", &[Axis::Graph]),
    ("**/{vector*,embedding*}/**", &[Axis::Vectors]),
    ("**/*.{md,txt,yml,yaml,json}", &[Axis::Parsing]),
];

pub struct AxisClassifier {
    globs: GlobSet,
    axes: Vec<AxisSet>,
}

impl AxisClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut axes = Vec::new();

        for rule in &config.classifier_rules() {
            builder.add(
                Glob::new(&rule.0)
                    .with_context(|| format!("invalid classifier glob '{}'", rule.0))?,
            );
            axes.push(rule.1.clone());
        }

        Ok(Self {
            globs: builder.build()?,
            axes,
        })
    }

    /// Classify one document. The error, when present, is the
    /// low-confidence note for the ledger.
    pub fn classify(&self, doc: &SourceDocument) -> (Classification, Option<KnowledgeError>) {
        if let Some(category) = doc.category.as_deref() {
            let declared = Axis::parse_category(category);
            if !declared.is_empty() {
                return (
                    Classification {
                        axes: declared,
                        low_confidence: false,
                    },
                    None,
                );
            }
            tracing::debug!(document = %doc.id, category, "declared category names no axis");
        }

        let matched: AxisSet = self
            .globs
            .matches(&doc.id)
            .into_iter()
            .flat_map(|i| self.axes[i].iter().copied())
            .collect();

        if matched.is_empty() {
            (
                Classification {
                    axes: AxisSet::from([Axis::Ontology]),
                    low_confidence: true,
                },
                Some(KnowledgeError::ClassificationAmbiguous(doc.id.clone())),
            )
        } else {
            (
                Classification {
                    axes: matched,
                    low_confidence: false,
                },
                None,
            )
        }
    }
}

impl ClassifierConfig {
    /// Configured rules followed by the built-in ones (when enabled).
    fn classifier_rules(&self) -> Vec<(String, AxisSet)> {
        let mut rules: Vec<(String, AxisSet)> = self
            .rules
            .iter()
            .map(|r| (r.glob.clone(), r.axes.iter().copied().collect()))
            .collect();
        if self.use_default_rules {
            rules.extend(
                DEFAULT_RULES
                    .iter()
                    .map(|(g, a)| (g.to_string(), a.iter().copied().collect())),
            );
        }
        rules
    }
}
