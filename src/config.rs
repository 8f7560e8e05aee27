//! TOML configuration.
//!
//! Every section except `[db]` and `[source]` is optional and falls back to
//! defaults. [`load_config`] parses and validates the file; validation
//! failures are reported before any state is touched.
//!
//! ```toml
//! [db]
//! path = "./data/kh.sqlite"
//!
//! [source]
//! root = "./docs"
//! repository = "voither/knowledge"
//!
//! [[classifier.rules]]
//! glob = "clinical/**"
//! axes = ["ontology", "vectors"]
//!
//! [embedding]
//! provider = "hashed"
//! dims = 256
//!
//! [publish]
//! dir = "./public/knowledge"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use knowledge_harness_core::graph::DefinitionPolicy;
use knowledge_harness_core::models::Axis;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Recorded in the ledger and published sync info.
    #[serde(default)]
    pub repository: Option<String>,
}

fn default_include_globs() -> Vec<String> {
    ["**/*.md", "**/*.txt", "**/*.yml", "**/*.yaml", "**/*.json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub rules: Vec<ClassifierRule>,
    #[serde(default = "default_true")]
    pub use_default_rules: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            use_default_rules: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierRule {
    pub glob: String,
    pub axes: Vec<Axis>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExtractionConfig {
    /// Domain terms recognised as concepts wherever they appear.
    #[serde(default)]
    pub terms: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GraphConfig {
    #[serde(default)]
    pub definition_policy: DefinitionPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (OpenAI-compatible gateways, remote Ollama).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PublishConfig {
    #[serde(default = "default_publish_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_ontology_sample")]
    pub ontology_sample: usize,
    /// Snapshot directories kept on disk, counting the one `CURRENT`
    /// points at. Older ones are removed after each publish.
    #[serde(default = "default_keep_snapshots")]
    pub keep_snapshots: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            dir: default_publish_dir(),
            history_limit: default_history_limit(),
            ontology_sample: default_ontology_sample(),
            keep_snapshots: default_keep_snapshots(),
        }
    }
}

fn default_publish_dir() -> PathBuf {
    PathBuf::from("./public/knowledge")
}
fn default_history_limit() -> usize {
    20
}
fn default_ontology_sample() -> usize {
    100
}
fn default_keep_snapshots() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerConfig {
    /// Where consumers fetch artifacts: an `http(s)://` URL or a directory.
    /// Defaults to the publish directory.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Extra highlight terms on top of the published ontology.
    #[serde(default)]
    pub vocabulary: Vec<String>,
    /// Seconds an empty load is reused before fetching again.
    #[serde(default = "default_empty_retry_secs")]
    pub empty_retry_secs: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            vocabulary: Vec::new(),
            empty_retry_secs: default_empty_retry_secs(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_empty_retry_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Artifact location for consumers: `[consumer] base_url` or the
    /// publish directory.
    pub fn artifact_base(&self) -> String {
        self.consumer
            .base_url
            .clone()
            .unwrap_or_else(|| self.publish.dir.display().to_string())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.source.include_globs.is_empty() {
        bail!("source.include_globs must not be empty");
    }

    for rule in &config.classifier.rules {
        if rule.axes.is_empty() {
            bail!("classifier rule '{}' must name at least one axis", rule.glob);
        }
    }

    if config.publish.history_limit == 0 {
        bail!("publish.history_limit must be >= 1");
    }

    if config.publish.keep_snapshots == 0 {
        bail!("publish.keep_snapshots must be >= 1");
    }

    if config.consumer.fetch_timeout_secs == 0 {
        bail!("consumer.fetch_timeout_secs must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "hashed" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or hashed.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        if config.embedding.model.is_none() && config.embedding.provider != "hashed" {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
        [db]
        path = "kh.sqlite"
        [source]
        root = "docs"
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.publish.history_limit, 20);
        assert_eq!(config.publish.ontology_sample, 100);
        assert_eq!(config.publish.keep_snapshots, 10);
        assert_eq!(config.consumer.fetch_timeout_secs, 10);
        assert_eq!(config.consumer.empty_retry_secs, 5);
        assert!(config.classifier.use_default_rules);
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.graph.definition_policy, DefinitionPolicy::FirstNonEmpty);
        assert_eq!(config.source.include_globs.len(), 5);
        assert_eq!(config.artifact_base(), "./public/knowledge");
    }

    #[test]
    fn classifier_rules_and_policy_parse() {
        let text = format!(
            "{MINIMAL}\n[graph]\ndefinition_policy = \"richest\"\n[[classifier.rules]]\nglob = \"clinical/**\"\naxes = [\"ontology\", \"vectors\"]\n"
        );
        let config = parse(&text).unwrap();
        assert_eq!(config.graph.definition_policy, DefinitionPolicy::Richest);
        assert_eq!(config.classifier.rules[0].axes, vec![Axis::Ontology, Axis::Vectors]);
    }

    #[test]
    fn enabled_provider_requires_dims() {
        let text = format!("{MINIMAL}\n[embedding]\nprovider = \"hashed\"\n");
        assert!(parse(&text).is_err());
        let text = format!("{MINIMAL}\n[embedding]\nprovider = \"hashed\"\ndims = 64\n");
        assert!(parse(&text).is_ok());
        let text = format!("{MINIMAL}\n[embedding]\nprovider = \"openai\"\ndims = 64\n");
        assert!(parse(&text).is_err());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let text = format!("{MINIMAL}\n[embedding]\nprovider = \"magic\"\n");
        let err = parse(&text).unwrap_err().to_string();
        assert!(err.contains("Unknown embedding provider"));
    }

    #[test]
    fn zero_kept_snapshots_is_rejected() {
        let text = format!("{MINIMAL}\n[publish]\nkeep_snapshots = 0\n");
        let err = parse(&text).unwrap_err().to_string();
        assert!(err.contains("keep_snapshots"));
    }

    #[test]
    fn rule_without_axes_is_rejected() {
        let text = format!("{MINIMAL}\n[[classifier.rules]]\nglob = \"x/**\"\naxes = []\n");
        assert!(parse(&text).is_err());
    }
}
