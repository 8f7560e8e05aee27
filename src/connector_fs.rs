//! Filesystem connector.
//!
//! Walks `[source] root`, keeps files matching the include globs and not
//! matching the exclude globs (`.git`, `target` and `node_modules` are
//! always excluded), and turns each into a [`SourceDocument`] keyed by its
//! `/`-separated path relative to the root. Output is sorted by id.
//!
//! Invalid UTF-8 is decoded lossily. A file that cannot be read at all is
//! reported in [`SourceSet::unreadable`] rather than dropped, so a
//! transient I/O error never looks like a deletion.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use knowledge_harness_core::models::SourceDocument;

use crate::config::SourceConfig;
use crate::traits::{Connector, SourceSet};

pub struct FilesystemConnector {
    config: SourceConfig,
}

impl FilesystemConnector {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &PathBuf {
        &self.config.root
    }
}

#[async_trait]
impl Connector for FilesystemConnector {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn scan(&self) -> Result<SourceSet> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || scan_filesystem(&config))
            .await
            .context("filesystem scan task panicked")?
    }
}

pub fn scan_filesystem(config: &SourceConfig) -> Result<SourceSet> {
    let root = &config.root;
    if !root.exists() {
        bail!("Source root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut candidates = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let id = relative_id(relative);

        if exclude_set.is_match(&id) || !include_set.is_match(&id) {
            continue;
        }

        candidates.push((id, path.to_path_buf()));
    }

    Ok(read_documents(candidates))
}

/// Read every `(id, path)` candidate into a sorted [`SourceSet`].
fn read_documents(candidates: Vec<(String, PathBuf)>) -> SourceSet {
    let mut set = SourceSet::default();
    for (id, path) in candidates {
        match read_source(&path) {
            Ok(content) => set.documents.push(SourceDocument::from_text(id, content)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable file, keeping previous version");
                set.unreadable.push(id);
            }
        }
    }
    set.documents.sort_by(|a, b| a.id.cmp(&b.id));
    set.unreadable.sort();
    set
}

fn read_source(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %path.display(), "invalid UTF-8, decoding lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    })
}

fn relative_id(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob '{}'", pattern))?);
    }
    Ok(builder.build()?)
}
