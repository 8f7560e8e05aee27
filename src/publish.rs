//! Snapshot publishing.
//!
//! Layout under `[publish] dir`:
//!
//! ```text
//! CURRENT                      # "<version>\n"
//! snapshots/<version>/metadata.json
//! snapshots/<version>/ontology.json
//! snapshots/<version>/graph.json
//! snapshots/<version>/content_index.json
//! ```
//!
//! A run stages its snapshot directory before committing the store and
//! only then replaces `CURRENT` (temp file + rename). Consumers that read
//! `CURRENT` first therefore never observe a half-written snapshot.
//!
//! After the swap, [`Publisher::prune`] keeps the newest
//! `[publish] keep_snapshots` directories up to and including the current
//! one. Directories above the current version are never touched.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use knowledge_harness_core::artifacts::{SnapshotArtifacts, CURRENT_FILE};
use knowledge_harness_core::state::KnowledgeState;

use crate::config::PublishConfig;

#[derive(Debug, Clone)]
pub struct Publisher {
    dir: PathBuf,
    history_limit: usize,
    ontology_sample: usize,
    keep_snapshots: usize,
}

impl Publisher {
    pub fn new(config: &PublishConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            history_limit: config.history_limit,
            ontology_sample: config.ontology_sample,
            keep_snapshots: config.keep_snapshots.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_dir(&self, version: u64) -> PathBuf {
        self.dir.join("snapshots").join(version.to_string())
    }

    pub fn artifacts(&self, state: &KnowledgeState) -> SnapshotArtifacts {
        SnapshotArtifacts::from_state(state, self.history_limit, self.ontology_sample)
    }

    /// Write the four resources for `state.version`. An existing directory
    /// for that version (left by an aborted run) is replaced.
    pub async fn stage(&self, state: &KnowledgeState) -> Result<PathBuf> {
        let target = self.snapshot_dir(state.version);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&target).await?;
        }
        tokio::fs::create_dir_all(&target)
            .await
            .with_context(|| format!("Failed to create {}", target.display()))?;

        for (name, body) in self.artifacts(state).render()? {
            let path = target.join(name);
            tokio::fs::write(&path, body)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(target)
    }

    /// Remove a staged snapshot that will not be committed.
    pub async fn discard(&self, version: u64) {
        let target = self.snapshot_dir(version);
        if let Err(e) = tokio::fs::remove_dir_all(&target).await {
            tracing::warn!(path = %target.display(), error = %e, "failed to remove staged snapshot");
        }
    }

    /// Atomically point `CURRENT` at `version`.
    pub async fn swap_current(&self, version: u64) -> Result<()> {
        let tmp = self
            .dir
            .join(format!("{}.tmp-{}", CURRENT_FILE, Uuid::new_v4()));
        tokio::fs::write(&tmp, format!("{}\n", version)).await?;
        tokio::fs::rename(&tmp, self.dir.join(CURRENT_FILE))
            .await
            .context("Failed to replace CURRENT pointer")?;
        Ok(())
    }

    /// Delete snapshot directories older than the newest `keep_snapshots`
    /// at or below `current`. Returns the versions removed; failures are
    /// logged and skipped.
    pub async fn prune(&self, current: u64) -> Vec<u64> {
        let root = self.dir.join("snapshots");
        let mut entries = match tokio::fs::read_dir(&root).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %root.display(), error = %e, "cannot list snapshots for pruning");
                return Vec::new();
            }
        };

        let mut versions = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if let Ok(v) = entry.file_name().to_string_lossy().parse::<u64>() {
                        if v <= current {
                            versions.push(v);
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "snapshot listing interrupted, pruning skipped");
                    return Vec::new();
                }
            }
        }
        versions.sort_unstable_by(|a, b| b.cmp(a));

        let mut removed = Vec::new();
        for version in versions.into_iter().skip(self.keep_snapshots) {
            let target = self.snapshot_dir(version);
            match tokio::fs::remove_dir_all(&target).await {
                Ok(()) => removed.push(version),
                Err(e) => {
                    tracing::warn!(path = %target.display(), error = %e, "failed to remove old snapshot")
                }
            }
        }
        removed.sort_unstable();
        removed
    }

    /// Version `CURRENT` points at, if any.
    pub async fn current_version(&self) -> Result<Option<u64>> {
        match tokio::fs::read_to_string(self.dir.join(CURRENT_FILE)).await {
            Ok(text) => Ok(Some(
                text.trim()
                    .parse()
                    .with_context(|| format!("CURRENT holds '{}'", text.trim()))?,
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
