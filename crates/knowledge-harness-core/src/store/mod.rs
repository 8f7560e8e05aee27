//! Snapshot storage for the knowledge state.
//!
//! The [`StateStore`] trait is the single-writer seam between a sync run
//! and persistent storage. A run loads the committed state, builds the next
//! one in isolation and commits it as a whole:
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`load`](StateStore::load) | Bind to the committed snapshot |
//! | [`commit`](StateStore::commit) | Replace the committed snapshot, all or nothing |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::state::KnowledgeState;

#[async_trait]
pub trait StateStore: Send + Sync {
    /// The committed snapshot. Callers keep the `Arc` for as long as they
    /// need a consistent view.
    async fn load(&self) -> Result<Arc<KnowledgeState>>;

    /// Atomically replace the committed snapshot with `next`.
    ///
    /// `next.version` must be exactly one more than the committed version.
    /// On error the committed snapshot is unchanged.
    async fn commit(&self, next: KnowledgeState) -> Result<Arc<KnowledgeState>>;
}

/// Reject commits that do not directly follow `current`.
pub fn check_successor(current: u64, next: u64) -> Result<()> {
    if next != current + 1 {
        bail!(
            "snapshot {} does not follow committed snapshot {}",
            next,
            current
        );
    }
    Ok(())
}
