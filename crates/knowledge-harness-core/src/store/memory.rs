//! In-memory [`StateStore`] for tests and embedding.
//!
//! The committed snapshot lives behind an `RwLock<Arc<_>>`; a commit swaps
//! the pointer, so readers holding an older `Arc` are never affected.

use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::state::KnowledgeState;

use super::{check_successor, StateStore};

pub struct InMemoryStateStore {
    current: RwLock<Arc<KnowledgeState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::with_state(KnowledgeState::default())
    }

    pub fn with_state(state: KnowledgeState) -> Self {
        Self {
            current: RwLock::new(Arc::new(state)),
        }
    }

    pub fn version(&self) -> u64 {
        self.current.read().map(|s| s.version).unwrap_or_default()
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self) -> Result<Arc<KnowledgeState>> {
        let guard = self
            .current
            .read()
            .map_err(|_| anyhow!("state lock poisoned"))?;
        Ok(Arc::clone(&guard))
    }

    async fn commit(&self, next: KnowledgeState) -> Result<Arc<KnowledgeState>> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| anyhow!("state lock poisoned"))?;
        check_successor(guard.version, next.version)?;
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        Ok(next)
    }
}
