//! Connector extension trait.
//!
//! A [`Connector`] produces the [`SourceDocument`] set a sync run works on.
//! The filesystem connector is built in; embedders and tests implement the
//! trait to feed documents from anywhere else.
//!
//! ```rust
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use knowledge_harness::traits::{Connector, SourceSet};
//! use knowledge_harness_core::models::SourceDocument;
//!
//! pub struct WikiConnector;
//!
//! #[async_trait]
//! impl Connector for WikiConnector {
//!     fn name(&self) -> &str { "wiki" }
//!
//!     async fn scan(&self) -> Result<SourceSet> {
//!         Ok(vec![SourceDocument::new("home.md", "# Home")].into())
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;

use knowledge_harness_core::models::SourceDocument;

/// Everything one scan saw.
///
/// An id in `unreadable` still exists in the source but its content could
/// not be read this time; the sync keeps its previous version.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    pub documents: Vec<SourceDocument>,
    pub unreadable: Vec<String>,
}

impl From<Vec<SourceDocument>> for SourceSet {
    fn from(documents: Vec<SourceDocument>) -> Self {
        Self {
            documents,
            unreadable: Vec::new(),
        }
    }
}

/// A source of documents for a sync run.
///
/// `scan` returns the complete current source: any previously seen id
/// that is neither a document nor unreadable is treated as deleted.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Short label used in logs (e.g. `"filesystem"`).
    fn name(&self) -> &str;

    async fn scan(&self) -> Result<SourceSet>;
}

/// Connector over a fixed, in-memory document list.
#[derive(Debug, Clone, Default)]
pub struct StaticConnector {
    documents: Vec<SourceDocument>,
}

impl StaticConnector {
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl Connector for StaticConnector {
    fn name(&self) -> &str {
        "static"
    }

    async fn scan(&self) -> Result<SourceSet> {
        Ok(self.documents.clone().into())
    }
}
