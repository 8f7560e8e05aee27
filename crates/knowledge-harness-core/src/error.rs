//! Error taxonomy shared by the producer and consumer paths.
//!
//! Most variants are recovered locally: they end up as ledger notes or
//! `warn!` lines and the caller continues with an empty or deferred
//! result. Only [`KnowledgeError::SnapshotPersist`] is fatal for a run.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KnowledgeError {
    #[error("source unavailable: {resource}: {reason}")]
    SourceUnavailable { resource: String, reason: String },

    #[error("malformed artifact {resource}: {reason}")]
    MalformedArtifact { resource: String, reason: String },

    #[error("no axis matched document {0}; defaulted to ontology")]
    ClassificationAmbiguous(String),

    #[error("embedding deferred for {document}: {reason}")]
    EmbeddingProviderFailure { document: String, reason: String },

    #[error("conflicting definitions for concept {concept}: kept {kept:?}, ignored {ignored:?} from {document}")]
    MergeConflict {
        concept: String,
        kept: String,
        ignored: String,
        document: String,
    },

    #[error("failed to persist snapshot {version}: {reason}")]
    SnapshotPersist { version: u64, reason: String },
}

impl KnowledgeError {
    pub fn unavailable(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedArtifact {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the fetch-side failures that consumers treat as "absent".
    pub fn is_absent_resource(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::MalformedArtifact { .. }
        )
    }
}

/// Result type for fallible core operations.
pub type KnowledgeResult<T> = Result<T, KnowledgeError>;
