//! # Knowledge Harness Core
//!
//! I/O-free logic for Knowledge Harness: the four-axis document model,
//! change detection, concept extraction, the growth-preserving graph
//! merger, the content index, the sync ledger, snapshot state, and the
//! consumer-side retrieval operations (search, related concepts, term
//! highlighting).
//!
//! This crate contains no tokio runtime, sqlx, reqwest or filesystem
//! access. The `knowledge-harness` app crate wires these pieces to SQLite,
//! HTTP and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Source documents, axes, fingerprints, document records |
//! | [`change`] | Content hashing and new/modified/unchanged/deleted detection |
//! | [`extract`] | Front matter, titles, concept and relation mentions |
//! | [`graph`] | Concept graph with merge and deletion semantics |
//! | [`index`] | Content index builder |
//! | [`ledger`] | Append-only sync history |
//! | [`state`] | Versioned knowledge state |
//! | [`store`] | Snapshot store trait + in-memory implementation |
//! | [`artifacts`] | Published resource shapes |
//! | [`search`] | Substring search over the content index |
//! | [`traversal`] | Related-concept lookup |
//! | [`highlight`] | Whole-word term annotation |
//! | [`knowledge`] | Loaded knowledge base used by consumers |

pub mod artifacts;
pub mod change;
pub mod error;
pub mod extract;
pub mod graph;
pub mod highlight;
pub mod index;
pub mod knowledge;
pub mod ledger;
pub mod models;
pub mod search;
pub mod state;
pub mod store;
pub mod traversal;

pub use error::KnowledgeError;
