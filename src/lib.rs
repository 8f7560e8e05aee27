//! # Knowledge Harness
//!
//! Incremental four-axis knowledge sync and retrieval.
//!
//! A sync run takes a document collection, detects what changed since the
//! last run, classifies each changed document onto the ontology, parsing,
//! vectors and graph axes, merges extracted concepts and relations into a
//! persistent concept graph, embeds changed documents, refreshes the content
//! index and appends a ledger record. The result is committed as one
//! numbered snapshot and published as four JSON resources that consumers
//! (the CLI, the HTTP API, static front-ends) load, search, traverse and
//! use for term highlighting.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌──────────┐
//! │ Connector   │──▶│ detect → classify →  │──▶│  SQLite  │
//! │ filesystem  │   │ merge → embed → index│   │ snapshot │
//! └─────────────┘   └──────────┬───────────┘   └──────────┘
//!                              ▼
//!                   publish_dir/snapshots/<v>/*.json + CURRENT
//!                              │
//!                   ┌──────────┴──────────┐
//!                   ▼                     ▼
//!              ┌──────────┐         ┌──────────┐
//!              │   CLI    │         │   HTTP   │
//!              │   (kh)   │         │  (axum)  │
//!              └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kh init                          # create database
//! kh sync --revision "$GIT_SHA"    # ingest and publish
//! kh search brre                   # search the content index
//! kh related BRRE                  # graph neighbours
//! kh serve                         # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`traits`] | `Connector` extension trait |
//! | [`connector_fs`] | Filesystem connector |
//! | [`classify`] | Axis classifier rules |
//! | [`embedding`] | Embedding providers |
//! | [`ingest`] | Sync pipeline |
//! | [`publish`] | Snapshot staging and `CURRENT` pointer |
//! | [`sqlite_store`] | SQLite snapshot store |
//! | [`loader`] | Consumer-side artifact loading |
//! | [`search`] | Search, related and highlight commands |
//! | [`server`] | HTTP API |
//! | [`stats`] | Stats and history commands |
//! | [`export`] | GraphML / Cypher / JSON graph export |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod classify;
pub mod config;
pub mod connector_fs;
pub mod db;
pub mod embedding;
pub mod export;
pub mod ingest;
pub mod loader;
pub mod migrate;
pub mod publish;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod traits;
