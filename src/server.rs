//! Knowledge HTTP API.
//!
//! Serves the loaded knowledge base to other tools and browser clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version and bound snapshot |
//! | `GET`  | `/api/background/metadata` | Published metadata resource |
//! | `GET`  | `/api/background/search?q=` | Content index search |
//! | `GET`  | `/api/background/concepts?name=` | Concepts related to `name` |
//! | `GET`  | `/api/background/graph` | Full graph resource |
//! | `POST` | `/api/background/enhance` | Highlight domain terms in `{ "text": ... }` |
//! | `POST` | `/api/background/reload` | Reload artifacts |
//!
//! Handlers never fail because a resource is missing: they answer with an
//! empty object or list instead.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use knowledge_harness_core::artifacts::{GraphNode, GraphResource};
use knowledge_harness_core::highlight::Segment;
use knowledge_harness_core::index::IndexEntry;

use crate::config::Config;
use crate::loader::KnowledgeLoader;

#[derive(Clone)]
struct AppState {
    loader: Arc<KnowledgeLoader>,
}

/// Routes over a shared loader.
pub fn router(loader: Arc<KnowledgeLoader>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/background/metadata", get(handle_metadata))
        .route("/api/background/search", get(handle_search))
        .route("/api/background/concepts", get(handle_concepts))
        .route("/api/background/graph", get(handle_graph))
        .route("/api/background/enhance", post(handle_enhance))
        .route("/api/background/reload", post(handle_reload))
        .layer(cors)
        .with_state(AppState { loader })
}

/// Bind to `[server] bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let loader = Arc::new(KnowledgeLoader::from_config(config)?);
    let kb = loader.initialize().await;
    println!(
        "Loaded {}/4 knowledge resources from {}",
        kb.loaded_count(),
        loader.describe()
    );

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Knowledge API listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    axum::serve(listener, router(loader)).await?;
    Ok(())
}

// ============ GET /health ============

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub snapshot: Option<u64>,
    pub resources_loaded: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let kb = state.loader.initialize().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        snapshot: kb.snapshot,
        resources_loaded: kb.loaded_count(),
    })
}

// ============ GET /api/background/metadata ============

async fn handle_metadata(State(state): State<AppState>) -> Json<serde_json::Value> {
    let kb = state.loader.initialize().await;
    let body = kb
        .metadata
        .as_ref()
        .and_then(|m| serde_json::to_value(m).ok())
        .unwrap_or_else(|| serde_json::json!({}));
    Json(body)
}

// ============ GET /api/background/search ============

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    /// First five matches, index order.
    pub results: Vec<IndexEntry>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let kb = state.loader.initialize().await;
    let results = kb.search(&params.q);
    Json(SearchResponse {
        query: results.query.clone(),
        total: results.matches.len(),
        results: results.top().to_vec(),
    })
}

// ============ GET /api/background/concepts ============

#[derive(Deserialize)]
struct ConceptParams {
    #[serde(default)]
    name: String,
}

#[derive(Serialize, Deserialize)]
pub struct ConceptsResponse {
    pub name: String,
    pub related: Vec<GraphNode>,
}

async fn handle_concepts(
    State(state): State<AppState>,
    Query(params): Query<ConceptParams>,
) -> Json<ConceptsResponse> {
    let kb = state.loader.initialize().await;
    let related = kb.related_concepts(&params.name);
    Json(ConceptsResponse {
        name: params.name,
        related,
    })
}

// ============ GET /api/background/graph ============

async fn handle_graph(State(state): State<AppState>) -> Json<GraphResource> {
    let kb = state.loader.initialize().await;
    Json(kb.graph.clone().unwrap_or_default())
}

// ============ POST /api/background/enhance ============

#[derive(Deserialize)]
struct EnhanceRequest {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Deserialize)]
pub struct EnhanceResponse {
    pub segments: Vec<Segment>,
    pub terms_found: usize,
}

async fn handle_enhance(
    State(state): State<AppState>,
    Json(request): Json<EnhanceRequest>,
) -> Json<EnhanceResponse> {
    let kb = state.loader.initialize().await;
    let segments = kb.highlight(&request.text);
    let terms_found = segments.iter().filter(|s| s.is_term()).count();
    Json(EnhanceResponse {
        segments,
        terms_found,
    })
}

// ============ POST /api/background/reload ============

#[derive(Serialize, Deserialize)]
pub struct ReloadResponse {
    pub snapshot: Option<u64>,
    pub resources_loaded: usize,
}

async fn handle_reload(State(state): State<AppState>) -> Json<ReloadResponse> {
    let kb = state.loader.refresh().await;
    Json(ReloadResponse {
        snapshot: kb.snapshot,
        resources_loaded: kb.loaded_count(),
    })
}
