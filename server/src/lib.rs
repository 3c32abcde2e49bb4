use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Json, Router,
};
use clap::Parser;
use search_core::persist::{load_engine, IndexPaths};
use search_core::{SearchEngine, SearchOutcome};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod html;

#[derive(Parser, Debug, Clone)]
#[command(name = "server", about = "Serve cosine-ranked search over a prebuilt index")]
pub struct ServerConfig {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    pub index: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    /// Corpus size; overrides the value recorded in meta.json
    #[arg(long)]
    pub num_docs: Option<u32>,
    /// Result count when the request does not ask for one
    #[arg(long, default_value_t = 10)]
    pub default_k: usize,
    /// Upper bound on the requested result count
    #[arg(long, default_value_t = 100)]
    pub max_k: usize,
    /// Comma-separated allowed origins; any origin when unset
    #[arg(long, env = "CORS_ALLOW_ORIGIN")]
    pub cors_allow_origin: Option<String>,
}

impl ServerConfig {
    pub fn for_index<P: Into<PathBuf>>(index: P) -> Self {
        Self {
            index: index.into(),
            host: "0.0.0.0".into(),
            port: 8080,
            num_docs: None,
            default_k: 10,
            max_k: 100,
            cors_allow_origin: None,
        }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub k: Option<usize>,
}

#[derive(Deserialize)]
pub struct ResultsParams {
    #[serde(rename = "searchQuery", default)]
    pub search_query: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub terms: Vec<String>,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f64,
    pub title: Option<String>,
    pub url: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: SearchEngine,
    pub default_k: usize,
    pub max_k: usize,
}

impl AppState {
    fn clamp_k(&self, k: Option<usize>) -> usize {
        k.unwrap_or(self.default_k).clamp(1, self.max_k)
    }

    /// Link shown for a document: its recorded URL, else the identifier itself.
    pub fn link_for(&self, doc_id: &str) -> String {
        self.engine
            .doc_meta(doc_id)
            .and_then(|m| m.url.clone())
            .unwrap_or_else(|| doc_id.to_string())
    }

    fn hits(&self, outcome: &SearchOutcome) -> Vec<SearchHit> {
        outcome
            .hits
            .iter()
            .map(|h| SearchHit {
                doc_id: h.doc_id.clone(),
                score: h.score,
                title: self.engine.doc_meta(&h.doc_id).and_then(|m| m.title.clone()),
                url: self.link_for(&h.doc_id),
            })
            .collect()
    }
}

/// Load the index named by `config` and assemble the router. Any load failure
/// is returned before a socket is bound.
pub fn build_app(config: &ServerConfig) -> Result<Router> {
    let engine = load_engine(&IndexPaths::new(&config.index), config.num_docs)?;
    let max_k = config.max_k.max(1);
    let state = AppState { engine, default_k: config.default_k.clamp(1, max_k), max_k };
    Ok(build_router(state, cors_layer(config.cors_allow_origin.as_deref())))
}

fn cors_layer(allow_origin: Option<&str>) -> CorsLayer {
    let origins: Vec<_> = allow_origin
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    if origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
    }
}

pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/results", get(results_handler))
        .route("/doc/*doc_id", get(doc_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let k = state.clamp_k(params.k);
    let outcome = state.engine.search(&params.q, Some(k));
    let results = state.hits(&outcome);
    Json(SearchResponse {
        query: outcome.query,
        terms: outcome.terms,
        took_ms: outcome.elapsed.as_millis(),
        took_s: outcome.elapsed.as_secs_f64(),
        total_hits: outcome.total_hits,
        results,
    })
}

pub async fn results_handler(State(state): State<AppState>, Query(params): Query<ResultsParams>) -> Html<String> {
    let outcome = state.engine.search(&params.search_query, None);
    let links: Vec<(String, f64)> = outcome
        .hits
        .iter()
        .map(|h| (state.link_for(&h.doc_id), h.score))
        .collect();
    Html(html::results_page(&outcome.query, &links, outcome.elapsed))
}

pub async fn index_page() -> Html<String> {
    Html(html::start_page())
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    if !state.engine.contains_document(&doc_id) {
        return Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" }))));
    }
    let meta = state.engine.doc_meta(&doc_id);
    Ok(Json(serde_json::json!({
        "doc_id": doc_id,
        "title": meta.and_then(|m| m.title.clone()),
        "url": state.link_for(&doc_id),
    })))
}
