use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, version and the models the pipeline runs on.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "screener-api",
        "llm_model": state.config.llm.model,
        "embedding_model": state.config.embedding.model,
        "indexed_candidates": state.candidates.len().await,
    }))
}
