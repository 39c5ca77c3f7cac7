use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::matching::MatchEngine;
use crate::semantic::VectorStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Owns the embedding model handle and the LLM client for every match.
    pub engine: Arc<MatchEngine>,
    /// Candidate index for search. In-memory by default.
    pub candidates: Arc<dyn VectorStore>,
    pub config: Config,
}
