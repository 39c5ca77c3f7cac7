pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::matching::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Matching
        .route("/api/v1/matches", post(handlers::handle_match))
        .route("/api/v1/matches/:id", get(handlers::handle_get_match))
        .route("/api/v1/matches/batch", post(handlers::handle_batch_match))
        .route("/api/v1/matches/shortlist", post(handlers::handle_shortlist))
        // Embedding-space analyses
        .route(
            "/api/v1/skills/analysis",
            post(handlers::handle_skills_analysis),
        )
        .route(
            "/api/v1/experience/analysis",
            post(handlers::handle_experience_analysis),
        )
        // Candidate index
        .route("/api/v1/candidates", post(handlers::handle_index_candidates))
        .route(
            "/api/v1/candidates/search",
            post(handlers::handle_search_candidates),
        )
        .route(
            "/api/v1/candidates/:id",
            delete(handlers::handle_remove_candidate),
        )
        .with_state(state)
}
