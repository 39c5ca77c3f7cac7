mod config;
mod db;
mod errors;
mod llm_client;
mod matching;
mod models;
mod routes;
mod semantic;
mod state;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::matching::MatchEngine;
use crate::routes::build_router;
use crate::semantic::{CandidateIndex, Embedder, FastEmbedModel, SemanticMatcher};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or out-of-range env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Screener API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Load the embedding model once; every match shares it
    let model = FastEmbedModel::load_shared(
        config.embedding.model.clone(),
        config.embedding.cache_dir.clone(),
    )
    .await
    .context("Failed to load embedding model")?;
    info!(
        "Embedding model ready: {} ({} dimensions)",
        model.name(),
        model.dimensions()
    );
    let embedder: Arc<dyn Embedder> = Arc::new(model);

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone(), &config.llm)
        .context("Failed to build LLM client")?;
    info!("LLM client initialized (model: {})", llm.model());

    let semantic = Arc::new(SemanticMatcher::new(
        Arc::clone(&embedder),
        config.matching.semantic_threshold,
    ));
    let engine = Arc::new(MatchEngine::new(
        semantic,
        Arc::new(llm),
        config.matching.clone(),
    ));
    info!(
        "Matching engine ready (threshold {:.2}, semantic filter {}, batch concurrency {})",
        config.matching.semantic_threshold,
        if config.matching.enable_semantic_filter { "on" } else { "off" },
        config.matching.batch_concurrency
    );

    // Build app state
    let state = AppState {
        db,
        engine,
        candidates: Arc::new(CandidateIndex::new(embedder)),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS origins once the recruiter UI has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
