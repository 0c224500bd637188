mod auth;
mod config;
mod db;
mod errors;
mod matching;
mod models;
mod routes;
mod session;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::matching::embedding::build_embedder;
use crate::matching::similarity::SimilarityScorer;
use crate::routes::build_router;
use crate::session::store::SessionStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Matcher v{}", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite credential store
    let db = create_pool(&config.database_url).await?;

    // Initialize the embedding backend (model weights load on first use)
    let embedder = build_embedder(config.embedding_backend)
        .with_context(|| format!("Cannot start embedding backend '{}'", config.embedding_backend))?;
    let scorer = SimilarityScorer::new(embedder);
    info!("Similarity scorer initialized (backend: {})", scorer.backend());

    let state = AppState {
        db,
        config: config.clone(),
        sessions: SessionStore::new(config.max_logged_out_sessions),
        scorer,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
