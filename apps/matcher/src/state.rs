use sqlx::SqlitePool;

use crate::config::Config;
use crate::matching::similarity::SimilarityScorer;
use crate::session::store::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    /// Open browser sessions, keyed by bearer token.
    pub sessions: SessionStore,
    /// Wraps the single embedding backend loaded for the process lifetime.
    pub scorer: SimilarityScorer,
}
