pub mod health;
pub mod index;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::matching::handlers as matching;
use crate::session::handlers as session;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(index::index_handler))
        .route("/health", get(health::health_handler))
        // Session / navigation
        .route(
            "/api/v1/session",
            get(session::handle_get_session).post(session::handle_open_session),
        )
        .route("/api/v1/session/navigate", post(session::handle_navigate))
        // Auth
        .route("/api/v1/auth/register", post(auth::handle_register))
        .route("/api/v1/auth/login", post(auth::handle_login))
        .route("/api/v1/auth/logout", post(auth::handle_logout))
        // Matching
        .route("/api/v1/match", post(matching::handle_match))
        .route("/api/v1/match/text", post(matching::handle_match_text))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
