//! Axum route handlers for the Session API.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::session::extract::CurrentSession;
use crate::session::navigation::{NavEvent, Page};
use crate::session::store::SessionView;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub to: Page,
}

/// POST /api/v1/session
///
/// Opens a new logged-out session. The returned token goes in
/// `Authorization: Bearer <token>` on every later request.
pub async fn handle_open_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionView>) {
    let session = state.sessions.open().await;
    (StatusCode::CREATED, Json(SessionView::from(&session)))
}

/// GET /api/v1/session
pub async fn handle_get_session(CurrentSession(session): CurrentSession) -> Json<SessionView> {
    Json(SessionView::from(&session))
}

/// POST /api/v1/session/navigate
///
/// Switches between the login and registration pages.
pub async fn handle_navigate(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(request): Json<NavigateRequest>,
) -> Result<Json<SessionView>, AppError> {
    let event = match request.to {
        Page::Login => NavEvent::BackToLogin,
        Page::Register => NavEvent::CreateAccount,
    };
    let session = state.sessions.transition(session.token, event).await?;
    Ok(Json(SessionView::from(&session)))
}
