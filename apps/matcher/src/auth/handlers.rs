//! Axum route handlers for the Auth API.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::store::{add_user, verify_user};
use crate::errors::AppError;
use crate::session::extract::CurrentSession;
use crate::session::navigation::NavEvent;
use crate::session::store::{Session, SessionView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub session: SessionView,
}

fn require_logged_out(session: &Session) -> Result<(), AppError> {
    if session.screen.is_logged_in() {
        return Err(AppError::Conflict("Already logged in".to_string()));
    }
    Ok(())
}

/// POST /api/v1/auth/register
///
/// Creates the account and sends the session back to the login page.
pub async fn handle_register(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(request): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    require_logged_out(&session)?;

    add_user(
        &state.db,
        &request.username,
        &request.password,
        state.config.bcrypt_cost,
    )
    .await?;

    let session = state
        .sessions
        .transition(session.token, NavEvent::Registered)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Account created! You can now log in.".to_string(),
            session: SessionView::from(&session),
        }),
    ))
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    require_logged_out(&session)?;

    if !verify_user(&state.db, &request.username, &request.password).await? {
        warn!("Failed login for '{}'", request.username);
        return Err(AppError::InvalidCredentials);
    }

    let session = state
        .sessions
        .transition(
            session.token,
            NavEvent::LoginSucceeded {
                username: request.username.clone(),
            },
        )
        .await?;
    info!("User '{}' logged in", request.username);

    Ok(Json(AuthResponse {
        message: "Login successful!".to_string(),
        session: SessionView::from(&session),
    }))
}

/// POST /api/v1/auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state
        .sessions
        .transition(session.token, NavEvent::Logout)
        .await?;

    Ok(Json(AuthResponse {
        message: "Logged out.".to_string(),
        session: SessionView::from(&session),
    }))
}
