//! Axum extractors that turn `Authorization: Bearer <token>` into an explicit
//! session context for the handler.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::session::store::Session;
use crate::state::AppState;

/// Any open session, logged in or not.
pub struct CurrentSession(pub Session);

/// A session on the logged-in screen.
pub struct LoggedInUser {
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        let session = state
            .sessions
            .get(token)
            .await
            .ok_or(AppError::Unauthorized)?;
        Ok(CurrentSession(session))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for LoggedInUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;
        let username = session
            .screen
            .username()
            .map(String::from)
            .ok_or(AppError::Unauthorized)?;
        Ok(LoggedInUser { username })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim()
        .parse()
        .ok()
}
