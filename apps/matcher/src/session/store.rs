use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::session::navigation::{NavEvent, Page, Screen};

/// One browser session. Lives until process restart or, while logged out,
/// until evicted by newer sessions; logout resets the screen but keeps the
/// token valid.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: Uuid,
    pub screen: Screen,
    pub created_at: DateTime<Utc>,
}

/// What the client sees of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub token: Uuid,
    pub logged_in: bool,
    pub username: Option<String>,
    pub page: Page,
    pub opened_at: DateTime<Utc>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        SessionView {
            token: session.token,
            logged_in: session.screen.is_logged_in(),
            username: session.screen.username().map(String::from),
            page: session.screen.page(),
            opened_at: session.created_at,
        }
    }
}

/// In-process session registry, shared through `AppState`.
///
/// At most `max_logged_out` sessions sit on the logged-out screens at once;
/// opening one more evicts the oldest of them. Logged-in sessions are never
/// evicted.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Registry>>,
    max_logged_out: usize,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<Uuid, Session>,
    /// Open order, oldest first.
    opened: VecDeque<Uuid>,
}

impl SessionStore {
    pub fn new(max_logged_out: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Registry::default())),
            max_logged_out: max_logged_out.max(1),
        }
    }

    /// Opens a fresh logged-out session on the login page.
    pub async fn open(&self) -> Session {
        let session = Session {
            token: Uuid::new_v4(),
            screen: Screen::default(),
            created_at: Utc::now(),
        };

        let mut registry = self.inner.write().await;
        while registry.logged_out_count() >= self.max_logged_out {
            let Some(evicted) = registry.evict_oldest_logged_out() else {
                break;
            };
            debug!("Evicted idle session {evicted}");
        }
        registry.sessions.insert(session.token, session.clone());
        registry.opened.push_back(session.token);
        debug!("Opened session (total: {})", registry.sessions.len());
        session
    }

    pub async fn get(&self, token: Uuid) -> Option<Session> {
        self.inner.read().await.sessions.get(&token).cloned()
    }

    /// Applies a navigation event atomically and returns the updated session.
    pub async fn transition(&self, token: Uuid, event: NavEvent) -> Result<Session, AppError> {
        let mut registry = self.inner.write().await;
        let session = registry
            .sessions
            .get_mut(&token)
            .ok_or(AppError::Unauthorized)?;
        session.screen = session
            .screen
            .apply(event)
            .map_err(|e| AppError::Conflict(e.to_string()))?;
        Ok(session.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

impl Registry {
    fn logged_out_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| !s.screen.is_logged_in())
            .count()
    }

    /// Removes the oldest logged-out session. Logged-in tokens met on the way
    /// keep their place in the queue.
    fn evict_oldest_logged_out(&mut self) -> Option<Uuid> {
        let position = self.opened.iter().position(|token| {
            self.sessions
                .get(token)
                .is_some_and(|s| !s.screen.is_logged_in())
        })?;
        let token = self.opened.remove(position)?;
        self.sessions.remove(&token);
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_starts_logged_out() {
        let store = SessionStore::new(16);
        let session = store.open().await;
        let view = SessionView::from(&session);
        assert!(!view.logged_in);
        assert_eq!(view.page, Page::Login);
        assert!(view.username.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_transition_persists() {
        let store = SessionStore::new(16);
        let token = store.open().await.token;

        store
            .transition(
                token,
                NavEvent::LoginSucceeded {
                    username: "alice".to_string(),
                },
            )
            .await
            .unwrap();

        let session = store.get(token).await.unwrap();
        assert_eq!(session.screen.username(), Some("alice"));
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let store = SessionStore::new(16);
        let err = store
            .transition(Uuid::new_v4(), NavEvent::Logout)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn test_invalid_transition_is_conflict_and_leaves_state() {
        let store = SessionStore::new(16);
        let token = store.open().await.token;
        let login = NavEvent::LoginSucceeded {
            username: "alice".to_string(),
        };
        store.transition(token, login).await.unwrap();

        let err = store.transition(token, NavEvent::CreateAccount).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store.get(token).await.unwrap().screen.is_logged_in());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = SessionStore::new(16);
        let a = store.open().await.token;
        let b = store.open().await.token;
        store.transition(a, NavEvent::CreateAccount).await.unwrap();

        assert_eq!(store.get(a).await.unwrap().screen.page(), Page::Register);
        assert_eq!(store.get(b).await.unwrap().screen.page(), Page::Login);
    }

    #[tokio::test]
    async fn test_open_evicts_oldest_logged_out_session() {
        let store = SessionStore::new(2);
        let first = store.open().await.token;
        let second = store.open().await.token;
        let third = store.open().await.token;

        assert!(store.get(first).await.is_none());
        assert!(store.get(second).await.is_some());
        assert!(store.get(third).await.is_some());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_logged_in_sessions_are_never_evicted() {
        let store = SessionStore::new(1);
        let alice = store.open().await.token;
        store
            .transition(
                alice,
                NavEvent::LoginSucceeded {
                    username: "alice".to_string(),
                },
            )
            .await
            .unwrap();

        let idle = store.open().await.token;
        let newer = store.open().await.token;

        assert!(store.get(alice).await.unwrap().screen.is_logged_in());
        assert!(store.get(idle).await.is_none());
        assert!(store.get(newer).await.is_some());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_logged_out_again_counts_toward_cap() {
        let store = SessionStore::new(1);
        let alice = store.open().await.token;
        let login = NavEvent::LoginSucceeded {
            username: "alice".to_string(),
        };
        store.transition(alice, login).await.unwrap();
        store.transition(alice, NavEvent::Logout).await.unwrap();

        let next = store.open().await.token;
        assert!(store.get(alice).await.is_none());
        assert!(store.get(next).await.is_some());
    }
}
