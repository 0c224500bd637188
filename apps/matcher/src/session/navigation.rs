//! Screen state machine for one browser session.
//!
//! ```text
//!   Login ──create account──▶ Register
//!     ▲  ◀──back / registered──  │
//!     │                          │
//!  logout   ◀────── login ───────┘ (from either logged-out page)
//!     │
//!   LoggedIn
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logged-out pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    #[default]
    Login,
    Register,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    LoggedOut(Page),
    LoggedIn { username: String },
}

impl Default for Screen {
    fn default() -> Self {
        Screen::LoggedOut(Page::Login)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    LoginSucceeded { username: String },
    Logout,
    CreateAccount,
    BackToLogin,
    Registered,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot {event} while logged in")]
pub struct InvalidTransition {
    pub event: &'static str,
}

impl NavEvent {
    fn label(&self) -> &'static str {
        match self {
            NavEvent::LoginSucceeded { .. } => "log in",
            NavEvent::Logout => "log out",
            NavEvent::CreateAccount => "open the registration page",
            NavEvent::BackToLogin => "open the login page",
            NavEvent::Registered => "register",
        }
    }
}

impl Screen {
    /// Applies `event`, returning the next screen. Only logout is accepted
    /// while logged in; everything else requires a logged-out session.
    pub fn apply(&self, event: NavEvent) -> Result<Screen, InvalidTransition> {
        match (self, event) {
            (_, NavEvent::Logout) => Ok(Screen::LoggedOut(Page::Login)),
            (Screen::LoggedOut(_), NavEvent::LoginSucceeded { username }) => {
                Ok(Screen::LoggedIn { username })
            }
            (Screen::LoggedOut(_), NavEvent::CreateAccount) => {
                Ok(Screen::LoggedOut(Page::Register))
            }
            (Screen::LoggedOut(_), NavEvent::BackToLogin | NavEvent::Registered) => {
                Ok(Screen::LoggedOut(Page::Login))
            }
            (Screen::LoggedIn { .. }, event) => Err(InvalidTransition {
                event: event.label(),
            }),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, Screen::LoggedIn { .. })
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Screen::LoggedIn { username } => Some(username),
            Screen::LoggedOut(_) => None,
        }
    }

    /// The last logged-out page; `Login` once logged in.
    pub fn page(&self) -> Page {
        match self {
            Screen::LoggedOut(page) => *page,
            Screen::LoggedIn { .. } => Page::Login,
        }
    }
}
