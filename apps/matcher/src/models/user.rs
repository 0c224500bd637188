#![allow(dead_code)]

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A row of the `users` table. `password` holds a bcrypt hash and must never
/// leave the server, so this type is not `Serialize`.
#[derive(Clone, FromRow)]
pub struct UserRow {
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}
