//! Credential store: the `users` table.
//!
//! Passwords are bcrypt-hashed (salt embedded in the hash) and usernames are
//! the primary key. bcrypt is CPU-bound, so hashing and verification run on the
//! blocking pool.

use anyhow::Context;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::user::UserRow;

/// Registers a new user. Fails with `Conflict` if the username is taken.
pub async fn add_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    bcrypt_cost: u32,
) -> Result<(), AppError> {
    if username.trim().is_empty() {
        return Err(AppError::Validation("username cannot be empty".to_string()));
    }
    if password.is_empty() {
        return Err(AppError::Validation("password cannot be empty".to_string()));
    }

    let hashed = hash_password(password.to_string(), bcrypt_cost).await?;

    let result = sqlx::query("INSERT INTO users (username, password, created_at) VALUES (?, ?, ?)")
        .bind(username)
        .bind(&hashed)
        .bind(Utc::now())
        .execute(pool)
        .await;

    match result {
        Ok(_) => {
            info!("Registered user '{username}'");
            Ok(())
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
            format!("Username '{username}' is already taken"),
        )),
        Err(e) => Err(AppError::Database(e)),
    }
}

/// Returns true iff `username` exists and `password` matches its stored hash.
pub async fn verify_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<bool, AppError> {
    let Some(user) = find_user(pool, username).await? else {
        debug!("Login attempt for unknown user '{username}'");
        return Ok(false);
    };

    let password = password.to_string();
    let hashed = user.password;
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed))
        .await
        .context("bcrypt verify task failed")?
        .context("Stored password hash is malformed")?;

    Ok(verified)
}

pub async fn find_user(pool: &SqlitePool, username: &str) -> Result<Option<UserRow>, AppError> {
    let user = sqlx::query_as::<_, UserRow>(
        "SELECT username, password, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("bcrypt hash task failed")?
        .context("Failed to hash password")?;
    Ok(hashed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, memory_pool};

    const COST: u32 = 4;

    #[tokio::test]
    async fn test_added_user_verifies() {
        let pool = memory_pool().await;
        add_user(&pool, "alice", "pw123", COST).await.unwrap();
        assert!(verify_user(&pool, "alice", "pw123").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_pair_does_not_verify() {
        let pool = memory_pool().await;
        assert!(!verify_user(&pool, "nobody", "pw123").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_password_does_not_verify() {
        let pool = memory_pool().await;
        add_user(&pool, "alice", "pw123", COST).await.unwrap();
        assert!(!verify_user(&pool, "alice", "wrongpw").await.unwrap());
    }

    #[tokio::test]
    async fn test_username_match_is_exact() {
        let pool = memory_pool().await;
        add_user(&pool, "alice", "pw123", COST).await.unwrap();
        assert!(!verify_user(&pool, "Alice", "pw123").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let pool = memory_pool().await;
        add_user(&pool, "alice", "pw123", COST).await.unwrap();
        let err = add_user(&pool, "alice", "other", COST).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        // The first record is untouched.
        assert!(verify_user(&pool, "alice", "pw123").await.unwrap());
    }

    #[tokio::test]
    async fn test_password_is_stored_hashed() {
        let pool = memory_pool().await;
        add_user(&pool, "alice", "pw123", COST).await.unwrap();
        let row = find_user(&pool, "alice").await.unwrap().unwrap();
        assert_ne!(row.password, "pw123");
        assert!(row.password.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_empty_username_rejected() {
        let pool = memory_pool().await;
        let err = add_user(&pool, "   ", "pw123", COST).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_password_rejected() {
        let pool = memory_pool().await;
        let err = add_user(&pool, "alice", "", COST).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_users_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("users.db").display());

        let pool = create_pool(&url).await.unwrap();
        add_user(&pool, "alice", "pw123", COST).await.unwrap();
        pool.close().await;

        let reopened = create_pool(&url).await.unwrap();
        assert!(verify_user(&reopened, "alice", "pw123").await.unwrap());
    }
}
