use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::matching::embedding::EmbeddingBackend;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    pub embedding_backend: EmbeddingBackend,
    pub bcrypt_cost: u32,
    pub max_upload_bytes: usize,
    /// Cap on decompressed DOCX XML per upload.
    pub max_extracted_bytes: u64,
    /// Cap on concurrently open logged-out sessions; the oldest is evicted.
    pub max_logged_out_sessions: usize,
}

/// Default `MAX_EXTRACTED_BYTES` as a multiple of `MAX_UPLOAD_BYTES`.
const EXTRACTED_BYTES_PER_UPLOAD_BYTE: u64 = 8;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let bcrypt_cost = parse_env("BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31, got {bcrypt_cost}");
        }

        let max_upload_bytes: usize = parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;
        let max_extracted_bytes = parse_env(
            "MAX_EXTRACTED_BYTES",
            (max_upload_bytes as u64).saturating_mul(EXTRACTED_BYTES_PER_UPLOAD_BYTE),
        )?;

        let max_logged_out_sessions: usize = parse_env("MAX_SESSIONS", 10_000)?;
        if max_logged_out_sessions == 0 {
            bail!("MAX_SESSIONS must be at least 1");
        }

        Ok(Config {
            database_url: env_or("DATABASE_URL", "sqlite://users.db"),
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
            embedding_backend: parse_env("EMBEDDING_BACKEND", EmbeddingBackend::default())?,
            bcrypt_cost,
            max_upload_bytes,
            max_extracted_bytes,
            max_logged_out_sessions,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
