//! Embedding backends: pluggable, trait-based text encoders.
//!
//! `AppState` holds one `Arc<dyn Embedder>` for the process lifetime; the
//! backend is picked at startup from `EMBEDDING_BACKEND`.
//!
//! - `SentenceEmbedder`: pretrained all-MiniLM-L6-v2 via rust-bert
//!   (cargo feature `sentence-transformer`, links libtorch).
//! - `HashingEmbedder`: pure-Rust feature hashing. Deterministic, offline,
//!   no model download; the default when the feature is off.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("model failed to load: {0}")]
    Load(String),

    #[error("model failed to encode input: {0}")]
    Encode(String),

    #[error("expected {expected} embeddings, got {actual}")]
    Count { expected: usize, actual: usize },

    #[error("embedding dimensions differ ({0} vs {1})")]
    DimensionMismatch(usize, usize),

    #[error("embedding task aborted")]
    Aborted,

    #[error("backend '{0}' is not compiled into this build")]
    Unavailable(&'static str),
}

/// Encodes a batch of texts into fixed-length vectors, one per input, in order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable backend label reported alongside every score.
    fn backend(&self) -> &'static str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    SentenceTransformer,
    Hashing,
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        if cfg!(feature = "sentence-transformer") {
            EmbeddingBackend::SentenceTransformer
        } else {
            EmbeddingBackend::Hashing
        }
    }
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sentence-transformer" | "minilm" => Ok(EmbeddingBackend::SentenceTransformer),
            "hashing" => Ok(EmbeddingBackend::Hashing),
            other => Err(format!(
                "unknown embedding backend '{other}' (expected 'sentence-transformer' or 'hashing')"
            )),
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingBackend::SentenceTransformer => f.write_str("sentence-transformer"),
            EmbeddingBackend::Hashing => f.write_str("hashing"),
        }
    }
}

/// Builds the configured backend. The sentence-transformer model itself is
/// fetched and loaded lazily on the first `embed` call.
pub fn build_embedder(backend: EmbeddingBackend) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match backend {
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::default())),
        #[cfg(feature = "sentence-transformer")]
        EmbeddingBackend::SentenceTransformer => Ok(Arc::new(sentence::SentenceEmbedder::new())),
        #[cfg(not(feature = "sentence-transformer"))]
        EmbeddingBackend::SentenceTransformer => {
            Err(EmbeddingError::Unavailable("sentence-transformer"))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HashingEmbedder
// ────────────────────────────────────────────────────────────────────────────

/// Same width as all-MiniLM-L6-v2.
pub const HASHING_DIMENSIONS: usize = 384;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Bag-of-words feature hashing: lowercase alphanumeric tokens are hashed
/// (FNV-1a) into a fixed number of buckets and the count vector is
/// L2-normalised. Text with no tokens maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimensions: HASHING_DIMENSIONS,
        }
    }
}

impl HashingEmbedder {
    pub fn encode_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(&token.to_lowercase()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn backend(&self) -> &'static str {
        "hashing"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.encode_one(t)).collect())
    }
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

// ────────────────────────────────────────────────────────────────────────────
// SentenceEmbedder: all-MiniLM-L6-v2
// ────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "sentence-transformer")]
pub mod sentence {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use rust_bert::pipelines::sentence_embeddings::{
        SentenceEmbeddingsBuilder, SentenceEmbeddingsModel, SentenceEmbeddingsModelType,
    };
    use tokio::sync::OnceCell;
    use tracing::info;

    use super::{Embedder, EmbeddingError};

    type SharedModel = Arc<Mutex<SentenceEmbeddingsModel>>;

    /// Downloads (first run only, cached on disk) and loads the model on first
    /// use. Concurrent first callers wait on the same load.
    #[derive(Default)]
    pub struct SentenceEmbedder {
        model: OnceCell<SharedModel>,
    }

    impl SentenceEmbedder {
        pub fn new() -> Self {
            Self::default()
        }

        async fn model(&self) -> Result<SharedModel, EmbeddingError> {
            self.model
                .get_or_try_init(|| async {
                    info!("Loading sentence-embedding model all-MiniLM-L6-v2...");
                    let model = tokio::task::spawn_blocking(|| {
                        SentenceEmbeddingsBuilder::remote(SentenceEmbeddingsModelType::AllMiniLmL6V2)
                            .create_model()
                    })
                    .await
                    .map_err(|_| EmbeddingError::Aborted)?
                    .map_err(|e| EmbeddingError::Load(e.to_string()))?;
                    info!("Sentence-embedding model loaded");
                    Ok(Arc::new(Mutex::new(model)))
                })
                .await
                .cloned()
        }
    }

    #[async_trait]
    impl Embedder for SentenceEmbedder {
        fn backend(&self) -> &'static str {
            "sentence-transformer"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let model = self.model().await?;
            let texts = texts.to_vec();
            tokio::task::spawn_blocking(move || {
                let model = model
                    .lock()
                    .map_err(|e| EmbeddingError::Encode(e.to_string()))?;
                model
                    .encode(&texts)
                    .map_err(|e| EmbeddingError::Encode(e.to_string()))
            })
            .await
            .map_err(|_| EmbeddingError::Aborted)?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_is_deterministic() {
        let embedder = HashingEmbedder::default();
        assert_eq!(
            embedder.encode_one("Rust developer"),
            embedder.encode_one("Rust developer")
        );
    }

    #[test]
    fn test_hashing_is_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::default();
        assert_eq!(
            embedder.encode_one("Rust, Developer!"),
            embedder.encode_one("rust developer")
        );
    }

    #[test]
    fn test_hashing_vector_is_unit_length() {
        let vector = HashingEmbedder::default().encode_one("five years of python experience");
        assert_eq!(vector.len(), HASHING_DIMENSIONS);
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_empty_text_is_zero_vector() {
        let vector = HashingEmbedder::default().encode_one("  ... ");
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a(""), FNV_OFFSET);
        assert_eq!(fnv1a("a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[tokio::test]
    async fn test_embed_preserves_order_and_count() {
        let embedder = HashingEmbedder::default();
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
    }

    #[test]
    fn test_backend_parse_and_display() {
        assert_eq!(
            "Hashing".parse::<EmbeddingBackend>().unwrap(),
            EmbeddingBackend::Hashing
        );
        assert_eq!(
            "sentence-transformer".parse::<EmbeddingBackend>().unwrap(),
            EmbeddingBackend::SentenceTransformer
        );
        assert!("tfidf".parse::<EmbeddingBackend>().is_err());
        assert_eq!(EmbeddingBackend::Hashing.to_string(), "hashing");
    }

    #[test]
    fn test_build_hashing_backend() {
        let embedder = build_embedder(EmbeddingBackend::Hashing).unwrap();
        assert_eq!(embedder.backend(), "hashing");
    }

    #[cfg(not(feature = "sentence-transformer"))]
    #[test]
    fn test_sentence_backend_unavailable_without_feature() {
        assert!(matches!(
            build_embedder(EmbeddingBackend::SentenceTransformer),
            Err(EmbeddingError::Unavailable(_))
        ));
    }
}
