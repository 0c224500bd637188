//! Similarity Scorer: cosine similarity between two embedded texts, as a
//! percentage in [0, 100] rounded to 2 decimals.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::matching::embedding::{Embedder, EmbeddingError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult {
    pub score: f64,
}

/// Holds the process-wide embedder. Cheap to clone.
#[derive(Clone)]
pub struct SimilarityScorer {
    embedder: Arc<dyn Embedder>,
}

impl SimilarityScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn backend(&self) -> &'static str {
        self.embedder.backend()
    }

    /// Embeds both texts in one batch and scores them.
    pub async fn compute_similarity(
        &self,
        text_a: &str,
        text_b: &str,
    ) -> Result<MatchResult, EmbeddingError> {
        let embeddings = self
            .embedder
            .embed(&[text_a.to_string(), text_b.to_string()])
            .await?;

        let [a, b] = embeddings.as_slice() else {
            return Err(EmbeddingError::Count {
                expected: 2,
                actual: embeddings.len(),
            });
        };

        let cosine = cosine_similarity(a, b)?;
        let score = to_percentage(cosine);
        debug!(
            "Similarity via {}: cosine={cosine:.6} score={score}",
            self.backend()
        );
        Ok(MatchResult { score })
    }
}

/// Cosine of the angle between `a` and `b`. A zero vector scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch(a.len(), b.len()));
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0_f64, 0.0_f64, 0.0_f64), |acc, (x, y)| {
        let (x, y) = (f64::from(*x), f64::from(*y));
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Scales a cosine to a percentage, clamped to [0, 100], 2 decimals.
pub fn to_percentage(cosine: f64) -> f64 {
    let percent = (cosine * 100.0).clamp(0.0, 100.0);
    (percent * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::embedding::HashingEmbedder;
    use async_trait::async_trait;

    fn scorer() -> SimilarityScorer {
        SimilarityScorer::new(Arc::new(HashingEmbedder::default()))
    }

    fn has_at_most_two_decimals(x: f64) -> bool {
        ((x * 100.0).round() - x * 100.0).abs() < 1e-9
    }

    #[tokio::test]
    async fn test_identical_text_scores_100() {
        let result = scorer()
            .compute_similarity("Senior Rust engineer", "Senior Rust engineer")
            .await
            .unwrap();
        assert_eq!(result.score, 100.0);
    }

    #[tokio::test]
    async fn test_score_is_symmetric() {
        let a = "Python developer with 5 years experience";
        let b = "Looking for a Python developer";
        let ab = scorer().compute_similarity(a, b).await.unwrap();
        let ba = scorer().compute_similarity(b, a).await.unwrap();
        assert_eq!(ab, ba);
    }

    #[tokio::test]
    async fn test_related_text_beats_unrelated_text() {
        let resume = "Python developer with 5 years experience";
        let related = scorer()
            .compute_similarity(resume, "Looking for a Python developer")
            .await
            .unwrap();
        let unrelated = scorer()
            .compute_similarity(resume, "Pastry chef wanted for busy bakery")
            .await
            .unwrap();
        assert!(related.score > unrelated.score);
        assert!(related.score > 0.0 && related.score < 100.0);
    }

    #[tokio::test]
    async fn test_score_bounded_and_two_decimals() {
        for (a, b) in [
            ("rust tokio axum", "rust"),
            ("one two three", "three four five six"),
            ("", "anything"),
        ] {
            let score = scorer().compute_similarity(a, b).await.unwrap().score;
            assert!((0.0..=100.0).contains(&score), "{score}");
            assert!(has_at_most_two_decimals(score), "{score}");
        }
    }

    #[tokio::test]
    async fn test_empty_text_scores_zero() {
        let result = scorer().compute_similarity("", "Rust").await.unwrap();
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_cosine_orthogonal_and_parallel() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
        let parallel = cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]).unwrap();
        assert!((parallel - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_dimension_mismatch() {
        assert!(matches!(
            cosine_similarity(&[1.0], &[1.0, 2.0]),
            Err(EmbeddingError::DimensionMismatch(1, 2))
        ));
    }

    #[test]
    fn test_percentage_clamps_negative_and_rounds() {
        assert_eq!(to_percentage(-0.5), 0.0);
        assert_eq!(to_percentage(1.0000001), 100.0);
        assert_eq!(to_percentage(0.123456), 12.35);
        assert_eq!(to_percentage(0.99999994), 100.0);
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn backend(&self) -> &'static str {
            "short"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(vec![vec![1.0]])
        }
    }

    #[tokio::test]
    async fn test_wrong_embedding_count_is_error() {
        let scorer = SimilarityScorer::new(Arc::new(ShortEmbedder));
        let err = scorer.compute_similarity("a", "b").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::Count {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[cfg(feature = "sentence-transformer")]
    #[tokio::test]
    #[ignore = "downloads all-MiniLM-L6-v2"]
    async fn test_minilm_scores_python_developer_pair_high() {
        use crate::matching::embedding::sentence::SentenceEmbedder;

        let scorer = SimilarityScorer::new(Arc::new(SentenceEmbedder::new()));
        let result = scorer
            .compute_similarity(
                "Python developer with 5 years experience",
                "Looking for a Python developer",
            )
            .await
            .unwrap();
        assert!(result.score > 60.0, "{}", result.score);

        let same = scorer
            .compute_similarity("Rust engineer", "Rust engineer")
            .await
            .unwrap();
        assert_eq!(same.score, 100.0);
    }
}
