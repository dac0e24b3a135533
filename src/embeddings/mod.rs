//! Embedding generation services for semantic similarity search
//!
//! Provides both local (fastembed) and remote (HTTP API) embedding backends
//! behind a common trait. The embedder is an external model the engine
//! invokes; it is never trained here, and its unavailability is a degraded
//! mode, not a failure.

pub mod local;
pub mod remote;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub use local::LocalEmbeddingService;
pub use remote::RemoteEmbeddingService;

/// Embedding service trait defining required operations
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batched)
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimensionality
    fn dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Build the configured embedding backend
///
/// Returns `None` when the provider is disabled; the engine then runs
/// keyword-only.
pub async fn build_service(config: &EmbeddingConfig) -> Result<Option<Arc<dyn EmbeddingService>>> {
    match config.provider {
        EmbeddingProvider::Disabled => {
            info!("Embedding provider disabled; running keyword-only");
            Ok(None)
        }
        EmbeddingProvider::Local => {
            let service = LocalEmbeddingService::new(config.clone()).await?;
            Ok(Some(Arc::new(service)))
        }
        EmbeddingProvider::Remote => {
            let service = RemoteEmbeddingService::from_config(config)?;
            Ok(Some(Arc::new(service)))
        }
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let vec1 = vec![1.0, 0.0, 0.0];
        let vec2 = vec![1.0, 0.0, 0.0];
        let vec3 = vec![0.0, 1.0, 0.0];

        // Same vectors
        assert!((cosine_similarity(&vec1, &vec2) - 1.0).abs() < 0.01);

        // Orthogonal vectors
        assert!((cosine_similarity(&vec1, &vec3) - 0.0).abs() < 0.01);
    }

    #[test]
    fn test_cosine_similarity_opposite_vectors() {
        let vec1 = vec![1.0, 2.0, 3.0];
        let vec2 = vec![-1.0, -2.0, -3.0];

        assert!((cosine_similarity(&vec1, &vec2) + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_cosine_similarity_different_lengths() {
        let vec1 = vec![1.0, 2.0, 3.0];
        let vec2 = vec![1.0, 2.0];

        assert_eq!(cosine_similarity(&vec1, &vec2), 0.0);
    }

    #[test]
    fn test_cosine_similarity_zero_vectors() {
        let vec1 = vec![0.0, 0.0, 0.0];
        let vec2 = vec![1.0, 2.0, 3.0];

        assert_eq!(cosine_similarity(&vec1, &vec2), 0.0);
    }

    #[tokio::test]
    async fn test_disabled_provider_builds_none() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Disabled,
            ..Default::default()
        };
        let service = build_service(&config).await.unwrap();
        assert!(service.is_none());
    }
}
