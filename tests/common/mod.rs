//! Shared test fixtures: deterministic stub embedders and config helpers

use async_trait::async_trait;
use sqlsage_core::embeddings::EmbeddingService;
use sqlsage_core::error::{Result, SqlSageError};
use sqlsage_core::{EmbeddingProvider, LearnerConfig};
use std::path::Path;

/// Dimension of the stub embedding space
pub const STUB_DIMS: usize = 8;

/// Deterministic embedder: same text, same vector, every time
pub struct StubEmbedder;

fn embed_text(text: &str) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    (0..STUB_DIMS)
        .map(|i| {
            let mut hasher = DefaultHasher::new();
            (text, i).hash(&mut hasher);
            (hasher.finish() % 2000) as f32 / 1000.0 - 1.0
        })
        .collect()
}

#[async_trait]
impl EmbeddingService for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(embed_text(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        STUB_DIMS
    }

    fn model_name(&self) -> &str {
        "stub-embedder"
    }
}

/// Embedder that always fails, for degraded-mode tests
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingService for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(SqlSageError::DependencyUnavailable(
            "stub embedder is down".to_string(),
        ))
    }

    async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Err(SqlSageError::DependencyUnavailable(
            "stub embedder is down".to_string(),
        ))
    }

    fn dimensions(&self) -> usize {
        STUB_DIMS
    }

    fn model_name(&self) -> &str {
        "stub-embedder"
    }
}

/// Engine configuration rooted in a temp directory, sized for the stub space
pub fn test_config(data_dir: &Path) -> LearnerConfig {
    let mut config = LearnerConfig::default();
    config.data_dir = data_dir.to_path_buf();
    config.embedding.provider = EmbeddingProvider::Disabled;
    config.embedding.model = "stub-embedder".to_string();
    config.embedding.dimensions = STUB_DIMS;
    config
}
