//! Configuration for the sqlsage learning engine
//!
//! All numeric knobs the learning behavior depends on (similarity threshold,
//! decay half-life, bucket width, prompt section caps) are deployment
//! configuration, not algorithmic constants. Defaults here are starting
//! points; tune them per deployment.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `SQLSAGE_*` environment variables (e.g. `SQLSAGE_RETRIEVAL__MAX_SIMILAR=5`).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// fastembed models run in-process via ONNX Runtime
    Local,

    /// HTTP embedding API
    Remote,

    /// No embedder; the engine runs keyword-only
    Disabled,
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend selection
    pub provider: EmbeddingProvider,

    /// Model name (local: fastembed model id; remote: API model id)
    pub model: String,

    /// Vector dimension; fixed for the lifetime of an index. Changing the
    /// model invalidates all stored vectors.
    pub dimensions: usize,

    /// Per-call embedding timeout in milliseconds. A suggest/enhance call
    /// that cannot obtain an embedding within this budget degrades to
    /// keyword-only guidance.
    pub timeout_ms: u64,

    /// Batch size for bulk embedding
    pub batch_size: usize,

    /// Model cache directory (local provider); defaults under the data dir
    pub cache_dir: Option<PathBuf>,

    /// Show model download progress on first use (local provider)
    pub show_download_progress: bool,

    /// API base URL (remote provider)
    pub base_url: Option<String>,

    /// Environment variable holding the API key (remote provider)
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            timeout_ms: 5_000,
            batch_size: 32,
            cache_dir: None,
            show_download_progress: false,
            base_url: None,
            api_key_env: "SQLSAGE_EMBEDDING_API_KEY".to_string(),
        }
    }
}

impl EmbeddingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(config::ConfigError::Message(
                "embedding.dimensions must be greater than zero".to_string(),
            )
            .into());
        }
        if self.model.is_empty() {
            return Err(config::ConfigError::Message(
                "embedding.model must not be empty".to_string(),
            )
            .into());
        }
        if self.batch_size == 0 {
            return Err(config::ConfigError::Message(
                "embedding.batch_size must be greater than zero".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

/// Similar-query retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Top-K similar past queries to retrieve
    pub max_similar: usize,

    /// Results below this cosine similarity are dropped, not padded
    pub min_similarity: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_similar: 3,
            min_similarity: 0.7,
        }
    }
}

/// Keyword accuracy tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Tokens shorter than this are not keywords
    pub min_token_len: usize,

    /// Keywords with fewer samples than this are never flagged
    pub min_samples: u64,

    /// Keywords with accuracy below this (and enough samples) are flagged
    pub problem_threshold: f64,

    /// Ring-buffer size for recent failure examples per keyword
    pub max_failure_examples: usize,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            min_token_len: 3,
            min_samples: 5,
            problem_threshold: 0.7,
            max_failure_examples: 5,
        }
    }
}

/// Suggestion decay-ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Half-life of the recency term, in days
    pub half_life_days: f64,

    /// Weight of raw frequency in the rank score
    pub frequency_weight: f64,

    /// Weight of the recency term in the rank score
    pub recency_weight: f64,

    /// Maximum suggestions returned per query
    pub max_suggestions: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            half_life_days: 14.0,
            frequency_weight: 1.0,
            recency_weight: 2.0,
            max_suggestions: 5,
        }
    }
}

/// Accuracy trend bucketing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Bucket width in hours (24 = daily buckets)
    pub bucket_hours: i64,

    /// Recent-accuracy window in days
    pub window_days: i64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            bucket_hours: 24,
            window_days: 7,
        }
    }
}

/// Prompt enhancement caps
///
/// Each section of the learned-context block is capped independently to
/// bound prompt length.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Maximum similar-query exemplars appended
    pub max_exemplars: usize,

    /// Maximum keyword-guidance lines appended
    pub max_guidance: usize,

    /// Maximum suggestion lines appended
    pub max_suggestions: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_exemplars: 3,
            max_guidance: 4,
            max_suggestions: 2,
        }
    }
}

/// Durability and recovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Write an aggregate snapshot every N appended records (0 = only on flush)
    pub snapshot_interval: u64,

    /// Append retry attempts before surfacing PersistenceError
    pub append_retries: usize,

    /// Exponential backoff base in milliseconds between append retries
    pub backoff_base_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 50,
            append_retries: 3,
            backoff_base_ms: 50,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Directory holding the feedback log, vector sidecar, and snapshot
    pub data_dir: PathBuf,

    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub keywords: KeywordConfig,
    pub patterns: PatternConfig,
    pub trends: TrendConfig,
    pub prompt: PromptConfig,
    pub persistence: PersistenceConfig,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            keywords: KeywordConfig::default(),
            patterns: PatternConfig::default(),
            trends: TrendConfig::default(),
            prompt: PromptConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl LearnerConfig {
    /// Load configuration: defaults, then an optional TOML file, then
    /// `SQLSAGE_*` environment overrides
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&LearnerConfig::default())?);

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("SQLSAGE").separator("__"))
            .build()?;

        let cfg: LearnerConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate the composed configuration
    pub fn validate(&self) -> Result<()> {
        self.embedding.validate()?;
        if self.trends.bucket_hours <= 0 {
            return Err(config::ConfigError::Message(
                "trends.bucket_hours must be positive".to_string(),
            )
            .into());
        }
        if !(0.0..=1.0).contains(&self.keywords.problem_threshold) {
            return Err(config::ConfigError::Message(
                "keywords.problem_threshold must be within [0, 1]".to_string(),
            )
            .into());
        }
        if self.patterns.half_life_days <= 0.0 {
            return Err(config::ConfigError::Message(
                "patterns.half_life_days must be positive".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Path of the append-only feedback log
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("feedback.jsonl")
    }

    /// Path of the vector sidecar
    pub fn vectors_path(&self) -> PathBuf {
        self.data_dir.join("vectors.bin")
    }

    /// Path of the aggregate snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("snapshot.json")
    }
}

/// Default data directory under the platform-local data dir
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sqlsage")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(LearnerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut cfg = LearnerConfig::default();
        cfg.embedding.dimensions = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_threshold_bounds() {
        let mut cfg = LearnerConfig::default();
        cfg.keywords.problem_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_paths_derive_from_data_dir() {
        let mut cfg = LearnerConfig::default();
        cfg.data_dir = PathBuf::from("/tmp/sage-test");
        assert_eq!(cfg.log_path(), PathBuf::from("/tmp/sage-test/feedback.jsonl"));
        assert_eq!(cfg.vectors_path(), PathBuf::from("/tmp/sage-test/vectors.bin"));
        assert_eq!(cfg.snapshot_path(), PathBuf::from("/tmp/sage-test/snapshot.json"));
    }

    #[test]
    fn test_load_defaults_without_file() {
        let cfg = LearnerConfig::load(None).unwrap();
        assert_eq!(cfg.retrieval.max_similar, 3);
        assert_eq!(cfg.trends.bucket_hours, 24);
    }
}
