//! SqlSage - Feedback & Learning Engine for NL-to-SQL Translation
//!
//! Learns over time which natural-language-to-SQL translations succeeded or
//! failed, and uses that history to:
//! - retrieve semantically similar past queries
//! - track per-keyword translation accuracy
//! - surface recurring improvement suggestions, decay-ranked
//! - inject learned context into future generation prompts
//!
//! "Learning" here is incremental statistic and index maintenance, not model
//! fitting. The append-only feedback log is the single source of truth;
//! every derived structure is a replayable cache.
//!
//! # Architecture
//!
//! - **Types**: feedback records and the derived view structures
//! - **Store**: append-only log, vector sidecar, aggregate snapshot
//! - **Index**: in-memory nearest-neighbor search over query embeddings
//! - **Learn**: the trackers and the `FeedbackLearner` service composing them
//! - **Api**: thin HTTP surface over the named operations
//!
//! # Example
//!
//! ```ignore
//! use sqlsage_core::{FeedbackLearner, FeedbackSubmission, LearnerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let learner = FeedbackLearner::open(LearnerConfig::load(None)?).await?;
//!
//!     learner.record_feedback(FeedbackSubmission {
//!         original_query: "Show me revenue data".into(),
//!         generated_sql: "SELECT SUM(amount) FROM payments".into(),
//!         was_helpful: true,
//!         user_rating: Some(5),
//!         ..Default::default()
//!     }).await?;
//!
//!     let prompt = learner
//!         .enhance_prompt("Translate the question into SQL.", "revenue this month")
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod keywords;
pub mod learn;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{EmbeddingProvider, LearnerConfig};
pub use error::{Result, SqlSageError};
pub use index::SemanticIndex;
pub use keywords::KeywordExtractor;
pub use learn::FeedbackLearner;
pub use store::{FeedbackLog, FeedbackStore, VectorStore};
pub use types::{
    AccuracyReport, FeedbackRecord, FeedbackSubmission, RecordId, SuggestionBundle,
};
