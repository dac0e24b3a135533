//! Core data types for the sqlsage learning engine
//!
//! This module defines the fundamental data structures used throughout
//! sqlsage: feedback records (the single write-once entity), the validated
//! submission boundary, and the derived views returned by the suggestion
//! and reporting paths.

use crate::error::{Result, SqlSageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Unique identifier for feedback records
///
/// Wraps a UUID to provide type safety and prevent mixing record IDs with
/// other UUID-based identifiers in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Create a new random record ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a record ID from a string
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incoming feedback payload, validated at the boundary before any mutation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    /// The natural-language query the user asked
    pub original_query: String,

    /// The SQL the generation step produced for it
    pub generated_sql: String,

    /// Whether the user judged the result helpful
    pub was_helpful: bool,

    /// Optional star rating, 1-5 inclusive
    pub user_rating: Option<u8>,

    /// Optional free-text suggestion on how to do better
    pub improvement_suggestion: Option<String>,

    /// Chart type the result was rendered as, if any
    pub chart_type: Option<String>,

    /// Wall-clock execution time of the SQL, in seconds
    pub execution_time: Option<f64>,

    /// Number of rows the SQL returned
    pub result_count: Option<u64>,
}

impl FeedbackSubmission {
    /// Validate the submission
    ///
    /// Rejects empty query/SQL text, out-of-range ratings, and negative or
    /// non-finite execution times. Nothing is stored when validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.original_query.trim().is_empty() {
            return Err(SqlSageError::Validation(
                "original_query must not be empty".to_string(),
            ));
        }
        if self.generated_sql.trim().is_empty() {
            return Err(SqlSageError::Validation(
                "generated_sql must not be empty".to_string(),
            ));
        }
        if let Some(rating) = self.user_rating {
            if !(1..=5).contains(&rating) {
                return Err(SqlSageError::Validation(format!(
                    "user_rating must be between 1 and 5, got {}",
                    rating
                )));
            }
        }
        if let Some(secs) = self.execution_time {
            if !secs.is_finite() || secs < 0.0 {
                return Err(SqlSageError::Validation(format!(
                    "execution_time must be a non-negative number of seconds, got {}",
                    secs
                )));
            }
        }
        Ok(())
    }
}

/// One human judgment of a generated query/SQL pair
///
/// Immutable once appended to the log. All derived state (keyword stats,
/// suggestion ranks, trend buckets, the semantic index) is recomputable by
/// replaying these records in timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Unique identifier
    pub id: RecordId,

    /// Append timestamp; non-decreasing across the log
    pub timestamp: DateTime<Utc>,

    /// The natural-language query as asked
    pub original_query: String,

    /// The SQL generated for it
    pub generated_sql: String,

    /// Normalized keywords extracted from the query, stored denormalized
    pub keywords: BTreeSet<String>,

    /// Whether the user judged the result helpful
    pub was_helpful: bool,

    /// Optional star rating, 1-5
    pub user_rating: Option<u8>,

    /// Optional free-text improvement suggestion
    pub improvement_suggestion: Option<String>,

    /// Chart type the result was rendered as, if any
    pub chart_type: Option<String>,

    /// SQL execution time in seconds, if measured
    pub execution_time: Option<f64>,

    /// Row count of the result, if known
    pub result_count: Option<u64>,

    /// Weighted clause count of the generated SQL
    pub sql_complexity: u32,
}

impl FeedbackRecord {
    /// Build a record from a validated submission
    ///
    /// The caller supplies the extracted keyword set; id and derived fields
    /// are filled in here. The timestamp is clamped against the log tail by
    /// the store at append time.
    pub fn from_submission(submission: FeedbackSubmission, keywords: BTreeSet<String>) -> Self {
        let sql_complexity = sql_complexity(&submission.generated_sql);
        Self {
            id: RecordId::new(),
            timestamp: Utc::now(),
            original_query: submission.original_query,
            generated_sql: submission.generated_sql,
            keywords,
            was_helpful: submission.was_helpful,
            user_rating: submission.user_rating,
            improvement_suggestion: submission.improvement_suggestion,
            chart_type: submission.chart_type,
            execution_time: submission.execution_time,
            result_count: submission.result_count,
            sql_complexity,
        }
    }
}

/// Weighted clause count used as a rough SQL complexity score
///
/// JOIN, GROUP BY, HAVING and CASE weigh 2, WHERE and ORDER BY weigh 1,
/// UNION weighs 3.
pub fn sql_complexity(sql: &str) -> u32 {
    let upper = sql.to_uppercase();
    let count = |needle: &str| upper.matches(needle).count() as u32;

    count("JOIN") * 2
        + count("WHERE")
        + count("GROUP BY") * 2
        + count("ORDER BY")
        + count("HAVING") * 2
        + count("UNION") * 3
        + count("CASE") * 2
}

/// A past query surfaced as semantically similar to the incoming one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarQuery {
    /// Record the exemplar came from
    pub record_id: RecordId,

    /// The past natural-language query
    pub query: String,

    /// The SQL that was generated for it
    pub sql: String,

    /// Whether that translation was judged helpful
    pub was_helpful: bool,

    /// Cosine similarity to the incoming query, in [-1, 1]
    pub similarity: f32,
}

/// Accuracy-derived guidance for one keyword present in the query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordGuidance {
    /// Historical accuracy for the keyword
    pub accuracy: f64,

    /// Number of samples backing the accuracy figure
    pub samples: u64,

    /// Human-readable note for the generation prompt
    pub note: String,
}

/// A ranked improvement suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedSuggestion {
    /// The suggestion text as first submitted
    pub text: String,

    /// Keyword the suggestion is associated with
    pub keyword: String,

    /// How many times (near-)identical text was submitted for this keyword
    pub frequency: u64,

    /// Most recent submission time
    pub last_seen: DateTime<Utc>,

    /// Decay-weighted rank score at query time
    pub score: f64,
}

/// Everything the suggestion engine knows about an incoming query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionBundle {
    /// Semantically similar past queries, descending similarity
    pub similar: Vec<SimilarQuery>,

    /// Guidance for flagged keywords present in the query
    pub keyword_guidance: BTreeMap<String, KeywordGuidance>,

    /// Decay-ranked improvement suggestions matching the query's keywords
    pub suggestions: Vec<RankedSuggestion>,
}

impl SuggestionBundle {
    /// True when there is nothing to say about the query
    pub fn is_empty(&self) -> bool {
        self.similar.is_empty() && self.keyword_guidance.is_empty() && self.suggestions.is_empty()
    }
}

/// Per-keyword accuracy line in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordAccuracySummary {
    /// successful / total
    pub accuracy: f64,

    /// Total judged translations containing the keyword
    pub total: u64,
}

/// Overall accuracy report assembled from current learned state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// Lifetime accuracy; None until the first feedback arrives
    pub overall_accuracy: Option<f64>,

    /// Accuracy over the configured recent window; None when the window is empty
    pub recent_accuracy: Option<f64>,

    /// Total feedback records
    pub total_queries: u64,

    /// Records judged helpful
    pub successful_queries: u64,

    /// Accuracy broken down by keyword
    pub per_keyword: BTreeMap<String, KeywordAccuracySummary>,

    /// Time-bucketed accuracy history, ascending by period start
    pub trend: Vec<crate::learn::trends::AccuracyBucket>,

    /// Most frequent improvement suggestions, plus general hints when the
    /// learned state warrants them
    pub top_suggestions: Vec<String>,
}
