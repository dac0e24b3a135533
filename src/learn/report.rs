//! Accuracy report assembly
//!
//! A pure read over the other aggregates. Besides the mined suggestion
//! texts, the report's suggestion feed carries general hints derived from
//! failure shape: chronically low accuracy, a recent dip, too many vague
//! queries, too many overly complex ones.

use crate::config::LearnerConfig;
use crate::learn::patterns::PatternRecognizer;
use crate::learn::tracker::KeywordAccuracyTracker;
use crate::learn::trends::TrendAnalyzer;
use crate::types::{AccuracyReport, FeedbackRecord, KeywordAccuracySummary};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Queries shorter than this count as vague when they fail
const VAGUE_QUERY_CHARS: usize = 20;

/// SQL above this complexity score counts as complex when it fails
const COMPLEX_SQL_SCORE: u32 = 5;

/// Overall accuracy below this triggers the specificity hint
const LOW_OVERALL_ACCURACY: f64 = 0.8;

/// Recent-window accuracy below this triggers the recent-dip hint
const LOW_RECENT_ACCURACY: f64 = 0.7;

/// How many mined suggestions lead the report feed
const TOP_SUGGESTION_COUNT: usize = 5;

/// Shape counters over failed translations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureProfile {
    /// Failed translations seen
    pub failed: u64,

    /// Of those, queries under the vagueness length floor
    pub vague: u64,

    /// Of those, generated SQL above the complexity ceiling
    pub complex: u64,
}

impl FailureProfile {
    /// Fold one record in
    pub fn ingest(&mut self, record: &FeedbackRecord) {
        if record.was_helpful {
            return;
        }
        self.failed += 1;
        if record.original_query.chars().count() < VAGUE_QUERY_CHARS {
            self.vague += 1;
        }
        if record.sql_complexity > COMPLEX_SQL_SCORE {
            self.complex += 1;
        }
    }
}

/// Assemble the full report from current aggregate state
pub fn build_report(
    tracker: &KeywordAccuracyTracker,
    patterns: &PatternRecognizer,
    trends: &TrendAnalyzer,
    failures: &FailureProfile,
    config: &LearnerConfig,
    now: DateTime<Utc>,
) -> AccuracyReport {
    let (total_queries, successful_queries) = trends.totals();

    let overall_accuracy = if total_queries == 0 {
        None
    } else {
        Some(successful_queries as f64 / total_queries as f64)
    };

    let recent_accuracy = trends.window_accuracy(Duration::days(config.trends.window_days), now);

    let per_keyword: BTreeMap<String, KeywordAccuracySummary> = tracker
        .iter()
        .filter_map(|(keyword, stat)| {
            stat.accuracy().map(|accuracy| {
                (
                    keyword.clone(),
                    KeywordAccuracySummary {
                        accuracy,
                        total: stat.total_count,
                    },
                )
            })
        })
        .collect();

    let mut top_suggestions = patterns.top_overall(TOP_SUGGESTION_COUNT);
    top_suggestions.extend(general_hints(overall_accuracy, recent_accuracy, failures));

    AccuracyReport {
        overall_accuracy,
        recent_accuracy,
        total_queries,
        successful_queries,
        per_keyword,
        trend: trends.history(),
        top_suggestions,
    }
}

/// Hints derived from overall failure shape rather than any one suggestion
fn general_hints(
    overall_accuracy: Option<f64>,
    recent_accuracy: Option<f64>,
    failures: &FailureProfile,
) -> Vec<String> {
    let mut hints = Vec::new();

    if overall_accuracy.is_some_and(|a| a < LOW_OVERALL_ACCURACY) {
        hints.push("Consider providing more specific details in your queries".to_string());
    }
    if recent_accuracy.is_some_and(|a| a < LOW_RECENT_ACCURACY) {
        hints.push("Recent queries show lower accuracy; try being more explicit".to_string());
    }
    if failures.failed > 0 {
        if failures.vague * 10 > failures.failed * 3 {
            hints.push(
                "Short or vague queries often fail; spell out tables, metrics and time ranges"
                    .to_string(),
            );
        }
        if failures.complex * 10 > failures.failed * 4 {
            hints.push(
                "Complex queries may need to be broken down into simpler parts".to_string(),
            );
        }
    }

    hints
}
