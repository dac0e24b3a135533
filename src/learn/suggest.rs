//! Suggestion composition helpers
//!
//! Pure functions over the aggregates; the learner wires them together with
//! live retrieval in `FeedbackLearner::suggest`.

use crate::config::KeywordConfig;
use crate::learn::tracker::KeywordAccuracyTracker;
use crate::types::{KeywordGuidance, RecordId, SimilarQuery};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What the learner remembers about a past query beyond its aggregates
///
/// Kept in memory for exemplar rendering and the keyword-overlap fallback;
/// rebuilt from the log on startup.
#[derive(Debug, Clone)]
pub struct Exemplar {
    pub query: String,
    pub sql: String,
    pub was_helpful: bool,
    pub keywords: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
}

/// Guidance lines for flagged keywords present in the query
///
/// Only keywords past the sample floor and below the accuracy threshold get
/// a line; healthy or barely-seen keywords stay silent.
pub fn keyword_guidance(
    tracker: &KeywordAccuracyTracker,
    query_keywords: &BTreeSet<String>,
    config: &KeywordConfig,
) -> BTreeMap<String, KeywordGuidance> {
    let flagged = tracker.problematic_keywords(config.min_samples, config.problem_threshold);

    query_keywords
        .iter()
        .filter(|keyword| flagged.contains(*keyword))
        .filter_map(|keyword| {
            let stat = tracker.stat(keyword)?;
            let accuracy = stat.accuracy()?;
            let note = format!(
                "'{}' queries often need more specific context ({:.0}% helpful over {} queries)",
                keyword,
                accuracy * 100.0,
                stat.total_count
            );
            Some((
                keyword.clone(),
                KeywordGuidance {
                    accuracy,
                    samples: stat.total_count,
                    note,
                },
            ))
        })
        .collect()
}

/// Keyword-overlap fallback for similar queries
///
/// Used when no embedding could be obtained. Ranks past *successful*
/// queries by Jaccard overlap of keyword sets; zero overlap contributes
/// nothing, ties go to the more recent query.
pub fn similar_by_overlap(
    exemplars: &HashMap<RecordId, Exemplar>,
    query_keywords: &BTreeSet<String>,
    limit: usize,
) -> Vec<SimilarQuery> {
    if limit == 0 || query_keywords.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f32, DateTime<Utc>, RecordId, &Exemplar)> = exemplars
        .iter()
        .filter(|(_, exemplar)| exemplar.was_helpful)
        .filter_map(|(&id, exemplar)| {
            let overlap = query_keywords.intersection(&exemplar.keywords).count();
            if overlap == 0 {
                return None;
            }
            let union = query_keywords.union(&exemplar.keywords).count();
            let jaccard = overlap as f32 / union as f32;
            Some((jaccard, exemplar.timestamp, id, exemplar))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.2.cmp(&b.2))
    });
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(similarity, _, record_id, exemplar)| SimilarQuery {
            record_id,
            query: exemplar.query.clone(),
            sql: exemplar.sql.clone(),
            was_helpful: exemplar.was_helpful,
            similarity,
        })
        .collect()
}
