//! Recurring improvement-suggestion mining
//!
//! Suggestion texts from failed (or begrudgingly successful) translations
//! are grouped by keyword and coalesced by normalized text, so "Include
//! date range" submitted three times counts once with frequency three.
//! Ranking combines frequency with an exponentially decayed recency term,
//! so stale advice slides down the list without ever being deleted.

use crate::config::PatternConfig;
use crate::types::{FeedbackRecord, RankedSuggestion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One coalesced suggestion under a keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionStat {
    /// Text as first submitted (display form)
    pub text: String,

    /// How many times (near-)identical text was submitted
    pub count: u64,

    /// Most recent submission
    pub last_seen: DateTime<Utc>,
}

/// Mines recurring suggestion text, grouped by keyword
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternRecognizer {
    /// keyword -> normalized suggestion text -> stat
    by_keyword: BTreeMap<String, BTreeMap<String, SuggestionStat>>,

    /// normalized suggestion text -> stat, across all keywords
    global: BTreeMap<String, SuggestionStat>,
}

impl PatternRecognizer {
    /// Fold one record's improvement suggestion in, if it has one
    pub fn ingest(&mut self, record: &FeedbackRecord) {
        let Some(text) = record.improvement_suggestion.as_deref() else {
            return;
        };
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let key = normalize(text);

        bump(&mut self.global, &key, text, record.timestamp);
        for keyword in &record.keywords {
            let per_keyword = self.by_keyword.entry(keyword.clone()).or_default();
            bump(per_keyword, &key, text, record.timestamp);
        }
    }

    /// Ranked suggestions matching any of the given keywords
    ///
    /// A suggestion attached to several of the query's keywords appears
    /// once, under the keyword where it scores highest.
    pub fn top_suggestions(
        &self,
        keywords: &BTreeSet<String>,
        limit: usize,
        now: DateTime<Utc>,
        config: &PatternConfig,
    ) -> Vec<RankedSuggestion> {
        if limit == 0 {
            return Vec::new();
        }

        // normalized text -> best-scoring candidate
        let mut best: BTreeMap<String, RankedSuggestion> = BTreeMap::new();

        for keyword in keywords {
            let Some(per_keyword) = self.by_keyword.get(keyword) else {
                continue;
            };
            for (key, stat) in per_keyword {
                let score = decayed_score(stat, now, config);
                let candidate = RankedSuggestion {
                    text: stat.text.clone(),
                    keyword: keyword.clone(),
                    frequency: stat.count,
                    last_seen: stat.last_seen,
                    score,
                };
                match best.get(key) {
                    Some(existing) if existing.score >= score => {}
                    _ => {
                        best.insert(key.clone(), candidate);
                    }
                }
            }
        }

        let mut ranked: Vec<RankedSuggestion> = best.into_values().collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.last_seen.cmp(&a.last_seen))
                .then_with(|| a.text.cmp(&b.text))
        });
        ranked.truncate(limit);
        ranked
    }

    /// Most frequently submitted suggestion texts across all keywords
    pub fn top_overall(&self, limit: usize) -> Vec<String> {
        let mut all: Vec<&SuggestionStat> = self.global.values().collect();
        all.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.last_seen.cmp(&a.last_seen))
                .then_with(|| a.text.cmp(&b.text))
        });
        all.into_iter().take(limit).map(|s| s.text.clone()).collect()
    }

    /// True when no suggestion text has been seen yet
    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }
}

fn bump(
    map: &mut BTreeMap<String, SuggestionStat>,
    key: &str,
    text: &str,
    timestamp: DateTime<Utc>,
) {
    map.entry(key.to_string())
        .and_modify(|stat| {
            stat.count += 1;
            if timestamp > stat.last_seen {
                stat.last_seen = timestamp;
            }
        })
        .or_insert_with(|| SuggestionStat {
            text: text.to_string(),
            count: 1,
            last_seen: timestamp,
        });
}

/// Coalescing key: lowercased, whitespace collapsed, trailing punctuation trimmed
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!'])
        .to_string()
}

/// frequency_weight * count + recency_weight * exp(-age / half_life)
fn decayed_score(stat: &SuggestionStat, now: DateTime<Utc>, config: &PatternConfig) -> f64 {
    let age_days = (now - stat.last_seen).num_seconds().max(0) as f64 / 86_400.0;
    let recency = (-age_days / config.half_life_days).exp();
    config.frequency_weight * stat.count as f64 + config.recency_weight * recency
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeedbackSubmission;

    fn record(keywords: &[&str], suggestion: Option<&str>, timestamp: DateTime<Utc>) -> FeedbackRecord {
        let mut record = FeedbackRecord::from_submission(
            FeedbackSubmission {
                original_query: "q".to_string(),
                generated_sql: "SELECT 1".to_string(),
                was_helpful: false,
                improvement_suggestion: suggestion.map(String::from),
                ..Default::default()
            },
            keywords.iter().map(|s| s.to_string()).collect(),
        );
        record.timestamp = timestamp;
        record
    }

    fn query_keywords(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_near_duplicates_coalesce() {
        let mut patterns = PatternRecognizer::default();
        let now = Utc::now();

        patterns.ingest(&record(&["revenue"], Some("Include date range"), now));
        patterns.ingest(&record(&["revenue"], Some("include  date range."), now));
        patterns.ingest(&record(&["revenue"], Some("INCLUDE DATE RANGE"), now));

        let top = patterns.top_suggestions(&query_keywords(&["revenue"]), 5, now, &PatternConfig::default());
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].text, "Include date range");
        assert_eq!(top[0].frequency, 3);
    }

    #[test]
    fn test_records_without_suggestions_ignored() {
        let mut patterns = PatternRecognizer::default();
        let now = Utc::now();

        patterns.ingest(&record(&["revenue"], None, now));
        patterns.ingest(&record(&["revenue"], Some("   "), now));

        assert!(patterns.is_empty());
    }

    #[test]
    fn test_frequency_outranks_single_newer_text() {
        let mut patterns = PatternRecognizer::default();
        let config = PatternConfig::default();
        let now = Utc::now();
        let earlier = now - chrono::Duration::days(1);

        for _ in 0..4 {
            patterns.ingest(&record(&["revenue"], Some("Add a GROUP BY month"), earlier));
        }
        patterns.ingest(&record(&["revenue"], Some("Use payments table"), now));

        let top = patterns.top_suggestions(&query_keywords(&["revenue"]), 5, now, &config);
        assert_eq!(top[0].text, "Add a GROUP BY month");
        assert!(top[0].score > top[1].score);
    }

    #[test]
    fn test_recency_decay_breaks_frequency_ties() {
        let mut patterns = PatternRecognizer::default();
        let config = PatternConfig::default();
        let now = Utc::now();
        let stale = now - chrono::Duration::days(90);

        patterns.ingest(&record(&["churn"], Some("Old advice"), stale));
        patterns.ingest(&record(&["churn"], Some("Fresh advice"), now));

        let top = patterns.top_suggestions(&query_keywords(&["churn"]), 5, now, &config);
        assert_eq!(top[0].text, "Fresh advice");
    }

    #[test]
    fn test_only_matching_keywords_surface() {
        let mut patterns = PatternRecognizer::default();
        let now = Utc::now();

        patterns.ingest(&record(&["revenue"], Some("Revenue advice"), now));
        patterns.ingest(&record(&["churn"], Some("Churn advice"), now));

        let top = patterns.top_suggestions(&query_keywords(&["revenue"]), 5, now, &PatternConfig::default());
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].text, "Revenue advice");
    }

    #[test]
    fn test_shared_suggestion_reported_once() {
        let mut patterns = PatternRecognizer::default();
        let now = Utc::now();

        // One record carrying two keywords files the same text under both
        patterns.ingest(&record(&["revenue", "monthly"], Some("Include date range"), now));

        let top = patterns.top_suggestions(
            &query_keywords(&["revenue", "monthly"]),
            5,
            now,
            &PatternConfig::default(),
        );
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn test_top_overall_by_frequency() {
        let mut patterns = PatternRecognizer::default();
        let now = Utc::now();

        patterns.ingest(&record(&["a"], Some("Common advice"), now));
        patterns.ingest(&record(&["b"], Some("Common advice"), now));
        patterns.ingest(&record(&["c"], Some("Rare advice"), now));

        let top = patterns.top_overall(5);
        assert_eq!(top, vec!["Common advice".to_string(), "Rare advice".to_string()]);
    }
}
