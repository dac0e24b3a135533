//! Per-keyword translation accuracy tracking
//!
//! Incremental counters derived entirely from feedback history; replaying
//! the log from scratch reproduces this state exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Accuracy counters for one keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordStat {
    /// Judged translations whose query contained the keyword
    pub total_count: u64,

    /// Of those, how many were judged helpful
    pub successful_count: u64,

    /// Timestamp of the most recent judgment
    pub last_seen: DateTime<Utc>,

    /// Ring buffer of recent failed query texts for this keyword
    pub recent_failures: VecDeque<String>,
}

impl KeywordStat {
    /// successful / total; None with no samples
    pub fn accuracy(&self) -> Option<f64> {
        if self.total_count == 0 {
            None
        } else {
            Some(self.successful_count as f64 / self.total_count as f64)
        }
    }
}

/// Incremental per-keyword success/failure counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordAccuracyTracker {
    stats: BTreeMap<String, KeywordStat>,
}

impl KeywordAccuracyTracker {
    /// Fold one judgment into the counters for every keyword it carries
    ///
    /// On failure the query text is kept as an example, bounded by
    /// `max_failure_examples` per keyword (oldest evicted first).
    pub fn update(
        &mut self,
        keywords: &BTreeSet<String>,
        was_helpful: bool,
        query: &str,
        timestamp: DateTime<Utc>,
        max_failure_examples: usize,
    ) {
        for keyword in keywords {
            let stat = self
                .stats
                .entry(keyword.clone())
                .or_insert_with(|| KeywordStat {
                    total_count: 0,
                    successful_count: 0,
                    last_seen: timestamp,
                    recent_failures: VecDeque::new(),
                });

            stat.total_count += 1;
            if was_helpful {
                stat.successful_count += 1;
            } else {
                stat.recent_failures.push_back(query.to_string());
                while stat.recent_failures.len() > max_failure_examples {
                    stat.recent_failures.pop_front();
                }
            }
            stat.last_seen = timestamp;
        }
    }

    /// Accuracy for a keyword; None when it has never been seen
    pub fn accuracy(&self, keyword: &str) -> Option<f64> {
        self.stats.get(keyword).and_then(KeywordStat::accuracy)
    }

    /// Counters for a keyword
    pub fn stat(&self, keyword: &str) -> Option<&KeywordStat> {
        self.stats.get(keyword)
    }

    /// Keywords with enough samples and accuracy below the threshold
    ///
    /// Keywords under the sample floor are never flagged, regardless of how
    /// badly they are doing; a couple of failures is noise, not signal.
    pub fn problematic_keywords(&self, min_samples: u64, threshold: f64) -> BTreeSet<String> {
        self.stats
            .iter()
            .filter(|(_, stat)| stat.total_count >= min_samples)
            .filter(|(_, stat)| stat.accuracy().is_some_and(|a| a < threshold))
            .map(|(keyword, _)| keyword.clone())
            .collect()
    }

    /// All keywords with their counters, sorted by keyword
    pub fn iter(&self) -> impl Iterator<Item = (&String, &KeywordStat)> {
        self.stats.iter()
    }

    /// Number of distinct keywords seen
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// True when no feedback has been folded in yet
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_accuracy_is_ratio() {
        let mut tracker = KeywordAccuracyTracker::default();
        let kw = keywords(&["revenue"]);
        let now = Utc::now();

        tracker.update(&kw, true, "q1", now, 5);
        tracker.update(&kw, true, "q2", now, 5);
        tracker.update(&kw, false, "q3", now, 5);

        assert_eq!(tracker.accuracy("revenue"), Some(2.0 / 3.0));
    }

    #[test]
    fn test_unseen_keyword_is_none() {
        let tracker = KeywordAccuracyTracker::default();
        assert_eq!(tracker.accuracy("revenue"), None);
    }

    #[test]
    fn test_sample_floor_gates_flagging() {
        let mut tracker = KeywordAccuracyTracker::default();
        let kw = keywords(&["churn"]);
        let now = Utc::now();

        // Three straight failures: still under the floor of five
        for _ in 0..3 {
            tracker.update(&kw, false, "churn query", now, 5);
        }
        assert!(tracker.problematic_keywords(5, 0.7).is_empty());

        // Two more and it crosses the floor
        for _ in 0..2 {
            tracker.update(&kw, false, "churn query", now, 5);
        }
        assert_eq!(tracker.problematic_keywords(5, 0.7), keywords(&["churn"]));
    }

    #[test]
    fn test_accurate_keyword_not_flagged() {
        let mut tracker = KeywordAccuracyTracker::default();
        let kw = keywords(&["revenue"]);
        let now = Utc::now();

        for _ in 0..10 {
            tracker.update(&kw, true, "q", now, 5);
        }
        assert!(tracker.problematic_keywords(5, 0.7).is_empty());
    }

    #[test]
    fn test_failure_ring_is_bounded() {
        let mut tracker = KeywordAccuracyTracker::default();
        let kw = keywords(&["payment"]);
        let now = Utc::now();

        for i in 0..8 {
            tracker.update(&kw, false, &format!("q{}", i), now, 3);
        }

        let stat = tracker.stat("payment").unwrap();
        assert_eq!(stat.recent_failures.len(), 3);
        // Oldest evicted first
        assert_eq!(stat.recent_failures.front().unwrap(), "q5");
        assert_eq!(stat.recent_failures.back().unwrap(), "q7");
    }

    #[test]
    fn test_every_keyword_in_set_updated() {
        let mut tracker = KeywordAccuracyTracker::default();
        let now = Utc::now();

        tracker.update(&keywords(&["revenue", "monthly"]), true, "q", now, 5);

        assert_eq!(tracker.accuracy("revenue"), Some(1.0));
        assert_eq!(tracker.accuracy("monthly"), Some(1.0));
        assert_eq!(tracker.len(), 2);
    }
}
