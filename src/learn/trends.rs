//! Time-bucketed accuracy history
//!
//! Every judgment lands in a fixed-width bucket keyed by its timestamp.
//! Buckets are the unit for both the trend chart and the recent-accuracy
//! window; lifetime totals fall out of summing them.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accuracy totals for one fixed-width period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyBucket {
    /// Inclusive start of the period
    pub period_start: DateTime<Utc>,

    /// Exclusive end of the period
    pub period_end: DateTime<Utc>,

    /// Judgments in the period
    pub total: u64,

    /// Of those, judged helpful
    pub successful: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct BucketTotals {
    total: u64,
    successful: u64,
}

/// Fixed-width accuracy bucketing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalyzer {
    /// Bucket width in hours; part of the serialized state so a snapshot
    /// taken under a different width is detectably stale
    bucket_hours: i64,

    /// bucket index (period start / width) -> totals
    buckets: BTreeMap<i64, BucketTotals>,
}

impl TrendAnalyzer {
    /// Create an analyzer with the given bucket width
    pub fn new(bucket_hours: i64) -> Self {
        Self {
            bucket_hours: bucket_hours.max(1),
            buckets: BTreeMap::new(),
        }
    }

    /// Bucket width this analyzer was built with
    pub fn bucket_hours(&self) -> i64 {
        self.bucket_hours
    }

    /// Assign one judgment to its bucket
    pub fn record(&mut self, timestamp: DateTime<Utc>, was_helpful: bool) {
        let index = timestamp.timestamp().div_euclid(self.width_secs());
        let totals = self.buckets.entry(index).or_default();
        totals.total += 1;
        if was_helpful {
            totals.successful += 1;
        }
    }

    /// Accuracy over the most recent `window`, ending now
    ///
    /// Sums every bucket overlapping the window; None when the window holds
    /// no judgments.
    pub fn window_accuracy(&self, window: Duration, now: DateTime<Utc>) -> Option<f64> {
        let width = self.width_secs();
        let cutoff = (now - window).timestamp();
        // First bucket whose period overlaps [now - window, now]
        let first_index = cutoff.div_euclid(width);

        let mut total = 0u64;
        let mut successful = 0u64;
        for (_, totals) in self.buckets.range(first_index..) {
            total += totals.total;
            successful += totals.successful;
        }

        if total == 0 {
            None
        } else {
            Some(successful as f64 / total as f64)
        }
    }

    /// Full bucket history, ascending by period start
    pub fn history(&self) -> Vec<AccuracyBucket> {
        let width = self.width_secs();
        self.buckets
            .iter()
            .map(|(&index, totals)| AccuracyBucket {
                period_start: Utc.timestamp_opt(index * width, 0).unwrap(),
                period_end: Utc.timestamp_opt((index + 1) * width, 0).unwrap(),
                total: totals.total,
                successful: totals.successful,
            })
            .collect()
    }

    /// Lifetime (total, successful) across all buckets
    pub fn totals(&self) -> (u64, u64) {
        self.buckets.values().fold((0, 0), |(t, s), b| {
            (t + b.total, s + b.successful)
        })
    }

    /// True when nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn width_secs(&self) -> i64 {
        self.bucket_hours * 3600
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_land_in_their_bucket() {
        let mut trends = TrendAnalyzer::new(24);
        let now = Utc::now();

        trends.record(now, true);
        trends.record(now, false);

        let history = trends.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].total, 2);
        assert_eq!(history[0].successful, 1);
        assert!(history[0].period_start <= now && now < history[0].period_end);
    }

    #[test]
    fn test_history_ascending_by_period_start() {
        let mut trends = TrendAnalyzer::new(24);
        let now = Utc::now();

        trends.record(now, true);
        trends.record(now - Duration::days(3), false);
        trends.record(now - Duration::days(1), true);

        let history = trends.history();
        assert_eq!(history.len(), 3);
        assert!(history.windows(2).all(|w| w[0].period_start < w[1].period_start));
    }

    #[test]
    fn test_window_accuracy_excludes_old_buckets() {
        let mut trends = TrendAnalyzer::new(24);
        let now = Utc::now();

        // Inside the 7-day window
        trends.record(now, true);
        trends.record(now - Duration::days(2), true);
        // Well outside it
        trends.record(now - Duration::days(30), false);
        trends.record(now - Duration::days(31), false);

        let accuracy = trends.window_accuracy(Duration::days(7), now).unwrap();
        assert_eq!(accuracy, 1.0);
    }

    #[test]
    fn test_empty_window_is_none() {
        let mut trends = TrendAnalyzer::new(24);
        assert_eq!(trends.window_accuracy(Duration::days(7), Utc::now()), None);

        trends.record(Utc::now() - Duration::days(60), true);
        assert_eq!(trends.window_accuracy(Duration::days(7), Utc::now()), None);
    }

    #[test]
    fn test_lifetime_totals() {
        let mut trends = TrendAnalyzer::new(24);
        let now = Utc::now();

        trends.record(now, true);
        trends.record(now - Duration::days(10), false);
        trends.record(now - Duration::days(20), true);

        assert_eq!(trends.totals(), (3, 2));
    }

    #[test]
    fn test_pre_epoch_timestamps_bucket_correctly() {
        let mut trends = TrendAnalyzer::new(24);
        let before_epoch = Utc.timestamp_opt(-1, 0).unwrap();

        trends.record(before_epoch, true);

        let history = trends.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].period_start <= before_epoch);
        assert!(before_epoch < history[0].period_end);
    }
}
