//! Persistence layer for the learning engine
//!
//! Three files under the data directory, with distinct roles:
//! - `feedback.jsonl`: the append-only record log, the single source of truth
//! - `vectors.bin`: embedding sidecar keyed by record id
//! - `snapshot.json`: recoverable aggregate cache, always rebuildable from
//!   the log

pub mod log;
pub mod snapshot;
pub mod vectors;

use crate::config::LearnerConfig;
use crate::error::{Result, SqlSageError};
use crate::types::FeedbackRecord;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task;
use tracing::warn;

pub use self::log::FeedbackLog;
pub use self::snapshot::{AggregateSnapshot, SNAPSHOT_VERSION};
pub use self::vectors::VectorStore;

/// Durable feedback store
///
/// Wraps the append-only log with retrying writes and a monotonic timestamp
/// clamp. File I/O runs on blocking tasks; an append that has started is
/// never abandoned mid-write even if the caller goes away.
pub struct FeedbackStore {
    log: Arc<FeedbackLog>,
    retries: usize,
    backoff_base: Duration,
    /// Serializes appends end to end: the timestamp clamp and the write must
    /// happen in the same order, or log timestamps could regress
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl FeedbackStore {
    /// Open the store under the configured data directory
    pub fn open(config: &LearnerConfig) -> Result<Self> {
        let log = FeedbackLog::open(config.log_path())?;

        Ok(Self {
            log: Arc::new(log),
            retries: config.persistence.append_retries,
            backoff_base: Duration::from_millis(config.persistence.backoff_base_ms),
            last_timestamp: Mutex::new(None),
        })
    }

    /// Append a record durably, returning it with its final timestamp
    ///
    /// The record's timestamp is clamped so timestamps never decrease across
    /// the log. Transient write failures are retried with exponential
    /// backoff; exhausting retries surfaces a persistence error and nothing
    /// is acknowledged.
    pub async fn append(&self, mut record: FeedbackRecord) -> Result<FeedbackRecord> {
        let mut last = self.last_timestamp.lock().await;

        if let Some(floor) = *last {
            if record.timestamp < floor {
                record.timestamp = floor;
            }
        }

        let mut attempt = 0;
        loop {
            let log = Arc::clone(&self.log);
            let to_write = record.clone();
            let result = task::spawn_blocking(move || log.append(&to_write))
                .await
                .map_err(|e| SqlSageError::Other(format!("Task join error: {}", e)))?;

            match result {
                Ok(()) => {
                    *last = Some(record.timestamp);
                    return Ok(record);
                }
                Err(e) => {
                    let retryable = matches!(e, SqlSageError::Io(_));
                    if !retryable || attempt >= self.retries {
                        return Err(SqlSageError::Persistence(format!(
                            "Feedback append failed after {} attempt(s): {}",
                            attempt + 1,
                            e
                        )));
                    }

                    let backoff = self.backoff_base * 2_u32.pow(attempt as u32);
                    warn!(
                        "Feedback append failed, retrying after {:?} (attempt {}/{}): {}",
                        backoff,
                        attempt + 1,
                        self.retries,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Read the full log in append order
    ///
    /// Also seeds the timestamp clamp from the log tail so appends after a
    /// restart stay non-decreasing.
    pub async fn load_all(&self) -> Result<Vec<FeedbackRecord>> {
        let log = Arc::clone(&self.log);
        let records = task::spawn_blocking(move || log.load())
            .await
            .map_err(|e| SqlSageError::Other(format!("Task join error: {}", e)))??;

        if let Some(last) = records.last() {
            *self.last_timestamp.lock().await = Some(last.timestamp);
        }

        Ok(records)
    }
}
