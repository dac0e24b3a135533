//! Append-only feedback log
//!
//! One JSON record per line. A record is acknowledged only after its line is
//! written and fsynced, so a crash can at worst leave a torn final line from
//! a write that was never acknowledged; that tail is dropped on load. A
//! malformed line anywhere else means the log itself is damaged, which is
//! not recoverable here.

use crate::error::{Result, SqlSageError};
use crate::types::FeedbackRecord;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Durable append-only log of feedback records
#[derive(Debug)]
pub struct FeedbackLog {
    path: PathBuf,
    writer: Mutex<File>,
}

impl FeedbackLog {
    /// Open (creating if needed) the log at the given path
    ///
    /// A torn final line left by a crash mid-write is truncated away here,
    /// before the append handle is opened, so new records never concatenate
    /// onto a partial one.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::repair_tail(&path)?;

        let writer = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    /// Truncate an unterminated final line
    fn repair_tail(path: &Path) -> Result<()> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if data.is_empty() || data.ends_with(b"\n") {
            return Ok(());
        }

        let keep = data.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        warn!(
            "Truncating {} bytes of torn tail from {:?}",
            data.len() - keep,
            path
        );

        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(keep as u64)?;
        file.sync_data()?;
        Ok(())
    }

    /// Append one record and fsync before returning
    ///
    /// The line is written with a single write call under the writer lock,
    /// so concurrent appends cannot interleave partial records.
    pub fn append(&self, record: &FeedbackRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut writer = self
            .writer
            .lock()
            .map_err(|e| SqlSageError::Persistence(format!("Log writer poisoned: {}", e)))?;

        writer.write_all(line.as_bytes())?;
        writer.sync_data()?;

        debug!("Appended feedback record {}", record.id);
        Ok(())
    }

    /// Read every record in append order
    ///
    /// An unparseable final line is treated as a torn write and dropped; an
    /// unparseable interior line fails the load.
    pub fn load(&self) -> Result<Vec<FeedbackRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<std::io::Result<_>>()?;

        let mut records = Vec::with_capacity(lines.len());
        let last = lines.len().saturating_sub(1);

        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<FeedbackRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) if i == last => {
                    warn!(
                        "Dropping torn final log line ({} bytes): {}",
                        line.len(),
                        e
                    );
                }
                Err(e) => {
                    return Err(SqlSageError::Corruption(format!(
                        "Feedback log line {} is unreadable: {}",
                        i + 1,
                        e
                    )));
                }
            }
        }

        debug!("Loaded {} feedback records from {:?}", records.len(), self.path);
        Ok(records)
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeedbackSubmission;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn record(query: &str, helpful: bool) -> FeedbackRecord {
        FeedbackRecord::from_submission(
            FeedbackSubmission {
                original_query: query.to_string(),
                generated_sql: "SELECT 1".to_string(),
                was_helpful: helpful,
                ..Default::default()
            },
            BTreeSet::new(),
        )
    }

    #[test]
    fn test_append_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let log = FeedbackLog::open(temp.path().join("feedback.jsonl")).unwrap();

        let a = record("revenue by month", true);
        let b = record("failed payments", false);
        log.append(&a).unwrap();
        log.append(&b).unwrap();

        let loaded = log.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], a);
        assert_eq!(loaded[1], b);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let log = FeedbackLog::open(temp.path().join("absent.jsonl")).unwrap();
        assert!(log.load().unwrap().is_empty());
    }

    #[test]
    fn test_torn_final_line_dropped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("feedback.jsonl");
        let log = FeedbackLog::open(&path).unwrap();
        log.append(&record("revenue", true)).unwrap();

        // Simulate a crash mid-write of a second record
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("{\"id\":\"trunc");
        std::fs::write(&path, raw).unwrap();

        let loaded = log.load().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_reopen_repairs_torn_tail() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("feedback.jsonl");

        {
            let log = FeedbackLog::open(&path).unwrap();
            log.append(&record("revenue", true)).unwrap();
        }

        // Crash mid-write leaves a partial line with no terminator
        {
            use std::io::Write;
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"{\"id\":\"trunc").unwrap();
        }

        // Reopening truncates the tail; new appends stay parseable
        let log = FeedbackLog::open(&path).unwrap();
        log.append(&record("payments", false)).unwrap();

        let loaded = log.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].original_query, "payments");
    }

    #[test]
    fn test_interior_corruption_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("feedback.jsonl");
        let log = FeedbackLog::open(&path).unwrap();
        log.append(&record("revenue", true)).unwrap();
        log.append(&record("payments", false)).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let mut lines: Vec<&str> = raw.lines().collect();
        lines[0] = "not json";
        std::fs::write(&path, lines.join("\n")).unwrap();

        let err = log.load().unwrap_err();
        assert!(matches!(err, SqlSageError::Corruption(_)));
    }

    #[test]
    fn test_append_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("feedback.jsonl");

        {
            let log = FeedbackLog::open(&path).unwrap();
            log.append(&record("first", true)).unwrap();
        }

        let log = FeedbackLog::open(&path).unwrap();
        log.append(&record("second", false)).unwrap();

        assert_eq!(log.load().unwrap().len(), 2);
    }
}
