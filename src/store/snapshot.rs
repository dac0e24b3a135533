//! Aggregate snapshot
//!
//! A recoverable cache of the derived aggregates so startup does not have to
//! replay the whole log. The snapshot is never authoritative: any record of
//! it being unreadable, version-skewed, or inconsistent with the log just
//! means a full replay. The log is the single source of truth.

use crate::error::{Result, SqlSageError};
use crate::learn::patterns::PatternRecognizer;
use crate::learn::report::FailureProfile;
use crate::learn::tracker::KeywordAccuracyTracker;
use crate::learn::trends::TrendAnalyzer;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Bump when the snapshot schema changes; older snapshots are discarded
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized state of every derived aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    /// Schema version
    pub version: u32,

    /// How many log records this snapshot covers, in append order
    pub records_applied: u64,

    pub tracker: KeywordAccuracyTracker,
    pub patterns: PatternRecognizer,
    pub trends: TrendAnalyzer,
    pub failures: FailureProfile,
}

/// Load a snapshot if one exists and is usable
///
/// Corruption is downgraded to a warning and `None`; the caller rebuilds
/// from the log.
pub fn load(path: &Path) -> Option<AggregateSnapshot> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Snapshot {:?} unreadable, rebuilding from log: {}", path, e);
            return None;
        }
    };

    let snapshot: AggregateSnapshot = match serde_json::from_slice(&data) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Snapshot {:?} corrupt, rebuilding from log: {}", path, e);
            return None;
        }
    };

    if snapshot.version != SNAPSHOT_VERSION {
        warn!(
            "Snapshot {:?} has version {}, expected {}; rebuilding from log",
            path, snapshot.version, SNAPSHOT_VERSION
        );
        return None;
    }

    debug!(
        "Loaded snapshot covering {} records from {:?}",
        snapshot.records_applied, path
    );
    Some(snapshot)
}

/// Persist a snapshot atomically (write to a temp file, then rename)
pub fn save(path: &Path, snapshot: &AggregateSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(snapshot)?;

    let mut file = std::fs::File::create(&tmp_path)?;
    use std::io::Write;
    file.write_all(&data)?;
    file.sync_data()?;
    drop(file);

    std::fs::rename(&tmp_path, path).map_err(|e| {
        SqlSageError::Persistence(format!("Failed to publish snapshot {:?}: {}", path, e))
    })?;

    debug!(
        "Saved snapshot covering {} records to {:?}",
        snapshot.records_applied, path
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot(records_applied: u64) -> AggregateSnapshot {
        AggregateSnapshot {
            version: SNAPSHOT_VERSION,
            records_applied,
            tracker: KeywordAccuracyTracker::default(),
            patterns: PatternRecognizer::default(),
            trends: TrendAnalyzer::new(24),
            failures: FailureProfile::default(),
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snapshot.json");

        save(&path, &snapshot(7)).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.records_applied, 7);
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(load(&temp.path().join("absent.json")).is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snapshot.json");
        std::fs::write(&path, "{ truncated").unwrap();
        assert!(load(&path).is_none());
    }

    #[test]
    fn test_version_skew_is_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snapshot.json");

        let mut old = snapshot(3);
        old.version = SNAPSHOT_VERSION + 1;
        save(&path, &old).unwrap();

        assert!(load(&path).is_none());
    }

    #[test]
    fn test_save_replaces_previous() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snapshot.json");

        save(&path, &snapshot(1)).unwrap();
        save(&path, &snapshot(2)).unwrap();

        assert_eq!(load(&path).unwrap().records_applied, 2);
    }
}
