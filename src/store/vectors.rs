//! Vector sidecar keyed by record id
//!
//! A bincode stream: one header naming the embedding model and dimension,
//! followed by `(record_id, vector)` entries in append order. The header
//! pins vectors to the model that produced them. Embeddings from different
//! models are not comparable, so a header mismatch discards the whole file
//! and the index starts cold.

use crate::error::{Result, SqlSageError};
use crate::types::RecordId;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct VectorHeader {
    model: String,
    dimensions: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorEntry {
    record_id: RecordId,
    vector: Vec<f32>,
}

/// Append-only store of record embeddings
#[derive(Debug)]
pub struct VectorStore {
    path: PathBuf,
    writer: Mutex<File>,
    dimensions: usize,
}

impl VectorStore {
    /// Open the sidecar, returning the store and all recoverable entries
    ///
    /// Entries are returned in append order so the caller can rebuild the
    /// index with insertion recency intact. A file written by a different
    /// model or dimension is discarded with a warning.
    pub fn open<P: AsRef<Path>>(
        path: P,
        model: &str,
        dimensions: usize,
    ) -> Result<(Self, Vec<(RecordId, Vec<f32>)>)> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let expected = VectorHeader {
            model: model.to_string(),
            dimensions: dimensions as u32,
        };

        let entries = match Self::read_entries(&path, &expected)? {
            Ok(entries) => entries,
            Err(reason) => {
                if path.exists() {
                    warn!("Discarding vector sidecar {:?}: {}", path, reason);
                    std::fs::remove_file(&path)?;
                }
                Vec::new()
            }
        };

        let fresh = !path.exists();
        let writer = OpenOptions::new().create(true).append(true).open(&path)?;

        let store = Self {
            path,
            writer: Mutex::new(writer),
            dimensions,
        };

        if fresh {
            store.write_header(&expected)?;
        }

        debug!(
            "Vector sidecar ready at {:?} ({} entries, {} dimensions)",
            store.path,
            entries.len(),
            dimensions
        );

        Ok((store, entries))
    }

    /// Append one embedding and fsync before returning
    pub fn append(&self, record_id: RecordId, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(SqlSageError::Embedding(format!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }

        let entry = VectorEntry {
            record_id,
            vector: vector.to_vec(),
        };

        let mut writer = self
            .writer
            .lock()
            .map_err(|e| SqlSageError::Persistence(format!("Vector writer poisoned: {}", e)))?;

        bincode::serialize_into(&mut *writer, &entry)
            .map_err(|e| SqlSageError::Persistence(format!("Vector write failed: {}", e)))?;
        writer.sync_data()?;

        Ok(())
    }

    fn write_header(&self, header: &VectorHeader) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| SqlSageError::Persistence(format!("Vector writer poisoned: {}", e)))?;

        bincode::serialize_into(&mut *writer, header)
            .map_err(|e| SqlSageError::Persistence(format!("Header write failed: {}", e)))?;
        writer.sync_data()?;

        Ok(())
    }

    /// Read all entries, validating the header
    ///
    /// The outer Result carries I/O failures; the inner Err(reason) means
    /// the file should be discarded. A decode error mid-stream is a torn
    /// tail from an unacknowledged write: everything before it is kept and
    /// the file is truncated back to the last clean offset so later appends
    /// stay decodable.
    #[allow(clippy::type_complexity)]
    fn read_entries(
        path: &Path,
        expected: &VectorHeader,
    ) -> Result<std::result::Result<Vec<(RecordId, Vec<f32>)>, String>> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Ok(Vec::new())),
            Err(e) => return Err(e.into()),
        };

        if data.is_empty() {
            return Ok(Err("empty file".to_string()));
        }

        let mut cursor = Cursor::new(&data);

        let header: VectorHeader = match bincode::deserialize_from(&mut cursor) {
            Ok(header) => header,
            Err(e) => return Ok(Err(format!("bad header: {}", e))),
        };
        if header != *expected {
            return Ok(Err(format!(
                "written by model '{}' ({} dims), configured '{}' ({} dims)",
                header.model, header.dimensions, expected.model, expected.dimensions
            )));
        }

        let mut entries = Vec::new();
        let mut clean_offset = cursor.position();

        loop {
            match bincode::deserialize_from::<_, VectorEntry>(&mut cursor) {
                Ok(entry) => {
                    clean_offset = cursor.position();
                    if entry.vector.len() == expected.dimensions as usize {
                        entries.push((entry.record_id, entry.vector));
                    } else {
                        warn!(
                            "Skipping vector for {} with wrong dimension {}",
                            entry.record_id,
                            entry.vector.len()
                        );
                    }
                }
                Err(_) => break,
            }
        }

        if clean_offset < data.len() as u64 {
            warn!(
                "Truncating {} bytes of torn tail from {:?}",
                data.len() as u64 - clean_offset,
                path
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(clean_offset)?;
            file.sync_data()?;
        }

        Ok(Ok(entries))
    }

    /// Path of the underlying sidecar file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
