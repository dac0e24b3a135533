//! In-memory nearest-neighbor index over embedded past queries
//!
//! The baseline is a linear scan: O(n) per search, O(1) amortized insert.
//! That is a correctness baseline, not a performance requirement; an
//! approximate structure can replace it as long as the search contract
//! (descending similarity, recency tie-break, degenerate cases) holds.

use crate::embeddings::cosine_similarity;
use crate::error::{Result, SqlSageError};
use crate::types::RecordId;

/// One indexed embedding with its insertion sequence number
#[derive(Debug, Clone)]
struct IndexEntry {
    seq: u64,
    record_id: RecordId,
    vector: Vec<f32>,
}

/// Linear-scan semantic index
///
/// The dimension is fixed at construction and every inserted or queried
/// vector must match it; a mismatch is a configuration error, not a
/// per-call failure.
#[derive(Debug)]
pub struct SemanticIndex {
    dimensions: usize,
    entries: Vec<IndexEntry>,
    next_seq: u64,
}

impl SemanticIndex {
    /// Create an empty index for vectors of the given dimension
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Number of indexed vectors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been indexed yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension this index was built for
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Insert a record's embedding
    pub fn insert(&mut self, record_id: RecordId, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(dimension_error(self.dimensions, vector.len()));
        }

        self.entries.push(IndexEntry {
            seq: self.next_seq,
            record_id,
            vector,
        });
        self.next_seq += 1;

        Ok(())
    }

    /// Find the k most similar records, descending cosine similarity
    ///
    /// Equal similarities are broken in favor of the more recently inserted
    /// record. An empty index or `k == 0` yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(RecordId, f32)>> {
        if query.len() != self.dimensions {
            return Err(dimension_error(self.dimensions, query.len()));
        }

        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(u64, RecordId, f32)> = self
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.seq,
                    entry.record_id,
                    cosine_similarity(query, &entry.vector),
                )
            })
            .collect();

        // Descending similarity; ties go to the higher (newer) sequence
        scored.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| b.0.cmp(&a.0)));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, id, sim)| (id, sim)).collect())
    }
}

fn dimension_error(expected: usize, got: usize) -> SqlSageError {
    SqlSageError::Config(config::ConfigError::Message(format!(
        "Vector dimension mismatch: index built for {}, got {}",
        expected, got
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_index_returns_empty() {
        let index = SemanticIndex::new(3);
        let results = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_zero_k_returns_empty() {
        let mut index = SemanticIndex::new(3);
        index.insert(RecordId::new(), vec![1.0, 0.0, 0.0]).unwrap();
        let results = index.search(&[1.0, 0.0, 0.0], 0).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let mut index = SemanticIndex::new(3);
        assert!(index.insert(RecordId::new(), vec![1.0, 0.0]).is_err());
        assert!(index.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_descending_similarity_order() {
        let mut index = SemanticIndex::new(3);
        let close = RecordId::new();
        let far = RecordId::new();
        let exact = RecordId::new();

        index.insert(far, vec![0.0, 0.0, 1.0]).unwrap();
        index.insert(close, vec![0.9, 0.1, 0.0]).unwrap();
        index.insert(exact, vec![1.0, 0.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, exact);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(results[1].0, close);
        assert_eq!(results[2].0, far);
        assert!(results[0].1 >= results[1].1 && results[1].1 >= results[2].1);
    }

    #[test]
    fn test_tie_break_prefers_newer_insert() {
        let mut index = SemanticIndex::new(2);
        let older = RecordId::new();
        let newer = RecordId::new();

        // Identical vectors: identical similarity to any query
        index.insert(older, vec![1.0, 0.0]).unwrap();
        index.insert(newer, vec![1.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].0, newer);
        assert_eq!(results[1].0, older);
    }

    #[test]
    fn test_k_truncates() {
        let mut index = SemanticIndex::new(2);
        for _ in 0..10 {
            index.insert(RecordId::new(), vec![1.0, 0.0]).unwrap();
        }
        let results = index.search(&[1.0, 0.0], 4).unwrap();
        assert_eq!(results.len(), 4);
    }
}
