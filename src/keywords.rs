//! Keyword extraction from natural-language queries
//!
//! Keywords are the unit of accuracy aggregation: every feedback record
//! stores the keyword set of its query, and the tracker, pattern and
//! suggestion layers all key off it. Extraction must therefore be fully
//! deterministic: same text in, same set out.

use std::collections::{BTreeSet, HashSet};

/// Tokens dropped regardless of length
///
/// Query filler ("show", "me", "please") plus common English stopwords.
const STOPWORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "been", "but", "by", "can",
    "could", "did", "do", "does", "for", "from", "get", "give", "had", "has", "have", "how", "i",
    "in", "is", "it", "its", "last", "list", "me", "my", "not", "of", "on", "or", "our", "out",
    "over", "per", "please", "show", "so", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "to", "up", "us", "was", "we", "were", "what", "when", "where",
    "which", "who", "will", "with", "would", "you", "your",
];

/// Deterministic keyword extractor
///
/// Lowercases, splits on non-alphanumeric boundaries, and drops tokens that
/// are too short or in the stopword set. No stemming is applied.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    min_token_len: usize,
    stopwords: HashSet<&'static str>,
}

impl KeywordExtractor {
    /// Create an extractor with the given minimum token length
    pub fn new(min_token_len: usize) -> Self {
        Self {
            min_token_len,
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    /// Extract the canonical keyword set for a query
    ///
    /// Empty or all-stopword input yields an empty set; this is not an error.
    pub fn extract(&self, query: &str) -> BTreeSet<String> {
        query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| token.len() >= self.min_token_len)
            .filter(|token| !self.stopwords.contains(token))
            .map(String::from)
            .collect()
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(3)
    }
}
