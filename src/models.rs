//! Core data models used throughout the pipeline.
//!
//! These types represent the knowledge-base documents, retrieval hits, and
//! query results that flow from the corpus to the caller.

use serde::{Deserialize, Serialize};

/// One knowledge-base file. Row `i` of the document store holds `Document[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Filename relative to the corpus directory (e.g. `vpn.txt`).
    pub source_id: String,
    pub content: String,
}

/// A nearest-neighbor match for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub chunk_text: String,
    pub source_id: String,
    /// Squared Euclidean distance; lower is more similar.
    pub distance: f32,
}

/// The answer to one question plus the documents it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<String>,
}

impl QueryResult {
    /// An answer not backed by any source.
    pub fn unsourced(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }

    /// Sources in retrieval order with duplicates removed, for display.
    pub fn unique_sources(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            if !seen.contains(&source.as_str()) {
                seen.push(source.as_str());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_sources_keeps_first_occurrence_order() {
        let result = QueryResult {
            answer: "a".into(),
            sources: vec!["vpn.txt".into(), "printer.txt".into(), "vpn.txt".into()],
        };
        assert_eq!(result.unique_sources(), vec!["vpn.txt", "printer.txt"]);
    }

    #[test]
    fn test_unsourced_has_no_sources() {
        let result = QueryResult::unsourced("nothing here");
        assert!(result.sources.is_empty());
        assert!(result.unique_sources().is_empty());
    }
}
