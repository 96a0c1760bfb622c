//! Persisted document rows.
//!
//! Each row keeps its `source_id` next to its text, so attribution needs no
//! separately sorted filename listing. The only remaining alignment, document
//! row `i` against index row `i`, is checked by [`DocumentStore::check_aligned`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RagError, Result};
use crate::index::{write_atomic, VectorIndex};
use crate::models::Document;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DocumentStore {
    /// Digest of the corpus the rows were built from (see [`crate::corpus::fingerprint`]).
    pub fingerprint: String,
    pub documents: Vec<Document>,
}

impl DocumentStore {
    pub fn new(fingerprint: String, documents: Vec<Document>) -> Self {
        Self {
            fingerprint,
            documents,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Document at index row `row`. A row past the end means the artifacts
    /// disagree, never a normal miss.
    pub fn get(&self, row: usize) -> Result<&Document> {
        self.documents.get(row).ok_or_else(|| {
            RagError::IndexCorruption(format!(
                "index row {} has no document ({} documents stored)",
                row,
                self.documents.len()
            ))
        })
    }

    pub fn check_aligned(&self, index: &VectorIndex) -> Result<()> {
        if index.len() != self.documents.len() {
            return Err(RagError::IndexCorruption(format!(
                "vector index has {} rows but document store has {} documents; rebuild the index",
                index.len(),
                self.documents.len()
            )));
        }
        Ok(())
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }

    /// Load rows written by [`persist`](Self::persist). Malformed JSON is
    /// reported as [`RagError::IndexCorruption`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            RagError::IndexCorruption(format!("{}: malformed document store: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(id: &str, body: &str) -> Document {
        Document {
            source_id: id.to_string(),
            content: body.to_string(),
        }
    }

    #[test]
    fn test_persist_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data/documents.json");
        let store = DocumentStore::new(
            "abc".into(),
            vec![doc("printer.txt", "Install the driver."), doc("vpn.txt", "Restart.")],
        );
        store.persist(&path).unwrap();
        assert_eq!(DocumentStore::load(&path).unwrap(), store);
    }

    #[test]
    fn test_get_out_of_range_is_corruption() {
        let store = DocumentStore::new(String::new(), vec![doc("a.txt", "a")]);
        assert_eq!(store.get(0).unwrap().source_id, "a.txt");
        assert!(matches!(store.get(1), Err(RagError::IndexCorruption(_))));
    }

    #[test]
    fn test_alignment_check() {
        let store = DocumentStore::new(String::new(), vec![doc("a.txt", "a")]);
        let one = VectorIndex::build(&[vec![1.0]]).unwrap();
        let two = VectorIndex::build(&[vec![1.0], vec![2.0]]).unwrap();
        assert!(store.check_aligned(&one).is_ok());
        assert!(matches!(
            store.check_aligned(&two),
            Err(RagError::IndexCorruption(_))
        ));
    }

    #[test]
    fn test_legacy_plain_array_is_corruption() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("documents.json");
        std::fs::write(&path, r#"["Restart the VPN client."]"#).unwrap();
        assert!(matches!(
            DocumentStore::load(&path),
            Err(RagError::IndexCorruption(_))
        ));
    }
}
