//! Query → nearest documents.
//!
//! Embeds the question, searches the [`VectorIndex`], and maps each returned
//! row back to its [`Document`](crate::models::Document) in the
//! [`DocumentStore`]. An empty index is a valid state: retrieval returns
//! nothing and the query is never embedded.

use std::sync::Arc;

use crate::embedding::{embed_query, Embedder};
use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::RetrievalHit;
use crate::store::DocumentStore;

pub struct Retriever {
    index: VectorIndex,
    store: DocumentStore,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    /// Pair an index with its document rows. Fails if the row counts differ.
    pub fn new(
        index: VectorIndex,
        store: DocumentStore,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        store.check_aligned(&index)?;
        Ok(Self {
            index,
            store,
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// The `k` nearest documents to `query_text`, ascending by distance.
    pub async fn retrieve_hits(&self, query_text: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        if self.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_query(self.embedder.as_ref(), query_text).await?;
        let neighbors = self.index.search(&query_vec, k)?;

        let mut hits = Vec::with_capacity(neighbors.len());
        for (row, distance) in neighbors {
            let doc = self.store.get(row)?;
            tracing::debug!(row, distance, source = %doc.source_id, "retrieved");
            hits.push(RetrievalHit {
                chunk_text: doc.content.clone(),
                source_id: doc.source_id.clone(),
                distance,
            });
        }
        Ok(hits)
    }

    /// Context chunks and their source ids, both ordered by ascending distance.
    pub async fn retrieve(&self, query_text: &str, k: usize) -> Result<(Vec<String>, Vec<String>)> {
        let hits = self.retrieve_hits(query_text, k).await?;
        Ok(hits
            .into_iter()
            .map(|hit| (hit.chunk_text, hit.source_id))
            .unzip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use crate::models::Document;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds every text as its length along one axis, counting calls.
    struct LengthEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    fn doc(id: &str, body: &str) -> Document {
        Document {
            source_id: id.into(),
            content: body.into(),
        }
    }

    fn retriever(docs: Vec<Document>) -> (Retriever, Arc<LengthEmbedder>) {
        let embedder = Arc::new(LengthEmbedder {
            calls: AtomicUsize::new(0),
        });
        let vectors: Vec<Vec<f32>> = docs.iter().map(|d| vec![d.content.len() as f32]).collect();
        let index = VectorIndex::build(&vectors).unwrap();
        let store = DocumentStore::new(String::new(), docs);
        let r = Retriever::new(index, store, embedder.clone()).unwrap();
        (r, embedder)
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_distance() {
        let (r, _) = retriever(vec![
            doc("a.txt", "x"),
            doc("b.txt", "xxxxx"),
            doc("c.txt", "xxx"),
        ]);
        let (chunks, sources) = r.retrieve("yyyy", 2).await.unwrap();
        // |4-5| = 1 and |4-3| = 1 tie; lower row wins.
        assert_eq!(sources, vec!["b.txt", "c.txt"]);
        assert_eq!(chunks, vec!["xxxxx", "xxx"]);
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing_without_embedding() {
        let (r, embedder) = retriever(Vec::new());
        let (chunks, sources) = r.retrieve("anything", 1).await.unwrap();
        assert!(chunks.is_empty());
        assert!(sources.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hits_carry_distances() {
        let (r, _) = retriever(vec![doc("a.txt", "xx"), doc("b.txt", "xxxxxx")]);
        let hits = r.retrieve_hits("zzz", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source_id, "a.txt");
        assert_eq!(hits[0].distance, 1.0);
        assert_eq!(hits[1].distance, 9.0);
    }

    #[test]
    fn test_misaligned_store_rejected() {
        let embedder: Arc<dyn Embedder> = Arc::new(LengthEmbedder {
            calls: AtomicUsize::new(0),
        });
        let index = VectorIndex::build(&[vec![1.0], vec![2.0]]).unwrap();
        let store = DocumentStore::new(String::new(), vec![doc("a.txt", "a")]);
        assert!(matches!(
            Retriever::new(index, store, embedder),
            Err(RagError::IndexCorruption(_))
        ));
    }
}
