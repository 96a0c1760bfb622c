//! Build-or-load lifecycle and the `query` entry point.
//!
//! A [`Pipeline`] is constructed once by the caller and held for the life of
//! the process. Construction either loads the persisted vector index and
//! document store or, when they are absent, builds them from the corpus and
//! writes both before returning. After construction nothing is mutated.
//!
//! ```text
//! open ─┬─ both artifacts present ──▶ load ──▶ consistency checks ──▶ Pipeline
//!       └─ otherwise ──▶ corpus ──▶ embed ──▶ build ──▶ persist ─────▶ Pipeline
//! ```
//!
//! [`Pipeline::query`] never fails: per-query errors become a canned answer
//! with no sources.

use std::sync::Arc;

use crate::config::Config;
use crate::corpus;
use crate::embedding::{embed_documents, Embedder};
use crate::error::{RagError, Result};
use crate::generation::{Generator, INVALID_RESPONSE_ANSWER};
use crate::index::VectorIndex;
use crate::models::{QueryResult, RetrievalHit};
use crate::prompt;
use crate::retriever::Retriever;
use crate::store::DocumentStore;

/// Answer when retrieval finds nothing (only possible with an empty corpus).
pub const NO_INFORMATION_ANSWER: &str = "I'm sorry, I could not find any relevant information.";

/// Answer when retrieval itself fails (embedding error, corrupted rows).
pub const ERROR_ANSWER: &str = "I'm sorry, I encountered an error while generating a response.";

pub struct Pipeline {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl Pipeline {
    /// Load the persisted artifacts, or build and persist them from the corpus.
    ///
    /// # Errors
    ///
    /// - [`RagError::Corpus`] if a build is needed and the corpus directory is missing.
    /// - [`RagError::IndexCorruption`] if the loaded artifacts disagree with
    ///   each other, the embedder, or the current corpus.
    pub async fn open(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let index_path = &config.index.index_path;
        let documents_path = &config.index.documents_path;

        let (index, store) = match (index_path.exists(), documents_path.exists()) {
            (true, true) => {
                tracing::info!(path = %index_path.display(), "loading existing vector store");
                load_artifacts(config, embedder.as_ref())?
            }
            (false, false) => {
                tracing::info!("no vector store found; building a new one");
                build_artifacts(config, embedder.as_ref()).await?
            }
            _ => {
                tracing::warn!(
                    index = %index_path.display(),
                    documents = %documents_path.display(),
                    "only one vector store artifact present; rebuilding both"
                );
                build_artifacts(config, embedder.as_ref()).await?
            }
        };

        Self::from_parts(config, index, store, embedder, generator)
    }

    /// Rebuild the artifacts from the corpus, replacing any on disk.
    pub async fn rebuild(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        tracing::info!("rebuilding vector store");
        let (index, store) = build_artifacts(config, embedder.as_ref()).await?;
        Self::from_parts(config, index, store, embedder, generator)
    }

    fn from_parts(
        config: &Config,
        index: VectorIndex,
        store: DocumentStore,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        Ok(Self {
            retriever: Retriever::new(index, store, embedder)?,
            generator,
            top_k: config.retrieval.top_k,
        })
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.retriever.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retriever.is_empty()
    }

    /// Source ids in index row order.
    pub fn sources(&self) -> Vec<&str> {
        self.retriever
            .store()
            .documents
            .iter()
            .map(|d| d.source_id.as_str())
            .collect()
    }

    /// Nearest documents for `question` with distances; no generation.
    pub async fn search(&self, question: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        self.retriever.retrieve_hits(question, k).await
    }

    /// Answer `question` from the knowledge base.
    ///
    /// Returns the generated answer with the retrieved source ids. When the
    /// index is empty the generator is not called and
    /// [`NO_INFORMATION_ANSWER`] is returned with no sources.
    pub async fn query(&self, question: &str) -> QueryResult {
        tracing::info!(question, "received query");

        let (chunks, sources) = match self.retriever.retrieve(question, self.top_k).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                tracing::error!(error = %e, "retrieval failed");
                return QueryResult::unsourced(ERROR_ANSWER);
            }
        };

        if chunks.is_empty() {
            return QueryResult::unsourced(NO_INFORMATION_ANSWER);
        }

        let request = prompt::build(question, &chunks);
        match self.generator.try_generate(&request).await {
            Ok(answer) => QueryResult { answer, sources },
            Err(e) => {
                tracing::error!(error = %e, "generation failed");
                QueryResult::unsourced(INVALID_RESPONSE_ANSWER)
            }
        }
    }
}

fn load_artifacts(config: &Config, embedder: &dyn Embedder) -> Result<(VectorIndex, DocumentStore)> {
    let index = VectorIndex::load(&config.index.index_path)?;
    let store = DocumentStore::load(&config.index.documents_path)?;
    store.check_aligned(&index)?;

    if !index.is_empty() && embedder.dims() != 0 && index.dims() != embedder.dims() {
        return Err(RagError::IndexCorruption(format!(
            "index was built with {}-dimensional vectors but {} produces {}; rebuild the index",
            index.dims(),
            embedder.model_name(),
            embedder.dims()
        )));
    }

    if config.index.verify_corpus && config.corpus.dir.is_dir() {
        let current = corpus::fingerprint(&corpus::load(&config.corpus)?);
        if current != store.fingerprint {
            return Err(RagError::IndexCorruption(format!(
                "corpus at {} changed since the index was built; run `sdrag index --rebuild`",
                config.corpus.dir.display()
            )));
        }
    }

    tracing::info!(documents = store.len(), "vector store loaded");
    Ok((index, store))
}

async fn build_artifacts(
    config: &Config,
    embedder: &dyn Embedder,
) -> Result<(VectorIndex, DocumentStore)> {
    let documents = corpus::load(&config.corpus)?;

    if documents.is_empty() {
        tracing::warn!(
            dir = %config.corpus.dir.display(),
            "no documents found; the assistant will not be able to answer questions"
        );
        remove_stale(&config.index.index_path)?;
        remove_stale(&config.index.documents_path)?;
        return Ok((VectorIndex::empty(), DocumentStore::default()));
    }

    tracing::info!(documents = documents.len(), model = embedder.model_name(), "embedding corpus");
    let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
    let vectors = embed_documents(embedder, &texts).await?;
    let index = VectorIndex::build(&vectors)?;
    let store = DocumentStore::new(corpus::fingerprint(&documents), documents);

    // A lone index on disk means an unfinished build.
    remove_stale(&config.index.documents_path)?;
    tracing::info!(path = %config.index.index_path.display(), "saving vector index");
    index.persist(&config.index.index_path)?;
    tracing::info!(path = %config.index.documents_path.display(), "saving document store");
    store.persist(&config.index.documents_path)?;

    tracing::info!("vector store built successfully");
    Ok((index, store))
}

fn remove_stale(path: &std::path::Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "removed stale artifact");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RagError::io(path, e)),
    }
}
