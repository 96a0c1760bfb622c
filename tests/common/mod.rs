//! Shared fixtures: a deterministic keyword embedder, a recording generator,
//! and temp-dir config helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use servicedesk_rag::config::Config;
use servicedesk_rag::embedding::Embedder;
use servicedesk_rag::error::Result;
use servicedesk_rag::generation::{GenerationError, Generator};
use servicedesk_rag::prompt::GenerationRequest;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

const VOCABULARY: &[&str] = &[
    "vpn",
    "connect",
    "client",
    "credentials",
    "printer",
    "driver",
    "install",
    "portal",
    "password",
    "reset",
];

/// Bag-of-words over a fixed vocabulary. Same text, same vector.
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; VOCABULARY.len()];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if let Some(i) = VOCABULARY.iter().position(|w| *w == token) {
            v[i] += 1.0;
        }
    }
    v
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dims(&self) -> usize {
        VOCABULARY.len()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }
}

/// Records every request and replies with a fixed answer (or a failure).
pub struct RecordingGenerator {
    pub requests: Mutex<Vec<GenerationRequest>>,
    reply: Option<String>,
}

impl RecordingGenerator {
    pub fn answering(reply: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply: Some(reply.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply: None,
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn try_generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(GenerationError::Exhausted {
                attempts: 5,
                last: "endpoint returned 503: unavailable".to_string(),
            }),
        }
    }
}

/// Answers after a fixed delay, to hold a query in flight.
pub struct SlowGenerator {
    pub delay: std::time::Duration,
}

#[async_trait]
impl Generator for SlowGenerator {
    async fn try_generate(
        &self,
        _request: &GenerationRequest,
    ) -> std::result::Result<String, GenerationError> {
        tokio::time::sleep(self.delay).await;
        Ok("slow answer".to_string())
    }
}

pub const VPN_TEXT: &str = "Restart the VPN client and re-enter your credentials.";
pub const PRINTER_TEXT: &str = "Install the printer driver from the IT portal.";

/// Write `files` into `<root>/knowledge_base`.
pub fn write_corpus(root: &Path, files: &[(&str, &str)]) {
    let dir = root.join("knowledge_base");
    std::fs::create_dir_all(&dir).unwrap();
    for (name, body) in files {
        std::fs::write(dir.join(name), body).unwrap();
    }
}

/// Config with every path inside `tmp`.
pub fn test_config(tmp: &TempDir) -> Config {
    let root = tmp.path();
    let mut cfg = Config::default();
    cfg.corpus.dir = root.join("knowledge_base");
    cfg.index.index_path = root.join("data/vector_store.index");
    cfg.index.documents_path = root.join("data/documents.json");
    cfg
}
