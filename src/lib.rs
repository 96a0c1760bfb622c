//! # Service Desk RAG
//!
//! A retrieval-augmented IT service desk assistant. Answers natural-language
//! support questions by retrieving the most relevant passage from a fixed
//! knowledge base and asking a generative model to answer strictly from it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │  Corpus  │──▶│ Embedder │──▶│ Vector Index │  (build once, persisted)
//! │  *.txt   │   │          │   │ + documents  │
//! └──────────┘   └──────────┘   └──────┬───────┘
//!                                      │
//!   question ──▶ Embedder ──▶ search ──┴──▶ Retriever ──▶ Prompt ──▶ Generation
//!                                                                      │
//!                                       (answer, sources) ◀── Pipeline ┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GOOGLE_API_KEY=...
//! sdrag index                       # build or load the vector store
//! sdrag ask "My VPN won't connect"  # grounded answer + sources
//! sdrag serve                       # JSON endpoint for chat front-ends
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credential lookup |
//! | [`error`] | Construction-time error taxonomy |
//! | [`models`] | Core data types |
//! | [`corpus`] | Knowledge-base loader |
//! | [`embedding`] | Embedder abstraction and backends |
//! | [`index`] | Exact L2 vector index with binary persistence |
//! | [`store`] | Persisted document rows aligned with the index |
//! | [`retriever`] | Query → nearest documents |
//! | [`prompt`] | Grounded generation request builder |
//! | [`retry`] | Exponential backoff policy |
//! | [`generation`] | Generative model client |
//! | [`pipeline`] | Build-or-load lifecycle and `query` entry point |
//! | [`server`] | JSON HTTP server |

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod retry;
pub mod server;
pub mod store;
