//! # Service Desk RAG CLI (`sdrag`)
//!
//! Builds or loads the knowledge-base vector store and answers questions
//! grounded on it.
//!
//! ## Usage
//!
//! ```bash
//! sdrag --config ./config/servicedesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sdrag index` | Build the vector store if absent, otherwise load and verify it |
//! | `sdrag index --rebuild` | Rebuild the vector store from the corpus |
//! | `sdrag search "<q>"` | Show the nearest documents and their distances |
//! | `sdrag ask "<q>"` | Answer a question and list the sources used |
//! | `sdrag serve` | Start the JSON HTTP server |
//!
//! The API key is read from `GOOGLE_API_KEY` (or the variable named by
//! `[generation].api_key_env`), which may also be set in a `.env` file in
//! the working directory. Logs go to stderr; set `RUST_LOG=debug`
//! for retrieval and retry detail.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use servicedesk_rag::config::{self, Config};
use servicedesk_rag::embedding::create_embedder;
use servicedesk_rag::generation::GeminiClient;
use servicedesk_rag::pipeline::Pipeline;
use servicedesk_rag::server;

/// Service Desk RAG: grounded answers to IT support questions.
#[derive(Parser)]
#[command(
    name = "sdrag",
    about = "Service Desk RAG: grounded answers to IT support questions from a local knowledge base",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means all defaults.
    #[arg(long, global = true, default_value = "./config/servicedesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector store if absent, otherwise load and verify it.
    Index {
        /// Discard existing artifacts and rebuild from the corpus.
        #[arg(long)]
        rebuild: bool,
    },

    /// Show the documents nearest to a query, with squared L2 distances.
    Search {
        query: String,

        /// Number of documents to show.
        #[arg(long, default_value_t = 3)]
        k: usize,
    },

    /// Answer a question from the knowledge base.
    Ask { question: String },

    /// Start the JSON HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn open_pipeline(cfg: &Config, rebuild: bool) -> anyhow::Result<Pipeline> {
    // Credential first: nothing is built without it.
    let generator = Arc::new(GeminiClient::from_config(&cfg.generation)?);
    let embedder = create_embedder(&cfg.embedding)
        .await
        .context("Failed to initialize embedder")?;

    let pipeline = if rebuild {
        Pipeline::rebuild(cfg, embedder, generator).await
    } else {
        Pipeline::open(cfg, embedder, generator).await
    };
    pipeline.context("Failed to initialize RAG pipeline")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    config::load_dotenv(Path::new(".env"))?;
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { rebuild } => {
            let pipeline = open_pipeline(&cfg, rebuild).await?;
            println!("Vector store ready: {} documents.", pipeline.len());
            for source in pipeline.sources() {
                println!("  {}", source);
            }
        }
        Commands::Search { query, k } => {
            let pipeline = open_pipeline(&cfg, false).await?;
            let hits = pipeline.search(&query, k).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!("{}. [{:.4}] {}", i + 1, hit.distance, hit.source_id);
                println!(
                    "    excerpt: \"{}\"",
                    excerpt(&hit.chunk_text, 160).replace('\n', " ").trim()
                );
            }
        }
        Commands::Ask { question } => {
            let pipeline = open_pipeline(&cfg, false).await?;
            let result = pipeline.query(&question).await;
            println!("{}", result.answer);
            let sources = result.unique_sources();
            if !sources.is_empty() {
                println!();
                println!("Sources:");
                for source in sources {
                    println!("  - {}", source);
                }
            }
        }
        Commands::Serve => {
            let pipeline = open_pipeline(&cfg, false).await?;
            server::run_server(&cfg.server, pipeline).await?;
        }
    }

    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}
