//! # RAG Console CLI (`rag`)
//!
//! Starts the interactive console: loads configuration, constructs the
//! embedding provider and chat client, prepares the database, and hands
//! control to the command loop.
//!
//! ```bash
//! rag --config ./rag.toml
//! ```
//!
//! Configuration problems (bad mode, missing endpoint or model, local
//! backend not compiled in) are fatal here: they are printed once and the
//! process exits without retrying.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use rag_console::config;
use rag_console::console::Console;
use rag_console::db;
use rag_console::embedding;
use rag_console::history::ContextStore;
use rag_console::llm::ChatClient;
use rag_console::migrate;
use rag_console::store::VectorStore;

/// RAG Console — ask questions against an embedded local corpus.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "An interactive retrieval-augmented console over a local text corpus",
    version,
    long_about = "Indexes the files under a configured corpus root into chunk embeddings \
    stored in SQLite, retrieves the most relevant chunks for each question, and streams \
    answers from an OpenAI-compatible chat endpoint, with persisted per-context history."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, default_value = "./rag.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: Could not load configuration. Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let provider = match embedding::create_provider(&config.embedding) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("FATAL: Could not initialize embedding provider. Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if config.embedding.mode == "remote" {
        if let Some(endpoint) = &config.embedding.endpoint {
            println!(
                "Mode: 'remote'. Using embedding endpoint at {}/embeddings",
                endpoint.trim_end_matches('/')
            );
        }
    }

    let chat = match ChatClient::new(&config.llm) {
        Ok(chat) => chat,
        Err(e) => {
            eprintln!("FATAL: Could not initialize LLM client. Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let pool = match db::connect(&config.db.path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("FATAL: Could not open database. Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = migrate::run_migrations(&pool).await {
        eprintln!("FATAL: Could not create schema. Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let store = VectorStore::new(pool.clone(), provider);
    let history = ContextStore::new(pool.clone());

    let mut console = Console::new(config, store, history, chat);
    let result = console.run().await;

    pool.close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("An unexpected error occurred: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
