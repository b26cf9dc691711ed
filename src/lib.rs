//! # RAG Console
//!
//! An interactive retrieval-augmented console over a local text corpus.
//!
//! Files under a configured root are split into paragraph chunks, embedded
//! with a local or remote model, and stored in SQLite. Questions are
//! answered by a chat-completion endpoint, grounded in the top-k most
//! similar chunks and in the persisted history of a named conversation
//! context.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────┐   ┌──────────┐
//! │  Corpus   │──▶│ Hash+Chunk+Embed │──▶│  SQLite   │
//! │ (files)   │   │   VectorStore    │   │ files/    │
//! └───────────┘   └──────────────────┘   │ chunks/   │
//!                                        │ history   │
//!       question ──▶ top-k retrieval ──▶ └────┬─────┘
//!                                             │
//!                    ┌────────────────────────┤
//!                    ▼                        ▼
//!              ┌──────────┐           ┌────────────┐
//!              │ ChatLLM  │           │ Contexts   │
//!              │ (stream) │           │ (turns)    │
//!              └──────────┘           └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`hash`] | Content fingerprinting for incremental indexing |
//! | [`chunk`] | Blank-line text splitting |
//! | [`embedding`] | Embedding provider abstraction and vector utilities |
//! | [`store`] | Chunk/vector persistence and cosine top-k retrieval |
//! | [`history`] | Persisted conversation contexts |
//! | [`session`] | Session-scoped setting overrides |
//! | [`llm`] | Streaming chat-completion client |
//! | [`files`] | Corpus traversal with glob filters |
//! | [`console`] | Interactive command loop |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod chunk;
pub mod config;
pub mod console;
pub mod db;
pub mod embedding;
pub mod files;
pub mod hash;
pub mod history;
pub mod llm;
pub mod migrate;
pub mod session;
pub mod store;
