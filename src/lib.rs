//! # Study Partner
//!
//! A retrieval-augmented study assistant for AWS certification exams.
//!
//! PDFs are chunked and embedded into a vector index. Questions, concept
//! explanations, service comparisons and practice quizzes are answered from
//! retrieved chunks by a chat model, over an HTTP API and a CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌────────────────┐
//! │    PDFs     │──▶│ Chunk+Embed │──▶│  Vector index  │
//! │  data/raw   │   │  (ingest)   │   │ SQLite/Pinecone│
//! └─────────────┘   └─────────────┘   └───────┬────────┘
//!                                             │
//!                      ┌──────────────────────┤
//!                      ▼                      ▼
//!                 ┌──────────┐         ┌──────────┐
//!                 │   CLI    │         │   HTTP   │
//!                 │ (study)  │         │  (axum)  │
//!                 └──────────┘         └──────────┘
//! ```
//!
//! The pipeline itself (prompts, sessions, quizzes, grading) lives in the
//! runtime-agnostic `study-partner-core` crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF text extraction |
//! | [`ingest`] | Chunking and batched upload |
//! | [`embedding`] | OpenAI embeddings client |
//! | [`llm`] | OpenAI chat completions client |
//! | [`sqlite_index`] | Local vector index |
//! | [`pinecone`] | Pinecone vector index |
//! | [`server`] | HTTP API |
//! | [`repl`] | Interactive terminal session |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod openai;
pub mod pinecone;
pub mod repl;
pub mod search;
pub mod server;
pub mod setup;
pub mod sqlite_index;
