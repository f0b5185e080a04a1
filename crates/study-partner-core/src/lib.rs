//! # Study Partner Core
//!
//! Runtime-agnostic logic for Study Partner: data models, chunking, the
//! embedding / vector index / answer generator traits, conversation and quiz
//! stores, prompt assembly, and the study pipeline that ties them together.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem I/O.
//! Concrete network-backed collaborators live in the `study-partner` app
//! crate and are injected as trait objects.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod history;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod quiz;
pub mod topics;

pub use error::StudyError;
pub use pipeline::{PipelineOptions, StudyPipeline};
