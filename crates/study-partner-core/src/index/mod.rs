//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only retrieval surface the study
//! pipeline depends on, enabling pluggable backends (local SQLite, managed
//! Pinecone, in-memory for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, RetrievedDocument};

/// Metadata filter applied during search.
///
/// Indexes that cannot filter may ignore it and return unfiltered results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Only return chunks with this `doc_type`.
    pub doc_type: Option<String>,
}

impl SearchFilter {
    pub fn doc_type(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: Some(doc_type.into()),
        }
    }

    pub fn matches(&self, doc_type: Option<&str>) -> bool {
        match &self.doc_type {
            Some(wanted) => doc_type == Some(wanted.as_str()),
            None => true,
        }
    }
}

/// Abstract nearest-neighbor index over embedded chunks.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`search`](VectorIndex::search) | Rank chunks by similarity to a text query |
/// | [`upsert`](VectorIndex::upsert) | Embed and store chunks |
/// | [`count`](VectorIndex::count) | Number of stored chunks |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend identifier (`"sqlite"`, `"pinecone"`, `"memory"`).
    fn name(&self) -> &str;

    /// Return up to `k` documents ranked by similarity to `query`, best first.
    /// Each result's `rank` equals its position in the returned list.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<RetrievedDocument>>;

    /// Embed and insert (or replace) chunks. Returns the number written.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize>;

    /// Number of chunks held by the index.
    async fn count(&self) -> Result<usize>;
}
