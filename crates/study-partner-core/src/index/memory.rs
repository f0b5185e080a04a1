//! In-memory [`VectorIndex`] implementation for tests and small corpora.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety. Search is
//! brute-force cosine similarity over all stored vectors.

use std::sync::{Arc, RwLock};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::models::{Chunk, RetrievedDocument};

use super::{SearchFilter, VectorIndex};

struct StoredChunk {
    id: String,
    chunk: Chunk,
    vector: Vec<f32>,
}

pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunks: RwLock::new(Vec::new()),
        }
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<RetrievedDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;

        let stored = self.chunks.read().map_err(|_| poisoned())?;
        let mut scored: Vec<(&StoredChunk, f32)> = stored
            .iter()
            .filter(|sc| {
                filter.map_or(true, |f| f.matches(Some(sc.chunk.metadata.doc_type.as_str())))
            })
            .map(|sc| (sc, cosine_similarity(&query_vec, &sc.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (sc, score))| RetrievedDocument {
                text: sc.chunk.text.clone(),
                source: Some(sc.chunk.metadata.source.clone()),
                doc_type: Some(sc.chunk.metadata.doc_type.clone()),
                filename: Some(sc.chunk.metadata.filename.clone()),
                chunk_id: Some(sc.chunk.chunk_id),
                rank,
                score: Some(score),
            })
            .collect())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            bail!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }

        let mut stored = self.chunks.write().map_err(|_| poisoned())?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let id = chunk.index_id();
            stored.retain(|sc| sc.id != id);
            stored.push(StoredChunk {
                id,
                chunk: chunk.clone(),
                vector,
            });
        }
        Ok(chunks.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.chunks.read().map_err(|_| poisoned())?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    /// Bag-of-letters embedder: similar wording gives similar vectors.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_ascii_lowercase().bytes() {
                        if c.is_ascii_lowercase() {
                            v[(c - b'a') as usize] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    fn chunk(text: &str, id: i64, doc_type: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            chunk_id: id,
            metadata: ChunkMetadata {
                source: "test".to_string(),
                doc_type: doc_type.to_string(),
                filename: "test.pdf".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_search_ranks_and_limits() {
        let index = InMemoryIndex::new(Arc::new(LetterEmbedder));
        index
            .upsert(&[
                chunk("zzzz zzzz", 0, "study_guide"),
                chunk("aaaa bbbb", 1, "study_guide"),
                chunk("aaaa", 2, "questions"),
            ])
            .await
            .unwrap();

        let results = index.search("aaaa", 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, Some(2));
        assert_eq!(results[0].rank, 0);
        assert_eq!(results[1].rank, 1);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_filter_by_doc_type() {
        let index = InMemoryIndex::new(Arc::new(LetterEmbedder));
        index
            .upsert(&[chunk("aaaa", 0, "study_guide"), chunk("bbbb", 1, "questions")])
            .await
            .unwrap();
        let results = index
            .search("aaaa", 5, Some(&SearchFilter::doc_type("questions")))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_type.as_deref(), Some("questions"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let index = InMemoryIndex::new(Arc::new(LetterEmbedder));
        index.upsert(&[chunk("old", 0, "study_guide")]).await.unwrap();
        index.upsert(&[chunk("new", 0, "study_guide")]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
        let results = index.search("new", 1, None).await.unwrap();
        assert_eq!(results[0].text, "new");
    }
}
