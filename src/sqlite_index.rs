//! Local vector index backed by SQLite.
//!
//! Each chunk is stored as one row with its embedding encoded as a
//! little-endian `f32` BLOB. Search embeds the query and scores every
//! candidate row by cosine similarity in process, which is adequate for the
//! few thousand chunks a set of study guides produces.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::Arc;

use study_partner_core::embedding::{
    blob_to_vec, cosine_similarity, embed_query, vec_to_blob, Embedder,
};
use study_partner_core::index::{SearchFilter, VectorIndex};
use study_partner_core::models::{Chunk, RetrievedDocument};

use crate::db;
use crate::migrate;

pub struct SqliteIndex {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl SqliteIndex {
    /// Open the database at `path`, creating the schema if needed.
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>, batch_size: usize) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::with_pool(pool, embedder, batch_size))
    }

    /// Wrap an already migrated pool.
    pub fn with_pool(pool: SqlitePool, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            pool,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    async fn write_rows(&self, chunks: &[Chunk], vectors: Vec<Vec<f32>>) -> Result<()> {
        let model = self.embedder.model_name().to_string();
        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, chunk_id, text, source, doc_type, filename, embedding, model, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    chunk_id = excluded.chunk_id,
                    text = excluded.text,
                    source = excluded.source,
                    doc_type = excluded.doc_type,
                    filename = excluded.filename,
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims
                "#,
            )
            .bind(chunk.index_id())
            .bind(chunk.chunk_id)
            .bind(&chunk.text)
            .bind(&chunk.metadata.source)
            .bind(&chunk.metadata.doc_type)
            .bind(&chunk.metadata.filename)
            .bind(vec_to_blob(&vector))
            .bind(&model)
            .bind(vector.len() as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn name(&self) -> &str {
        "sqlite"
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

        let rows = match filter.and_then(|f| f.doc_type.as_deref()) {
            Some(doc_type) => {
                sqlx::query(
                    "SELECT chunk_id, text, source, doc_type, filename, embedding FROM chunks WHERE doc_type = ?",
                )
                .bind(doc_type)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT chunk_id, text, source, doc_type, filename, embedding FROM chunks")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut scored: Vec<(f32, RetrievedDocument)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                (
                    similarity,
                    RetrievedDocument {
                        text: row.get("text"),
                        source: Some(row.get("source")),
                        doc_type: Some(row.get("doc_type")),
                        filename: Some(row.get("filename")),
                        chunk_id: Some(row.get("chunk_id")),
                        rank: 0,
                        score: Some(similarity),
                    },
                )
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (_, doc))| RetrievedDocument { rank, ..doc })
            .collect())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut written = 0;
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                bail!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }
            self.write_rows(batch, vectors).await?;
            written += batch.len();
        }
        Ok(written)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
