//! Managed vector index on Pinecone.
//!
//! Talks to the Pinecone REST API directly:
//!
//! | Plane | Call | Purpose |
//! |-------|------|---------|
//! | control (`api.pinecone.io`) | `GET /indexes/{name}` | Resolve the data-plane host |
//! | control | `POST /indexes` | Create a serverless cosine index |
//! | data (`{host}`) | `POST /query` | Nearest-neighbor search |
//! | data | `POST /vectors/upsert` | Store vectors with metadata |
//! | data | `POST /describe_index_stats` | Vector count |
//!
//! Chunk text and provenance are stored in vector metadata under `text`,
//! `source`, `doc_type`, `filename` and `chunk_id`. Vectors written by other
//! tools may lack some of these keys; search reports them as absent.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use study_partner_core::embedding::{embed_query, Embedder};
use study_partner_core::index::{SearchFilter, VectorIndex};
use study_partner_core::models::{Chunk, RetrievedDocument};

use crate::config::IndexConfig;

pub const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const READY_POLL_ATTEMPTS: u32 = 60;

/// Read the Pinecone API key from the environment.
pub fn api_key_from_env() -> Result<String> {
    match std::env::var("PINECONE_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("PINECONE_API_KEY environment variable not set"),
    }
}

fn build_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?)
}

fn with_scheme(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

/// Control-plane client used to create and describe indexes.
pub struct PineconeControl {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PineconeControl {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn describe(&self, name: &str) -> Result<Option<IndexDescription>> {
        let resp = self
            .client
            .get(format!("{}/indexes/{}", self.base_url, name))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Pinecone describe index failed {}: {}", status, body);
        }
        Ok(Some(resp.json().await?))
    }

    async fn create(&self, name: &str, dims: usize, cloud: &str, region: &str) -> Result<()> {
        let body = json!({
            "name": name,
            "dimension": dims,
            "metric": "cosine",
            "spec": {"serverless": {"cloud": cloud, "region": region}},
        });
        let resp = self
            .client
            .post(format!("{}/indexes", self.base_url))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        // 409: created concurrently by someone else
        if !status.is_success() && status.as_u16() != 409 {
            let body = resp.text().await.unwrap_or_default();
            bail!("Pinecone create index failed {}: {}", status, body);
        }
        Ok(())
    }

    /// Make sure the index exists and is ready, returning its data-plane host.
    pub async fn ensure_index(
        &self,
        name: &str,
        dims: usize,
        cloud: &str,
        region: &str,
    ) -> Result<String> {
        if let Some(desc) = self.describe(name).await? {
            tracing::info!("Pinecone index '{}' already exists", name);
            return Ok(desc.host);
        }

        tracing::info!("Creating Pinecone index '{}' ({} dims, {}/{})", name, dims, cloud, region);
        self.create(name, dims, cloud, region).await?;

        for _ in 0..READY_POLL_ATTEMPTS {
            if let Some(desc) = self.describe(name).await? {
                if desc.status.map_or(true, |s| s.ready) {
                    return Ok(desc.host);
                }
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        bail!("Pinecone index '{}' did not become ready", name)
    }

    /// Look up the host of an existing index.
    pub async fn resolve_host(&self, name: &str) -> Result<String> {
        self.describe(name)
            .await?
            .map(|d| d.host)
            .ok_or_else(|| anyhow!("Pinecone index '{}' not found", name))
    }
}

#[derive(Serialize)]
struct UpsertVector {
    id: String,
    values: Vec<f32>,
    metadata: Value,
}

pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    max_retries: u32,
}

impl PineconeIndex {
    pub fn new(
        host: &str,
        api_key: impl Into<String>,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            host: with_scheme(host),
            api_key: api_key.into(),
            embedder,
            batch_size: batch_size.max(1),
            max_retries: 1,
        })
    }

    /// Retries for data-plane calls that fail with 429, 5xx or a network error.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Connect using `[index]` settings, resolving the host through the
    /// control plane when it is not configured.
    pub async fn connect(
        config: &IndexConfig,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Result<Self> {
        let api_key = api_key_from_env()?;
        let host = match &config.host {
            Some(host) => host.clone(),
            None => PineconeControl::new(CONTROL_PLANE_URL, api_key.clone())?
                .resolve_host(&config.name)
                .await
                .context("Failed to resolve Pinecone index host")?,
        };
        Ok(Self::new(&host, api_key, embedder, batch_size)?.with_max_retries(config.max_retries))
    }

    /// POST to the data plane. 429, 5xx and network errors are retried with
    /// exponential backoff; any other 4xx fails at once.
    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.host, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!("retrying {} in {:?} (attempt {})", url, delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!("Pinecone {} error {}", path, status);
                        last_err = Some(anyhow!("Pinecone {} failed {}: {}", path, status, text));
                        continue;
                    }
                    bail!("Pinecone {} failed {}: {}", path, status, text);
                }
                Err(e) => {
                    tracing::warn!("request to {} failed: {}", url, e);
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Pinecone {} failed after retries", path)))
    }
}

fn chunk_metadata(chunk: &Chunk) -> Value {
    json!({
        "text": chunk.text,
        "source": chunk.metadata.source,
        "doc_type": chunk.metadata.doc_type,
        "filename": chunk.metadata.filename,
        "chunk_id": chunk.chunk_id,
    })
}

fn metadata_str(metadata: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    metadata
        .and_then(|m| m.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn metadata_int(metadata: Option<&Map<String, Value>>, key: &str) -> Option<i64> {
    let value = metadata.and_then(|m| m.get(key))?;
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

/// Convert a `/query` response into ranked documents.
///
/// Matches without chunk text are skipped, so ranks stay contiguous from 0.
fn parse_matches(json: &Value) -> Result<Vec<RetrievedDocument>> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .ok_or_else(|| anyhow!("Invalid Pinecone response: missing matches"))?;

    Ok(matches
        .iter()
        .filter_map(|m| {
            let metadata = m.get("metadata").and_then(|v| v.as_object());
            let text = metadata_str(metadata, "text").filter(|t| !t.trim().is_empty())?;
            Some((m, metadata, text))
        })
        .enumerate()
        .map(|(rank, (m, metadata, text))| RetrievedDocument {
            text,
            source: metadata_str(metadata, "source"),
            doc_type: metadata_str(metadata, "doc_type"),
            filename: metadata_str(metadata, "filename"),
            chunk_id: metadata_int(metadata, "chunk_id"),
            rank,
            score: m.get("score").and_then(|s| s.as_f64()).map(|s| s as f32),
        })
        .collect())
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
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
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let mut body = json!({
            "vector": vector,
            "topK": k,
            "includeMetadata": true,
        });
        if let Some(doc_type) = filter.and_then(|f| f.doc_type.as_deref()) {
            body["filter"] = json!({"doc_type": {"$eq": doc_type}});
        }
        let json = self.post("/query", &body).await?;
        parse_matches(&json)
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
            let payload: Vec<UpsertVector> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, values)| UpsertVector {
                    id: chunk.index_id(),
                    values,
                    metadata: chunk_metadata(chunk),
                })
                .collect();
            self.post("/vectors/upsert", &json!({ "vectors": payload }))
                .await?;
            written += batch.len();
        }
        Ok(written)
    }

    async fn count(&self) -> Result<usize> {
        let json = self.post("/describe_index_stats", &json!({})).await?;
        Ok(json
            .get("totalVectorCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_scheme() {
        assert_eq!(
            with_scheme("my-index-abc.svc.pinecone.io"),
            "https://my-index-abc.svc.pinecone.io"
        );
        assert_eq!(with_scheme("http://127.0.0.1:5080/"), "http://127.0.0.1:5080");
    }

    #[test]
    fn test_parse_matches_with_partial_metadata() {
        let json = json!({
            "matches": [
                {
                    "id": "guide.pdf:3",
                    "score": 0.91,
                    "metadata": {
                        "text": "S3 offers eleven nines of durability.",
                        "source": "aws_certification_guide",
                        "doc_type": "study_guide",
                        "filename": "guide.pdf",
                        "chunk_id": 3.0
                    }
                },
                {"id": "no-metadata", "score": 0.7},
                {"id": "blank", "score": 0.6, "metadata": {"text": "  ", "source": "x"}},
                {"id": "foreign", "score": 0.5, "metadata": {"text": "legacy vector"}}
            ]
        });
        let docs = parse_matches(&json).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].chunk_id, Some(3));
        assert_eq!(docs[0].rank, 0);
        assert_eq!(docs[1].rank, 1);
        assert_eq!(docs[1].source, None);
        assert_eq!(docs[1].text, "legacy vector");
        assert!((docs[0].score.unwrap() - 0.91).abs() < 1e-6);
        assert!((docs[1].score.unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_parse_matches_all_without_text() {
        let json = json!({"matches": [{"id": "a", "score": 0.9}, {"id": "b", "metadata": {}}]});
        assert!(parse_matches(&json).unwrap().is_empty());
    }

    #[test]
    fn test_metadata_carries_chunk_fields() {
        let chunk = Chunk {
            text: "VPC peering".to_string(),
            chunk_id: 7,
            metadata: study_partner_core::models::ChunkMetadata {
                source: "practice_test".to_string(),
                doc_type: "questions".to_string(),
                filename: "practice_test_1.pdf".to_string(),
            },
        };
        let metadata = chunk_metadata(&chunk);
        assert_eq!(metadata["chunk_id"], 7);
        assert_eq!(metadata["doc_type"], "questions");
        assert_eq!(metadata["text"], "VPC peering");
    }
}
