//! Vector index selection.
//!
//! | `index.provider` | Backend |
//! |------------------|---------|
//! | `"sqlite"` | [`SqliteIndex`] at `index.path` |
//! | `"pinecone"` | [`PineconeIndex`] named `index.name` |
//! | `"memory"` | [`InMemoryIndex`] (empty at start, lost on exit) |

use anyhow::{bail, Result};
use std::sync::Arc;

use study_partner_core::embedding::Embedder;
use study_partner_core::index::memory::InMemoryIndex;
use study_partner_core::index::VectorIndex;

use crate::config::Config;
use crate::pinecone::{self, PineconeControl, PineconeIndex};
use crate::sqlite_index::SqliteIndex;

/// Open the configured index for querying.
pub async fn open_index(
    config: &Config,
    embedder: Arc<dyn Embedder>,
) -> Result<Arc<dyn VectorIndex>> {
    let batch_size = config.embedding.batch_size;
    match config.index.provider.as_str() {
        "sqlite" => Ok(Arc::new(
            SqliteIndex::open(&config.index.path, embedder, batch_size).await?,
        )),
        "pinecone" => Ok(Arc::new(
            PineconeIndex::connect(&config.index, embedder, batch_size).await?,
        )),
        "memory" => Ok(Arc::new(InMemoryIndex::new(embedder))),
        other => bail!("Unknown index provider: {}", other),
    }
}

/// Open the configured index for writing, creating it first when the
/// backend needs that (a missing Pinecone index is created as a serverless
/// cosine index sized to the embedding model).
pub async fn prepare_index(
    config: &Config,
    embedder: Arc<dyn Embedder>,
) -> Result<Arc<dyn VectorIndex>> {
    if config.index.provider != "pinecone" || config.index.host.is_some() {
        return open_index(config, embedder).await;
    }

    let api_key = pinecone::api_key_from_env()?;
    let host = PineconeControl::new(pinecone::CONTROL_PLANE_URL, api_key.clone())?
        .ensure_index(
            &config.index.name,
            embedder.dims(),
            &config.index.cloud,
            &config.index.region,
        )
        .await?;
    Ok(Arc::new(
        PineconeIndex::new(&host, api_key, embedder, config.embedding.batch_size)?
            .with_max_retries(config.index.max_retries),
    ))
}
