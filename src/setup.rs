//! Wiring of concrete collaborators into a [`StudyPipeline`].

use anyhow::{Context, Result};
use std::sync::Arc;

use study_partner_core::generate::AnswerGenerator;
use study_partner_core::history::InMemorySessionStore;
use study_partner_core::quiz::InMemoryQuizStore;
use study_partner_core::StudyPipeline;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::index::open_index;
use crate::llm::OpenAiGenerator;

/// Build the pipeline described by `config`: embedder, vector index, chat
/// model and fresh in-memory session and quiz stores.
pub async fn build_pipeline(config: &Config) -> Result<StudyPipeline> {
    let embedder = create_embedder(&config.embedding).context("Failed to create embedder")?;
    let index = open_index(config, embedder)
        .await
        .context("Failed to open vector index")?;
    let generator: Arc<dyn AnswerGenerator> = Arc::new(
        OpenAiGenerator::from_env(&config.llm).context("Failed to create answer generator")?,
    );

    tracing::info!(
        "Study pipeline ready (index: {}, model: {})",
        index.name(),
        generator.model_name()
    );

    Ok(StudyPipeline::new(
        index,
        generator,
        Arc::new(InMemorySessionStore::new(config.study.max_history)),
        Arc::new(InMemoryQuizStore::new()),
        config.pipeline_options(),
    ))
}
