//! Ingestion: PDF → chunks → JSON → vector index.
//!
//! Ingestion runs in two resumable steps:
//!
//! 1. [`process_directory`] extracts and chunks every PDF in a directory and
//!    writes `<stem>_chunks.json` per file plus a combined `all_chunks.json`.
//! 2. [`upload_chunks`] cleans chunk text and upserts it into the vector
//!    index in fixed-size batches. A failed batch reports the offset to pass
//!    as `start_from` to resume.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use study_partner_core::chunk::{clean_text, Chunker};
use study_partner_core::index::VectorIndex;
use study_partner_core::models::{Chunk, ChunkMetadata};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract;
use crate::index::prepare_index;

pub const ALL_CHUNKS_FILE: &str = "all_chunks.json";

/// Provenance for a file, decided by its name: files mentioning `practice`
/// or `test` hold practice questions, everything else is study material.
pub fn classify(filename: &str) -> ChunkMetadata {
    let lower = filename.to_lowercase();
    let (source, doc_type) = if lower.contains("practice") || lower.contains("test") {
        ("practice_test", "questions")
    } else {
        ("aws_certification_guide", "study_guide")
    };
    ChunkMetadata {
        source: source.to_string(),
        doc_type: doc_type.to_string(),
        filename: filename.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct ProcessSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub total_chunks: usize,
    pub all_chunks_path: PathBuf,
}

fn pdf_files(raw_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(raw_dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect()
}

/// Extract, classify and chunk one PDF.
pub fn process_pdf(path: &Path, chunker: &Chunker) -> Result<Vec<Chunk>> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("Invalid file name: {}", path.display()))?;
    let text = extract::extract_pdf_file(path)?;
    tracing::info!("Extracted {} characters from {}", text.chars().count(), filename);
    Ok(chunker.chunk_text(&text, &classify(&filename)))
}

/// Chunk every PDF in `raw_dir` and write the JSON outputs into `out_dir`.
///
/// Files that fail extraction are logged and skipped. It is an error for
/// `raw_dir` to contain no PDFs at all.
pub fn process_directory(raw_dir: &Path, out_dir: &Path, chunker: &Chunker) -> Result<ProcessSummary> {
    let files = pdf_files(raw_dir);
    if files.is_empty() {
        bail!("No PDF files found in {}", raw_dir.display());
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    tracing::info!("Found {} PDF file(s) to process", files.len());

    let mut summary = ProcessSummary::default();
    let mut all_chunks: Vec<Chunk> = Vec::new();

    for path in &files {
        let chunks = match process_pdf(path, chunker) {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::error!("Error processing {}: {:#}", path.display(), e);
                summary.files_failed += 1;
                continue;
            }
        };

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let output = out_dir.join(format!("{}_chunks.json", stem));
        save_chunks(&chunks, &output)?;
        tracing::info!("Saved {} chunks to {}", chunks.len(), output.display());

        summary.files_processed += 1;
        all_chunks.extend(chunks);
    }

    if all_chunks.is_empty() {
        bail!("No chunks were created from {}", raw_dir.display());
    }

    let all_path = out_dir.join(ALL_CHUNKS_FILE);
    save_chunks(&all_chunks, &all_path)?;
    summary.total_chunks = all_chunks.len();
    summary.all_chunks_path = all_path;
    Ok(summary)
}

pub fn save_chunks(chunks: &[Chunk], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(chunks)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read chunks file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse chunks file: {}", path.display()))
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    /// Chunks left empty after cleaning.
    pub skipped: usize,
    pub batches: usize,
}

/// Upload `chunks[start_from..]` in batches of `batch_size`.
pub async fn upload_chunks(
    index: &dyn VectorIndex,
    chunks: &[Chunk],
    batch_size: usize,
    start_from: usize,
) -> Result<UploadSummary> {
    if batch_size == 0 {
        bail!("batch size must be >= 1");
    }
    if start_from > chunks.len() {
        bail!(
            "start_from ({}) is past the end of the {} chunks",
            start_from,
            chunks.len()
        );
    }

    let total = chunks.len();
    let total_batches = total.div_ceil(batch_size);
    if start_from > 0 {
        tracing::info!("Resuming upload from chunk {}", start_from + 1);
    }

    let mut summary = UploadSummary::default();
    let mut offset = start_from;
    while offset < total {
        let end = (offset + batch_size).min(total);
        let batch_num = offset / batch_size + 1;

        let cleaned: Vec<Chunk> = chunks[offset..end]
            .iter()
            .map(|c| Chunk {
                text: clean_text(&c.text),
                ..c.clone()
            })
            .filter(|c| !c.text.is_empty())
            .collect();
        summary.skipped += (end - offset) - cleaned.len();

        let written = index.upsert(&cleaned).await.with_context(|| {
            format!(
                "Batch {}/{} (chunks {}-{}) failed; resume with --start-from {}",
                batch_num,
                total_batches,
                offset + 1,
                end,
                offset
            )
        })?;
        tracing::info!(
            "Batch {}/{}: chunks {}-{} uploaded",
            batch_num,
            total_batches,
            offset + 1,
            end
        );

        summary.uploaded += written;
        summary.batches += 1;
        offset = end;
    }

    Ok(summary)
}

/// `study process`: chunk the PDFs in `raw_dir` into JSON files.
pub fn run_process(config: &Config, raw_dir: &Path, out_dir: &Path) -> Result<PathBuf> {
    let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
    let summary = process_directory(raw_dir, out_dir, &chunker)?;

    println!("Processing complete.");
    println!("  files processed: {}", summary.files_processed);
    if summary.files_failed > 0 {
        println!("  files failed: {}", summary.files_failed);
    }
    println!("  total chunks: {}", summary.total_chunks);
    println!("  output: {}", summary.all_chunks_path.display());
    Ok(summary.all_chunks_path)
}

/// `study upload`: create the index if needed and upload a chunks file.
pub async fn run_upload(
    config: &Config,
    file: &Path,
    batch_size: Option<usize>,
    start_from: usize,
) -> Result<()> {
    let chunks = load_chunks(file)?;
    if chunks.is_empty() {
        bail!("No chunks found in {}", file.display());
    }
    tracing::info!("Loaded {} chunks from {}", chunks.len(), file.display());

    let embedder = create_embedder(&config.embedding)?;
    let index = prepare_index(config, embedder).await?;
    let batch_size = batch_size.unwrap_or(config.index.upload_batch_size);

    let summary = upload_chunks(index.as_ref(), &chunks, batch_size, start_from).await?;
    let total = index.count().await?;

    println!("Upload complete.");
    println!("  uploaded: {}", summary.uploaded);
    if summary.skipped > 0 {
        println!("  skipped (empty after cleaning): {}", summary.skipped);
    }
    println!("  batches: {}", summary.batches);
    println!("  index total: {}", total);
    Ok(())
}

/// `study ingest`: process then upload with default paths.
pub async fn run_ingest(config: &Config, raw_dir: &Path, out_dir: &Path) -> Result<()> {
    let all_chunks = run_process(config, raw_dir, out_dir)?;
    run_upload(config, &all_chunks, None, 0).await
}
