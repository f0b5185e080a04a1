//! `study search`: print the nearest chunks for a query.
//!
//! Used as a smoke test after ingestion to check that the index answers
//! with sensible material.

use anyhow::{Context, Result};

use study_partner_core::index::VectorIndex;
use study_partner_core::models::RetrievedDocument;
use study_partner_core::prompt::truncate_chars;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::index::open_index;

const PREVIEW_CHARS: usize = 200;

pub async fn run_search(config: &Config, query: &str, limit: usize) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let embedder = create_embedder(&config.embedding)?;
    let index = open_index(config, embedder).await?;
    let results = search(index.as_ref(), query, limit).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("Query: {}", query);
    for doc in &results {
        println!();
        println!("{}", format_result(doc));
    }
    Ok(())
}

pub async fn search(
    index: &dyn VectorIndex,
    query: &str,
    limit: usize,
) -> Result<Vec<RetrievedDocument>> {
    index
        .search(query, limit.max(1), None)
        .await
        .with_context(|| format!("Search failed for query: {}", query))
}

fn format_result(doc: &RetrievedDocument) -> String {
    let score = doc
        .score
        .map(|s| format!("{:.3}", s))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}. [{}] {} (chunk {}, score {})\n   {}...",
        doc.rank + 1,
        doc.doc_type.as_deref().unwrap_or("unknown"),
        doc.filename.as_deref().unwrap_or("unknown"),
        doc.chunk_id.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
        score,
        truncate_chars(&doc.text, PREVIEW_CHARS).replace('\n', " ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_result_handles_missing_metadata() {
        let doc = RetrievedDocument {
            text: "Amazon S3 offers eleven nines of durability".to_string(),
            source: None,
            doc_type: None,
            filename: None,
            chunk_id: None,
            rank: 0,
            score: None,
        };
        let line = format_result(&doc);
        assert!(line.starts_with("1. [unknown] unknown (chunk -, score -)"));
        assert!(line.contains("eleven nines"));
    }

    #[test]
    fn test_format_result_shows_score() {
        let doc = RetrievedDocument {
            text: "VPC peering".to_string(),
            source: Some("aws_certification_guide".to_string()),
            doc_type: Some("study_guide".to_string()),
            filename: Some("guide.pdf".to_string()),
            chunk_id: Some(7),
            rank: 2,
            score: Some(0.8123),
        };
        assert!(format_result(&doc).starts_with("3. [study_guide] guide.pdf (chunk 7, score 0.812)"));
    }
}
