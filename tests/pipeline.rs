//! End-to-end pipeline behaviour over an in-memory index.
//!
//! The embedder is a bag-of-letters model and the generator echoes a fixed
//! answer, so retrieval and grading are deterministic without any network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use study_partner_core::embedding::Embedder;
use study_partner_core::generate::AnswerGenerator;
use study_partner_core::history::InMemorySessionStore;
use study_partner_core::index::memory::InMemoryIndex;
use study_partner_core::index::VectorIndex;
use study_partner_core::models::{Chunk, ChunkMetadata};
use study_partner_core::prompt::DetailLevel;
use study_partner_core::quiz::InMemoryQuizStore;
use study_partner_core::{PipelineOptions, StudyError, StudyPipeline};

// ─── Helpers ────────────────────────────────────────────────────────

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

/// Records every prompt. Answer-key prompts get `qN | a` lines back.
#[derive(Default)]
struct StubGenerator {
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl AnswerGenerator for StubGenerator {
    fn model_name(&self) -> &str {
        "stub"
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.trim_end().ends_with("Answers:") {
            let lines: Vec<String> = (1..=20)
                .map(|i| format!("q{} | a | Option A is correct.", i))
                .collect();
            return Ok(lines.join("\n"));
        }
        Ok("Amazon EC2 provides resizable compute capacity.".to_string())
    }
}

fn chunk(text: &str, id: i64, doc_type: &str) -> Chunk {
    Chunk {
        text: text.to_string(),
        chunk_id: id,
        metadata: ChunkMetadata {
            source: if doc_type == "questions" {
                "practice_test".to_string()
            } else {
                "aws_certification_guide".to_string()
            },
            doc_type: doc_type.to_string(),
            filename: format!("{}.pdf", doc_type),
        },
    }
}

async fn pipeline_with(chunks: &[Chunk]) -> (StudyPipeline, Arc<StubGenerator>) {
    let index = Arc::new(InMemoryIndex::new(Arc::new(LetterEmbedder)));
    index.upsert(chunks).await.unwrap();
    let generator = Arc::new(StubGenerator::default());
    let pipeline = StudyPipeline::new(
        index,
        generator.clone(),
        Arc::new(InMemorySessionStore::new(5)),
        Arc::new(InMemoryQuizStore::new()),
        PipelineOptions::default(),
    );
    (pipeline, generator)
}

fn corpus() -> Vec<Chunk> {
    let mut chunks = vec![
        chunk("Amazon EC2 instances provide compute capacity", 0, "study_guide"),
        chunk("Amazon S3 stores objects in buckets", 1, "study_guide"),
        chunk("VPC peering connects two virtual private clouds", 2, "study_guide"),
        chunk("IAM policies grant permissions to principals", 3, "study_guide"),
        chunk("Lambda runs code without servers", 4, "study_guide"),
        chunk("RDS manages relational databases", 5, "study_guide"),
        chunk("CloudFront caches content at edge locations", 6, "study_guide"),
    ];
    for i in 0..4 {
        chunks.push(chunk(
            &format!("Which EC2 purchasing option fits scenario {}? a) On-Demand b) Spot", i),
            100 + i,
            "questions",
        ));
    }
    chunks
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_query_returns_top_k_sources_with_decreasing_relevance() {
    let (pipeline, _) = pipeline_with(&corpus()).await;

    let result = pipeline
        .query("What is Amazon EC2?", None, Some(5), true)
        .await
        .unwrap();

    assert_eq!(result.num_sources, 5);
    assert_eq!(result.sources.len(), 5);
    for pair in result.sources.windows(2) {
        assert!(pair[0].relevance_score > pair[1].relevance_score);
    }
    assert!(!result.session_id.is_empty());
    assert!(result.processing_time_ms >= 0.0);
}

#[tokio::test]
async fn test_query_with_small_corpus_returns_what_exists() {
    let (pipeline, _) = pipeline_with(&corpus()[..2]).await;
    let result = pipeline
        .query("What is Amazon S3?", None, Some(5), false)
        .await
        .unwrap();
    assert_eq!(result.num_sources, 2);
}

#[tokio::test]
async fn test_follow_up_questions_see_history() {
    let (pipeline, generator) = pipeline_with(&corpus()).await;

    let first = pipeline
        .query("What is Amazon EC2?", Some("study-1"), None, true)
        .await
        .unwrap();
    assert_eq!(first.session_id, "study-1");

    pipeline
        .query("How is it billed?", Some("study-1"), None, true)
        .await
        .unwrap();
    let prompt = generator.last_prompt();
    assert!(prompt.contains("Previous conversation:"));
    assert!(prompt.contains("Q: What is Amazon EC2?"));
    assert!(prompt.contains("Current question: How is it billed?"));
}

#[tokio::test]
async fn test_history_is_bounded_and_clear_is_idempotent() {
    let (pipeline, _) = pipeline_with(&corpus()).await;

    for i in 0..8 {
        pipeline
            .query(&format!("Question {} about S3", i), Some("s"), None, true)
            .await
            .unwrap();
    }
    let info = pipeline.session_info("s").await.unwrap();
    assert!(info.exists);
    assert_eq!(info.questions_asked, Some(5));
    assert_eq!(info.topics_covered, Some(vec!["S3".to_string()]));

    pipeline.clear_session("s").await.unwrap();
    pipeline.clear_session("s").await.unwrap();
    let info = pipeline.session_info("s").await.unwrap();
    assert!(!info.exists);
    assert_eq!(info.questions_asked, None);
}

#[tokio::test]
async fn test_brief_explanation_prompt() {
    let (pipeline, generator) = pipeline_with(&corpus()).await;

    pipeline
        .explain_concept("VPC peering", DetailLevel::parse("brief"))
        .await
        .unwrap();
    let prompt = generator.last_prompt();
    assert!(prompt.contains("concise 2-3 sentence"));
    assert!(!prompt.contains("Best practices"));
    assert!(!prompt.contains("Exam tips"));
}

#[tokio::test]
async fn test_compare_mentions_both_services() {
    let (pipeline, generator) = pipeline_with(&corpus()).await;

    let result = pipeline
        .compare_services("S3", "EBS", &["cost".to_string()])
        .await
        .unwrap();
    assert!(result.num_sources > 0);
    let prompt = generator.last_prompt();
    assert!(prompt.contains("S3"));
    assert!(prompt.contains("EBS"));
    assert!(prompt.contains("cost"));
}

#[tokio::test]
async fn test_quiz_generation_never_exceeds_request() {
    let (pipeline, _) = pipeline_with(&corpus()).await;

    let quiz = pipeline.generate_quiz(Some("EC2"), 3, None).await.unwrap();
    assert_eq!(quiz.total_questions, 3);
    assert!(quiz.questions.iter().all(|q| q.source == "questions.pdf"));

    // Only four practice questions exist.
    let quiz = pipeline.generate_quiz(Some("EC2"), 10, None).await.unwrap();
    assert_eq!(quiz.total_questions, 4);
}

#[tokio::test]
async fn test_generate_then_submit() {
    let (pipeline, _) = pipeline_with(&corpus()).await;

    let quiz = pipeline.generate_quiz(Some("EC2"), 3, None).await.unwrap();
    let answers: HashMap<String, String> = quiz
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let answer = if i == 0 { "b) Spot" } else { "a) On-Demand" };
            (q.id.clone(), answer.to_string())
        })
        .collect();

    let result = pipeline.submit_quiz(&quiz.quiz_id, &answers).await.unwrap();
    assert_eq!(result.total_questions, 3);
    assert_eq!(result.correct_answers, 2);
    assert_eq!(result.score, 66.67);
    assert!(!result.passed);
    assert_eq!(result.results[1].explanation, "Option A is correct.");
}

#[tokio::test]
async fn test_submit_unknown_quiz_is_not_found() {
    let (pipeline, _) = pipeline_with(&corpus()).await;
    let err = pipeline
        .submit_quiz("does-not-exist", &HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::QuizNotFound(_)));
    assert_eq!(
        err.to_string(),
        "Quiz does-not-exist not found. Generate a quiz first."
    );
}
