//! Core data models used throughout Study Partner.
//!
//! These types represent the chunks produced at ingestion time, the
//! documents returned by retrieval, and the request results that flow out
//! of the study pipeline. All of them serialize to the JSON shapes served
//! by the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Logical source (e.g. `"aws_certification_guide"`, `"practice_test"`).
    pub source: String,
    /// Document type used for retrieval filters (`"study_guide"`, `"questions"`).
    pub doc_type: String,
    /// File name the chunk was extracted from.
    pub filename: String,
}

/// A window of document text produced by the chunker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Position of the chunk within its source file, starting at 0.
    pub chunk_id: i64,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Stable identifier used as the primary key in vector indexes.
    pub fn index_id(&self) -> String {
        format!("{}:{}", self.metadata.filename, self.chunk_id)
    }
}

/// A document returned by a vector index search.
///
/// Metadata fields are optional because managed indexes may hold vectors
/// uploaded by other tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub text: String,
    pub source: Option<String>,
    pub doc_type: Option<String>,
    pub filename: Option<String>,
    pub chunk_id: Option<i64>,
    /// Zero-based position in the ranked result list.
    pub rank: usize,
    /// Similarity reported by the index, when it has one.
    pub score: Option<f32>,
}

/// Per-source summary returned with every answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub text: String,
    pub source: String,
    pub doc_type: String,
    pub chunk_id: i64,
    /// Legacy rank-decay score: `1.0 - 0.1 * rank`. Not a similarity.
    pub relevance_score: f64,
    /// Similarity reported by the index, when available.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub similarity: Option<f32>,
}

/// One question/answer exchange recorded for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of a query, concept explanation, or service comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceSummary>,
    pub num_sources: usize,
    pub session_id: String,
    pub processing_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub topic: String,
    pub difficulty: String,
    pub source: String,
}

/// Reference answer for one quiz question. Never sent to clients before grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    pub question_id: String,
    pub answer: String,
    pub explanation: Option<String>,
}

/// A stored quiz. Immutable once issued.
#[derive(Debug, Clone, PartialEq)]
pub struct Quiz {
    pub quiz_id: String,
    pub topic: String,
    pub questions: Vec<QuizQuestion>,
    pub answer_key: Vec<AnswerKeyEntry>,
}

impl Quiz {
    pub fn key_for(&self, question_id: &str) -> Option<&AnswerKeyEntry> {
        self.answer_key
            .iter()
            .find(|entry| entry.question_id == question_id)
    }
}

/// Client-facing view of a freshly generated quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub quiz_id: String,
    pub topic: String,
    pub questions: Vec<QuizQuestion>,
    pub total_questions: usize,
}

impl From<&Quiz> for QuizResponse {
    fn from(quiz: &Quiz) -> Self {
        Self {
            quiz_id: quiz.quiz_id.clone(),
            topic: quiz.topic.clone(),
            questions: quiz.questions.clone(),
            total_questions: quiz.questions.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub question: String,
    pub user_answer: String,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub quiz_id: String,
    pub score: f64,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub results: Vec<QuestionResult>,
    pub passed: bool,
}

/// Summary of a study session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub questions_asked: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub topics_covered: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub first_question_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_active: Option<DateTime<Utc>>,
}

/// Catalog entry for a certification topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}
