//! The study pipeline.
//!
//! [`StudyPipeline`] is the single entry point used by the HTTP server and
//! the CLI. Every operation follows the same path: read session history,
//! retrieve documents, assemble a prompt, call the generator once, record
//! the exchange, and return a structured result.
//!
//! Collaborators are injected as trait objects:
//!
//! | Collaborator | Trait |
//! |--------------|-------|
//! | Retrieval | [`VectorIndex`] |
//! | Text generation | [`AnswerGenerator`] |
//! | Conversation history | [`SessionStore`] |
//! | Issued quizzes | [`QuizStore`] |
//!
//! Collaborator failures are reported as [`StudyError::Retrieval`],
//! [`StudyError::Generation`] or [`StudyError::Store`]. Nothing is written
//! to history when an operation fails.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::error::StudyError;
use crate::generate::AnswerGenerator;
use crate::history::{SessionStore, DEFAULT_MAX_HISTORY};
use crate::index::{SearchFilter, VectorIndex};
use crate::models::{
    QueryResult, Quiz, QuizQuestion, QuizResponse, QuizResult, RetrievedDocument, SessionInfo,
    SourceSummary,
};
use crate::prompt::{self, DetailLevel, DEFAULT_ANSWER_EXCERPT, DEFAULT_HISTORY_WINDOW};
use crate::quiz::{self, QuizStore};
use crate::topics::SESSION_TOPIC_KEYWORDS;

/// Largest retrieval depth accepted by [`StudyPipeline::query`].
pub const MAX_TOP_K: usize = 10;
/// Retrieval depth for concept explanations.
pub const EXPLAIN_TOP_K: usize = 6;
/// Retrieval depth for service comparisons.
pub const COMPARE_TOP_K: usize = 8;
/// Candidates retrieved per requested quiz question.
pub const QUIZ_CANDIDATE_FACTOR: usize = 3;

const QUIZ_DOC_TYPE: &str = "questions";
const DEFAULT_QUIZ_TOPIC: &str = "General AWS";
const DEFAULT_QUIZ_DIFFICULTY: &str = "medium";
const UNKNOWN: &str = "unknown";

/// Tunables for [`StudyPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Entries kept per session by the history store.
    pub max_history: usize,
    /// Prior exchanges rendered into each prompt.
    pub history_window: usize,
    /// Characters of each prior answer rendered into a prompt.
    pub answer_excerpt_chars: usize,
    /// Characters of each retrieved document returned as a source.
    pub source_excerpt_chars: usize,
    pub default_top_k: usize,
    /// Generate a reference answer key alongside each quiz.
    pub answer_key: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            history_window: DEFAULT_HISTORY_WINDOW,
            answer_excerpt_chars: DEFAULT_ANSWER_EXCERPT,
            source_excerpt_chars: 300,
            default_top_k: 5,
            answer_key: true,
        }
    }
}

pub struct StudyPipeline {
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn AnswerGenerator>,
    sessions: Arc<dyn SessionStore>,
    quizzes: Arc<dyn QuizStore>,
    options: PipelineOptions,
}

impl StudyPipeline {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn AnswerGenerator>,
        sessions: Arc<dyn SessionStore>,
        quizzes: Arc<dyn QuizStore>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            index,
            generator,
            sessions,
            quizzes,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn quizzes(&self) -> &Arc<dyn QuizStore> {
        &self.quizzes
    }

    /// Answer a question using retrieved context and recent session history.
    ///
    /// A missing or empty `session_id` starts a new session. `top_k` defaults
    /// to [`PipelineOptions::default_top_k`] and must be in `1..=MAX_TOP_K`.
    pub async fn query(
        &self,
        question: &str,
        session_id: Option<&str>,
        top_k: Option<usize>,
        include_history: bool,
    ) -> Result<QueryResult, StudyError> {
        let started = Instant::now();

        if question.trim().is_empty() {
            return Err(StudyError::InvalidInput("question must not be empty".into()));
        }
        let top_k = top_k.unwrap_or(self.options.default_top_k);
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(StudyError::InvalidInput(format!(
                "top_k must be between 1 and {}",
                MAX_TOP_K
            )));
        }

        let session_id = match session_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let history_block = if include_history {
            let history = self
                .sessions
                .get(&session_id)
                .await
                .map_err(StudyError::Store)?;
            prompt::render_history(
                &history,
                self.options.history_window,
                self.options.answer_excerpt_chars,
            )
        } else {
            String::new()
        };

        let docs = self
            .index
            .search(question, top_k, None)
            .await
            .map_err(StudyError::Retrieval)?;

        let context = prompt::build_context(&docs);
        let full_prompt = prompt::assemble_query_prompt(&context, &history_block, question);

        let answer = self
            .generator
            .generate(&full_prompt)
            .await
            .map_err(StudyError::Generation)?;

        let sources = self.summarize_sources(&docs);

        self.sessions
            .add(&session_id, question, &answer)
            .await
            .map_err(StudyError::Store)?;

        Ok(QueryResult {
            question: question.to_string(),
            answer,
            num_sources: sources.len(),
            sources,
            session_id,
            processing_time_ms: elapsed_ms(started),
        })
    }

    /// Explain a concept at the requested depth in a fresh session.
    pub async fn explain_concept(
        &self,
        concept: &str,
        detail_level: DetailLevel,
    ) -> Result<QueryResult, StudyError> {
        if concept.trim().is_empty() {
            return Err(StudyError::InvalidInput("concept must not be empty".into()));
        }
        let question = prompt::explain_question(concept, detail_level);
        self.query(&question, None, Some(EXPLAIN_TOP_K), true).await
    }

    /// Compare two services, optionally focusing on specific aspects.
    pub async fn compare_services(
        &self,
        service1: &str,
        service2: &str,
        aspects: &[String],
    ) -> Result<QueryResult, StudyError> {
        if service1.trim().is_empty() || service2.trim().is_empty() {
            return Err(StudyError::InvalidInput(
                "both services must be named".into(),
            ));
        }
        let question = prompt::compare_question(service1, service2, aspects);
        self.query(&question, None, Some(COMPARE_TOP_K), true).await
    }

    /// Build a practice quiz from indexed practice-test chunks.
    ///
    /// Returns at most `num_questions` questions; fewer when the index holds
    /// fewer candidates. The quiz and its answer key are stored before the
    /// response is returned.
    pub async fn generate_quiz(
        &self,
        topic: Option<&str>,
        num_questions: usize,
        difficulty: Option<&str>,
    ) -> Result<QuizResponse, StudyError> {
        if num_questions == 0 {
            return Err(StudyError::InvalidInput(
                "num_questions must be at least 1".into(),
            ));
        }
        let topic = topic.map(str::trim).filter(|t| !t.is_empty());
        let difficulty = difficulty.map(str::trim).filter(|d| !d.is_empty());

        let search_query = prompt::quiz_search_query(topic, difficulty);
        let filter = SearchFilter::doc_type(QUIZ_DOC_TYPE);
        let docs = self
            .index
            .search(
                &search_query,
                num_questions * QUIZ_CANDIDATE_FACTOR,
                Some(&filter),
            )
            .await
            .map_err(StudyError::Retrieval)?;

        let topic_name = topic.unwrap_or(DEFAULT_QUIZ_TOPIC).to_string();
        let questions: Vec<QuizQuestion> = docs
            .into_iter()
            .take(num_questions)
            .enumerate()
            .map(|(i, doc)| QuizQuestion {
                id: format!("q{}", i + 1),
                question: doc.text,
                topic: topic_name.clone(),
                difficulty: difficulty.unwrap_or(DEFAULT_QUIZ_DIFFICULTY).to_string(),
                source: doc.filename.unwrap_or_else(|| UNKNOWN.to_string()),
            })
            .collect();

        let answer_key = if self.options.answer_key && !questions.is_empty() {
            let pairs: Vec<(String, String)> = questions
                .iter()
                .map(|q| (q.id.clone(), q.question.clone()))
                .collect();
            let reply = self
                .generator
                .generate(&prompt::answer_key_prompt(&pairs))
                .await
                .map_err(StudyError::Generation)?;
            let ids: Vec<&str> = questions.iter().map(|q| q.id.as_str()).collect();
            quiz::parse_answer_key(&reply, &ids)
        } else {
            Vec::new()
        };

        let quiz = Quiz {
            quiz_id: Uuid::new_v4().to_string(),
            topic: topic_name,
            questions,
            answer_key,
        };
        let response = QuizResponse::from(&quiz);
        self.quizzes.put(quiz).await.map_err(StudyError::Store)?;
        Ok(response)
    }

    /// Grade answers for a previously generated quiz.
    pub async fn submit_quiz(
        &self,
        quiz_id: &str,
        answers: &HashMap<String, String>,
    ) -> Result<QuizResult, StudyError> {
        quiz::submit_answers(self.quizzes.as_ref(), quiz_id, answers).await
    }

    /// Summarize a session's history.
    pub async fn session_info(&self, session_id: &str) -> Result<SessionInfo, StudyError> {
        let history = self
            .sessions
            .get(session_id)
            .await
            .map_err(StudyError::Store)?;

        let (first, last) = match (history.first(), history.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp),
            _ => {
                return Ok(SessionInfo {
                    session_id: session_id.to_string(),
                    exists: false,
                    questions_asked: None,
                    topics_covered: None,
                    first_question_time: None,
                    last_active: None,
                })
            }
        };

        let topics: BTreeSet<String> = history
            .iter()
            .flat_map(|entry| {
                let lower = entry.question.to_lowercase();
                SESSION_TOPIC_KEYWORDS
                    .iter()
                    .filter(move |kw| lower.contains(*kw))
                    .map(|kw| kw.to_uppercase())
                    .collect::<Vec<_>>()
            })
            .collect();

        Ok(SessionInfo {
            session_id: session_id.to_string(),
            exists: true,
            questions_asked: Some(history.len()),
            topics_covered: Some(topics.into_iter().collect()),
            first_question_time: Some(first),
            last_active: Some(last),
        })
    }

    /// Forget a session's history. Unknown sessions are ignored.
    pub async fn clear_session(&self, session_id: &str) -> Result<(), StudyError> {
        self.sessions
            .clear(session_id)
            .await
            .map_err(StudyError::Store)
    }

    fn summarize_sources(&self, docs: &[RetrievedDocument]) -> Vec<SourceSummary> {
        docs.iter()
            .map(|doc| SourceSummary {
                text: format!(
                    "{}...",
                    prompt::truncate_chars(&doc.text, self.options.source_excerpt_chars)
                ),
                source: doc.source.clone().unwrap_or_else(|| UNKNOWN.to_string()),
                doc_type: doc.doc_type.clone().unwrap_or_else(|| UNKNOWN.to_string()),
                chunk_id: doc.chunk_id.unwrap_or(-1),
                relevance_score: 1.0 - 0.1 * doc.rank as f64,
                similarity: doc.score,
            })
            .collect()
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    let ms = started.elapsed().as_secs_f64() * 1000.0;
    (ms * 100.0).round() / 100.0
}
