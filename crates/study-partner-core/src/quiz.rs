//! Quiz storage and grading.
//!
//! Quizzes are issued by the pipeline with a reference answer key and kept
//! in a [`QuizStore`] until the process exits. Grading compares each
//! submitted answer against the key after normalization; it never guesses.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::error::StudyError;
use crate::models::{AnswerKeyEntry, QuestionResult, Quiz, QuizResult};
use crate::prompt::truncate_chars;

/// Minimum score (percent) for a passing quiz.
pub const PASS_THRESHOLD: f64 = 70.0;

const NO_KEY_EXPLANATION: &str = "No answer key is available for this question.";
const DEFAULT_EXPLANATION: &str = "Review AWS documentation for detailed explanation.";
const QUESTION_EXCERPT_CHARS: usize = 100;

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn get(&self, quiz_id: &str) -> Result<Option<Quiz>>;

    /// Store a quiz. Ids are never reused, so this does not overwrite.
    async fn put(&self, quiz: Quiz) -> Result<()>;

    /// Number of stored quizzes.
    async fn count(&self) -> Result<usize>;

    /// Total questions across all stored quizzes.
    async fn total_questions(&self) -> Result<usize>;
}

#[derive(Default)]
pub struct InMemoryQuizStore {
    quizzes: RwLock<HashMap<String, Quiz>>,
}

impl InMemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("quiz store lock poisoned")
}

#[async_trait]
impl QuizStore for InMemoryQuizStore {
    async fn get(&self, quiz_id: &str) -> Result<Option<Quiz>> {
        let quizzes = self.quizzes.read().map_err(|_| poisoned())?;
        Ok(quizzes.get(quiz_id).cloned())
    }

    async fn put(&self, quiz: Quiz) -> Result<()> {
        let mut quizzes = self.quizzes.write().map_err(|_| poisoned())?;
        quizzes.entry(quiz.quiz_id.clone()).or_insert(quiz);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.quizzes.read().map_err(|_| poisoned())?.len())
    }

    async fn total_questions(&self) -> Result<usize> {
        let quizzes = self.quizzes.read().map_err(|_| poisoned())?;
        Ok(quizzes.values().map(|q| q.questions.len()).sum())
    }
}

/// Parse a generator reply of `id | answer | explanation` lines.
///
/// Only ids in `known_ids` are kept, the first line per id wins, and lines
/// without an answer are ignored.
pub fn parse_answer_key(reply: &str, known_ids: &[&str]) -> Vec<AnswerKeyEntry> {
    let mut entries: Vec<AnswerKeyEntry> = Vec::new();
    for line in reply.lines() {
        let mut parts = line.split('|').map(str::trim);
        let raw_id = match parts.next() {
            Some(id) => id,
            None => continue,
        };
        let id = raw_id
            .trim_start_matches(['-', '*', ' '])
            .trim_matches(['[', ']'])
            .trim()
            .to_ascii_lowercase();
        if !known_ids.contains(&id.as_str()) || entries.iter().any(|e| e.question_id == id) {
            continue;
        }
        let answer = match parts.next() {
            Some(a) if !a.is_empty() => a.to_string(),
            _ => continue,
        };
        let explanation = parts
            .next()
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        entries.push(AnswerKeyEntry {
            question_id: id,
            answer,
            explanation,
        });
    }
    entries
}

/// Lower-case, trim, drop trailing punctuation and collapse whitespace.
pub fn normalize_answer(s: &str) -> String {
    let collapsed = s
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(|c: char| c.is_ascii_punctuation() && c != ')')
        .trim_end()
        .to_string()
}

/// Option letter a key refers to: `"b"`, `"b)"` or `"b."` forms.
fn key_letter(normalized_key: &str) -> Option<char> {
    let mut chars = normalized_key.chars();
    let first = chars.next()?;
    if !('a'..='e').contains(&first) {
        return None;
    }
    match chars.next() {
        None => Some(first),
        Some(')') | Some('.') => Some(first),
        _ => None,
    }
}

/// Whether `user` matches the reference answer `key`.
pub fn answers_match(user: &str, key: &str) -> bool {
    let user = normalize_answer(user);
    let key = normalize_answer(key);
    if user.is_empty() || key.is_empty() {
        return false;
    }
    if user == key {
        return true;
    }
    match key_letter(&key) {
        Some(letter) => {
            user == letter.to_string()
                || [')', '.', ' ']
                    .iter()
                    .any(|sep| user.starts_with(&format!("{letter}{sep}")))
        }
        None => false,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Grade a submission against a stored quiz.
///
/// Questions are reported in quiz order. Missing or blank answers are
/// incorrect, as is every question the answer key does not cover.
pub fn grade_quiz(quiz: &Quiz, answers: &HashMap<String, String>) -> QuizResult {
    let mut results = Vec::with_capacity(quiz.questions.len());
    let mut correct = 0;

    for question in &quiz.questions {
        let user_answer = answers.get(&question.id).cloned().unwrap_or_default();
        let key = quiz.key_for(&question.id);

        let (is_correct, explanation) = match key {
            Some(entry) => (
                answers_match(&user_answer, &entry.answer),
                entry
                    .explanation
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string()),
            ),
            None => (false, NO_KEY_EXPLANATION.to_string()),
        };
        if is_correct {
            correct += 1;
        }

        results.push(QuestionResult {
            question_id: question.id.clone(),
            question: format!(
                "{}...",
                truncate_chars(&question.question, QUESTION_EXCERPT_CHARS)
            ),
            user_answer,
            is_correct,
            explanation,
        });
    }

    let total = quiz.questions.len();
    let score = if total == 0 {
        0.0
    } else {
        round2(correct as f64 / total as f64 * 100.0)
    };

    QuizResult {
        quiz_id: quiz.quiz_id.clone(),
        score,
        total_questions: total,
        correct_answers: correct,
        results,
        passed: score >= PASS_THRESHOLD,
    }
}

/// Look up a stored quiz and grade a submission against it.
///
/// Does not need a configured pipeline, only the store the quiz was put in.
pub async fn submit_answers(
    store: &dyn QuizStore,
    quiz_id: &str,
    answers: &HashMap<String, String>,
) -> Result<QuizResult, StudyError> {
    let quiz = store
        .get(quiz_id)
        .await
        .map_err(StudyError::Store)?
        .ok_or_else(|| StudyError::QuizNotFound(quiz_id.to_string()))?;
    Ok(grade_quiz(&quiz, answers))
}
