//! Prompt assembly.
//!
//! Builds the exact text sent to the answer generator: the tutor persona,
//! retrieved context, a short window of prior conversation, and the current
//! question. Concept explanations and service comparisons are expressed as
//! templated questions that go through the same query prompt.

use crate::models::{HistoryEntry, RetrievedDocument};

/// Tutor persona placed at the top of every query prompt.
pub const SYSTEM_PROMPT: &str = "You are an expert AWS certification study partner.
Your role is to help students prepare for AWS certifications by:
- Providing clear, accurate answers based on official AWS documentation
- Explaining complex concepts in simple terms
- Offering relevant examples and use cases
- Helping students understand why answers are correct or incorrect
- Being encouraging and supportive

Always base your answers on the provided context from study materials.
If you're unsure, say so rather than making up information.";

/// Number of prior exchanges rendered into a prompt by default.
pub const DEFAULT_HISTORY_WINDOW: usize = 3;

/// Characters of each prior answer rendered into a prompt by default.
pub const DEFAULT_ANSWER_EXCERPT: usize = 100;

/// Render the trailing `window` history entries as a prompt block.
///
/// Returns an empty string when there is nothing to render.
pub fn render_history(history: &[HistoryEntry], window: usize, excerpt_chars: usize) -> String {
    if history.is_empty() || window == 0 {
        return String::new();
    }
    let start = history.len().saturating_sub(window);
    let mut block = String::from("\n\nPrevious conversation:\n");
    for entry in &history[start..] {
        block.push_str("Q: ");
        block.push_str(&entry.question);
        block.push_str("\nA: ");
        block.push_str(&truncate_chars(&entry.answer, excerpt_chars));
        block.push_str("...\n");
    }
    block
}

/// Join retrieved texts in rank order.
pub fn build_context(docs: &[RetrievedDocument]) -> String {
    docs.iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Assemble the full query prompt.
pub fn assemble_query_prompt(context: &str, history_block: &str, question: &str) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\nContext from AWS study materials:\n{context}\n\n{history_block}\n\nCurrent question: {question}\n\nProvide a clear, helpful answer:"
    )
}

/// Depth of a concept explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    Brief,
    #[default]
    Medium,
    Detailed,
}

impl DetailLevel {
    /// Parse a level name. Unrecognized names fall back to [`DetailLevel::Medium`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "brief" => DetailLevel::Brief,
            "detailed" => DetailLevel::Detailed,
            _ => DetailLevel::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Brief => "brief",
            DetailLevel::Medium => "medium",
            DetailLevel::Detailed => "detailed",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            DetailLevel::Brief => "Provide a concise 2-3 sentence explanation.",
            DetailLevel::Medium => {
                "Provide a comprehensive explanation with key features and use cases."
            }
            DetailLevel::Detailed => {
                "Provide an in-depth explanation with features, use cases, best practices, and exam tips."
            }
        }
    }
}

/// Question text for a concept explanation.
pub fn explain_question(concept: &str, level: DetailLevel) -> String {
    let extra = if level == DetailLevel::Detailed {
        "\n4. Best practices\n5. Exam tips"
    } else {
        ""
    };
    format!(
        "Explain the AWS concept: {concept}\n\n{}\n\nInclude:\n1. What it is\n2. Key features\n3. Common use cases{extra}\n\nKeep the explanation clear and educational.",
        level.instruction()
    )
}

/// Question text for a side-by-side service comparison.
pub fn compare_question(service1: &str, service2: &str, aspects: &[String]) -> String {
    let aspect_text = if aspects.is_empty() {
        String::new()
    } else {
        format!("\nFocus on these aspects: {}", aspects.join(", "))
    };
    format!(
        "Compare {service1} and {service2}.{aspect_text}\n\nInclude:\n1. Key differences\n2. When to use each\n3. Pricing considerations\n4. Performance characteristics\n5. Common use cases\n\nProvide a clear comparison table format."
    )
}

/// Retrieval query used to find practice questions.
pub fn quiz_search_query(topic: Option<&str>, difficulty: Option<&str>) -> String {
    let mut query = match topic {
        Some(t) => format!("practice questions about {}", t),
        None => "AWS certification practice questions".to_string(),
    };
    if let Some(d) = difficulty {
        query.push(' ');
        query.push_str(d);
    }
    query
}

/// Prompt asking the generator for one reference answer per question.
///
/// The reply is expected as one line per question:
/// `q1 | <answer> | <one-sentence explanation>`.
pub fn answer_key_prompt(questions: &[(String, String)]) -> String {
    let mut prompt = String::from(
        "You are grading AWS certification practice questions. For each question below, give the correct answer and a one-sentence explanation.\n\
         If the question has lettered options, answer with the option letter only.\n\
         Reply with exactly one line per question in the format:\n\
         <id> | <answer> | <explanation>\n\n",
    );
    for (id, question) in questions {
        prompt.push_str("[");
        prompt.push_str(id);
        prompt.push_str("]\n");
        prompt.push_str(question.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str("Answers:");
    prompt
}

/// First `max` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
