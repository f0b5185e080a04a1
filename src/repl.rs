//! `study ask`: interactive study session in the terminal.
//!
//! Every question asked in one run shares a session, so follow-up questions
//! see the previous exchanges.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use study_partner_core::models::{QueryResult, QuizResponse};
use study_partner_core::prompt::DetailLevel;
use study_partner_core::StudyPipeline;

use crate::config::Config;
use crate::setup::build_pipeline;

const HELP: &str = "Commands:
  ask <question>        Ask a question (or just type it)
  explain <concept>     Explain a concept
  compare <A> vs <B>    Compare two services
  quiz [topic]          Generate a practice quiz
  help                  Show this help
  quit                  Exit";

#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Ask(String),
    Explain(String),
    Compare(String, String),
    Quiz(Option<String>),
    Help,
    Quit,
    Empty,
    /// A command that could not be parsed, with a usage hint.
    Invalid(&'static str),
}

/// Parse one line of input. Unrecognized input is treated as a question.
pub fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head.to_lowercase().as_str() {
        "quit" | "exit" | "q" if rest.is_empty() => ReplCommand::Quit,
        "help" if rest.is_empty() => ReplCommand::Help,
        "ask" if rest.is_empty() => ReplCommand::Invalid("Usage: ask <question>"),
        "ask" => ReplCommand::Ask(rest.to_string()),
        "explain" if rest.is_empty() => ReplCommand::Invalid("Usage: explain <concept>"),
        "explain" => ReplCommand::Explain(rest.to_string()),
        "compare" => match split_versus(rest) {
            Some((a, b)) => ReplCommand::Compare(a, b),
            None => ReplCommand::Invalid("Usage: compare <service1> vs <service2>"),
        },
        "quiz" if rest.is_empty() => ReplCommand::Quiz(None),
        "quiz" => ReplCommand::Quiz(Some(rest.to_string())),
        _ => ReplCommand::Ask(line.to_string()),
    }
}

fn split_versus(s: &str) -> Option<(String, String)> {
    let words: Vec<&str> = s.split_whitespace().collect();
    let at = words.iter().position(|w| w.eq_ignore_ascii_case("vs"))?;
    if at == 0 || at + 1 == words.len() {
        return None;
    }
    Some((words[..at].join(" "), words[at + 1..].join(" ")))
}

pub async fn run_repl(config: &Config) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let mut session_id: Option<String> = None;

    println!("AWS Study Partner. Type 'help' for commands, 'quit' to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!();
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_command(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Empty => {}
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Invalid(usage) => println!("{}", usage),
            ReplCommand::Ask(question) => {
                match pipeline
                    .query(&question, session_id.as_deref(), None, true)
                    .await
                {
                    Ok(result) => {
                        session_id = Some(result.session_id.clone());
                        print_answer(&result);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            ReplCommand::Explain(concept) => {
                report(pipeline.explain_concept(&concept, DetailLevel::Medium).await)
            }
            ReplCommand::Compare(a, b) => report(pipeline.compare_services(&a, &b, &[]).await),
            ReplCommand::Quiz(topic) => run_quiz(&pipeline, topic.as_deref()).await,
        }
    }

    println!("Good luck with your exam!");
    Ok(())
}

fn report(result: Result<QueryResult, study_partner_core::StudyError>) {
    match result {
        Ok(result) => print_answer(&result),
        Err(e) => println!("Error: {}", e),
    }
}

fn print_answer(result: &QueryResult) {
    println!();
    println!("{}", result.answer);
    if !result.sources.is_empty() {
        let files: Vec<&str> = result.sources.iter().map(|s| s.source.as_str()).collect();
        println!();
        println!(
            "({} sources: {}, {:.0} ms)",
            result.num_sources,
            files.join(", "),
            result.processing_time_ms
        );
    }
}

async fn run_quiz(pipeline: &StudyPipeline, topic: Option<&str>) {
    let quiz = match pipeline.generate_quiz(topic, 3, None).await {
        Ok(quiz) => quiz,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    print_quiz(&quiz);
}

fn print_quiz(quiz: &QuizResponse) {
    if quiz.questions.is_empty() {
        println!("No practice questions found for {}.", quiz.topic);
        return;
    }
    println!();
    println!("Quiz: {} ({} questions)", quiz.topic, quiz.total_questions);
    for (i, q) in quiz.questions.iter().enumerate() {
        println!();
        println!("Question {}:", i + 1);
        println!("{}", q.question.trim());
    }
}
