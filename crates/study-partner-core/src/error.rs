use thiserror::Error;

/// Failures surfaced by [`StudyPipeline`](crate::pipeline::StudyPipeline).
///
/// Collaborator errors (index, generator) are carried as `anyhow::Error`
/// with their original message; callers only distinguish client errors
/// from everything else.
#[derive(Debug, Error)]
pub enum StudyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("Quiz {0} not found. Generate a quiz first.")]
    QuizNotFound(String),

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    #[error("generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("store failed: {0}")]
    Store(#[source] anyhow::Error),
}

impl StudyError {
    /// True for errors caused by the caller rather than a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StudyError::InvalidInput(_) | StudyError::QuizNotFound(_))
    }
}
