//! Answer generator abstraction.

use anyhow::Result;
use async_trait::async_trait;

/// A hosted language model that turns an assembled prompt into text.
///
/// Implementations perform a single logical call per invocation; any
/// timeout or retry policy belongs to the implementation.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}
