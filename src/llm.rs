//! Chat-completion answer generator.
//!
//! [`OpenAiGenerator`] sends the assembled prompt as a single user message to
//! `POST {base_url}/chat/completions` and returns the first choice's content.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use study_partner_core::generate::AnswerGenerator;

use crate::config::LlmConfig;
use crate::openai;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: openai::build_client(config.timeout_secs)?,
            url: openai::endpoint(&config.base_url, "chat/completions"),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    /// Build from configuration, reading `OPENAI_API_KEY`.
    pub fn from_env(config: &LlmConfig) -> Result<Self> {
        Self::new(config, openai::api_key_from_env()?)
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let json = openai::post_json_with_retry(
            &self.client,
            &self.url,
            &self.api_key,
            &request,
            self.max_retries,
        )
        .await?;

        let response: ChatResponse = serde_json::from_value(json)
            .map_err(|e| anyhow!("Invalid chat completion response: {}", e))?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| anyhow!("Chat completion returned no content"))
    }
}
