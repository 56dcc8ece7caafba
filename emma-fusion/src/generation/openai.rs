//! OpenAI-compatible chat completions client
//!
//! Works against api.openai.com or any endpoint speaking the same
//! `/chat/completions` contract (set with [`OpenAiClient::with_base_url`]).

use super::{transport_error, GenerationClient};
use crate::error::GenerationError;
use crate::prompt::SYSTEM_PROMPT;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI chat completions client
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiClient {
    /// Create a client whose every request is bounded by `timeout`
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: OPENAI_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: 1500,
            timeout,
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn submit(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "OpenAI chat request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Payload(format!("undecodable chat response: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| GenerationError::Payload("no message content in choices".to_string()))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
