//! Upstream text generation
//!
//! The aggregator only needs `submit(prompt) -> analysis text`. Concrete
//! providers live in submodules; [`client_for`] picks one from configuration.

pub mod gemini;
pub mod limiter;
pub mod openai;
pub mod retry;

use crate::error::GenerationError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use gemini::GeminiClient;
pub use limiter::Cooldown;
pub use openai::OpenAiClient;
pub use retry::{retry_with_backoff, Attempted, RetryPolicy};

/// Generative-text capability consumed by the fusion aggregator
///
/// Implementations fail with [`GenerationError::Api`] on a non-success
/// status and [`GenerationError::Payload`] when the response lacks the
/// expected text field.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Provider name for logs and artifact headers
    fn name(&self) -> &str;

    /// Send one prompt and return the generated text
    async fn submit(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Provider selection resolved from configuration
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// "openai" or "gemini"
    pub provider: String,
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

/// Build the configured provider client
pub fn client_for(settings: &ProviderSettings) -> Result<Arc<dyn GenerationClient>, GenerationError> {
    match settings.provider.to_ascii_lowercase().as_str() {
        "openai" => {
            let mut client = OpenAiClient::new(&settings.api_key, settings.timeout)?;
            if let Some(model) = &settings.model {
                client = client.with_model(model);
            }
            if let Some(url) = &settings.base_url {
                client = client.with_base_url(url);
            }
            Ok(Arc::new(client))
        }
        "gemini" => {
            let mut client = GeminiClient::new(&settings.api_key, settings.timeout)?;
            if let Some(model) = &settings.model {
                client = client.with_model(model);
            }
            if let Some(url) = &settings.base_url {
                client = client.with_base_url(url);
            }
            Ok(Arc::new(client))
        }
        other => Err(GenerationError::Config(format!(
            "unknown generation provider {:?} (expected \"openai\" or \"gemini\")",
            other
        ))),
    }
}

/// Map a reqwest transport error, keeping timeouts distinguishable
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(timeout)
    } else {
        GenerationError::Network(err.to_string())
    }
}
