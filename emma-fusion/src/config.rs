//! Configuration resolution for emma-fusion
//!
//! API key priority: CLI argument → environment variable → TOML config

use emma_common::config::GenerationConfig;
use emma_common::{Error, Result};
use tracing::{info, warn};

/// Environment variable holding the API key for `provider`
pub fn api_key_env(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "openai" => Some("OPENAI_API_KEY"),
        "gemini" => Some("GEMINI_API_KEY"),
        _ => None,
    }
}

/// Resolve the API key for `provider` from CLI → ENV → TOML
///
/// Warns when more than one source carries a key.
pub fn resolve_api_key(
    provider: &str,
    cli_key: Option<&str>,
    toml_config: &GenerationConfig,
) -> Result<String> {
    let env_name = api_key_env(provider);
    let env_key = env_name.and_then(|name| std::env::var(name).ok());
    resolve_api_key_from(provider, cli_key, env_key.as_deref(), toml_config)
}

fn resolve_api_key_from(
    provider: &str,
    cli_key: Option<&str>,
    env_key: Option<&str>,
    toml_config: &GenerationConfig,
) -> Result<String> {
    let toml_key = toml_config.api_key.as_deref();

    let candidates = [
        ("command line", cli_key),
        ("environment", env_key),
        ("TOML", toml_key),
    ];

    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, key)| key.map(is_valid_key).unwrap_or(false))
        .map(|(source, _)| *source)
        .collect();

    if sources.len() > 1 {
        warn!(
            "{} API key found in multiple sources: {}. Using {} (highest priority).",
            provider,
            sources.join(", "),
            sources[0]
        );
    }

    for (source, key) in candidates {
        if let Some(key) = key.filter(|k| is_valid_key(k)) {
            info!("{} API key loaded from {}", provider, source);
            return Ok(key.trim().to_string());
        }
    }

    let env_hint = api_key_env(provider).unwrap_or("<PROVIDER>_API_KEY");
    Err(Error::Config(format!(
        "{provider} API key not configured. Provide one of:\n\
         1. Command line: --api-key your-key\n\
         2. Environment: {env_hint}=your-key\n\
         3. TOML config: [generation] api_key = \"your-key\""
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
