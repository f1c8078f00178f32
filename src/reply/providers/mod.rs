//! Reply provider implementations.
//!
//! `build(config, api_key)` is the factory — called at startup.
//! Adding a new backend = new module + new match arm.

pub mod openai_compatible;
pub mod sentiment;

use crate::config::LlmConfig;
use crate::reply::{ProviderError, ReplyProvider};

/// Construct a `ReplyProvider` from config and an optional API key.
///
/// `api_key` is sourced from the `LLM_API_KEY` env var, never from TOML.
/// The remote backends refuse to start without it; failing here beats
/// failing on the first message.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<ReplyProvider, ProviderError> {
    match config.provider.as_str() {
        "sentiment" => Ok(ReplyProvider::Sentiment(sentiment::SentimentProvider)),
        "openai" | "openai-compatible" => {
            let key = api_key.ok_or_else(|| ProviderError::MissingApiKey(config.provider.clone()))?;
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.max_tokens,
                oai.timeout_seconds,
                key,
            )?;
            Ok(ReplyProvider::OpenAiCompatible(p))
        }
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}
