//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! Exposes the same `reply(system, turns) -> String` surface as the rest of
//! the `ReplyProvider` abstraction. All OpenAI wire types are private to
//! this module — callers never see them. The full message turn history is
//! replayed role-tagged on every request; error turns are filtered out so a
//! past failure never leaks into the prompt.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::history::{BOT_SENDER, Turn};
use crate::reply::ProviderError;

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Covers OpenAI, OpenAI-compatible local servers (Ollama, LM Studio…),
/// and hosted alternatives. Constructed once at startup, then cheaply cloned
/// because `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_seconds: u64,
    api_key: String,
}

impl OpenAiCompatibleProvider {
    /// Build a provider from config values and the API key.
    ///
    /// The key is sent as `Authorization: Bearer <key>` on every request.
    /// The per-request timeout is baked into the client here; a stuck
    /// upstream surfaces as [`ProviderError::Timeout`] instead of hanging
    /// the session.
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout_seconds: u64,
        api_key: String,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, model, temperature, max_tokens, timeout_seconds, api_key })
    }

    /// One round-trip: send the persona prompt plus the role-tagged history
    /// and return the assistant's text.
    pub async fn reply(&self, system: &str, turns: &[Turn]) -> Result<String, ProviderError> {
        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_messages(system, turns),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            model = %payload.model,
            messages = payload.messages.len(),
            "sending chat completion request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full request payload");
        }

        let response = self
            .client
            .post(&self.api_base_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!(url = %self.api_base_url, timeout = self.timeout_seconds, "request timed out");
                    ProviderError::Timeout(self.timeout_seconds)
                } else {
                    error!(url = %self.api_base_url, error = %e, "request failed (transport)");
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize response");
            ProviderError::Transport(format!("failed to parse response body: {e}"))
        })?;

        debug!(choices = parsed.choices.len(), "received chat completion response");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ProviderError::EmptyReply)
    }
}

/// System prompt first, then every conversation turn in order.
/// Error turns are dropped; the assistant's own turns replay as `assistant`.
fn build_messages(system: &str, turns: &[Turn]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(Message { role: "system".to_string(), content: system.to_string() });
    for turn in turns.iter().filter(|t| t.kind.is_message()) {
        let role = if turn.sender == BOT_SENDER { "assistant" } else { "user" };
        messages.push(Message { role: role.to_string(), content: turn.text.clone() });
    }
    messages
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Pull the human-readable message out of an error envelope body.
fn error_detail(body: &str) -> Option<String> {
    let env = serde_json::from_str::<ErrorEnvelope>(body).ok()?;
    let code = env
        .error
        .code
        .map(|v| match v {
            serde_json::Value::String(s) => format!(" [code={s}]"),
            other => format!(" [code={other}]"),
        })
        .unwrap_or_default();
    Some(format!("{}{code}", env.error.message))
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let detail = error_detail(&body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            "<empty error body>".to_string()
        } else {
            body
        }
    });

    error!(%status, %detail, "chat completion returned HTTP error");
    Err(ProviderError::Http { status: status.as_u16(), detail })
}
