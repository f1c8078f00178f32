//! Reply-generation abstraction.
//!
//! `ReplyProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! Async is delegated to the underlying provider; `reply` is an `async fn`
//! on the enum so callers need no trait-object machinery.

pub mod providers;

use thiserror::Error;

use crate::history::Turn;

// ── Error ─────────────────────────────────────────────────────────────────────

/// Failures a provider can report. Callers surface these to the user and
/// record them in the transcript as error turns, never as bot messages.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider '{0}' needs LLM_API_KEY set in the environment")]
    MissingApiKey(String),
    #[error("no reply within {0}s")]
    Timeout(u64),
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("empty or missing content in response")]
    EmptyReply,
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available reply backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `reply` arm.
#[derive(Debug, Clone)]
pub enum ReplyProvider {
    Sentiment(providers::sentiment::SentimentProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl ReplyProvider {
    /// Produce a reply to the conversation so far.
    ///
    /// `turns` is the full transcript, oldest first, already ending with the
    /// user's newest message. Error turns in it are ignored by every
    /// backend. `system` is the active persona's system prompt; the local
    /// backend does not use it.
    pub async fn reply(&self, system: &str, turns: &[Turn]) -> Result<String, ProviderError> {
        match self {
            ReplyProvider::Sentiment(p) => p.reply(turns).await,
            ReplyProvider::OpenAiCompatible(p) => p.reply(system, turns).await,
        }
    }

    /// Short name for logs and the startup banner.
    pub fn name(&self) -> &'static str {
        match self {
            ReplyProvider::Sentiment(_) => "sentiment",
            ReplyProvider::OpenAiCompatible(_) => "openai-compatible",
        }
    }
}
