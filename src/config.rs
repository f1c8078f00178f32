//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `SOLACE_DATA_DIR` and `SOLACE_LOG_LEVEL` env overrides.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// Conversation history configuration.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Maximum turns retained per user after compaction.
    pub cap: usize,
    /// How many recent turns to replay on screen at login.
    pub replay: usize,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion length cap passed in the request body.
    pub max_tokens: u32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Reply-provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (e.g. `"sentiment"`, `"openai"`).
    /// Maps to `default` in `[llm]` TOML — named `default` there to signal
    /// that other provider sections can coexist without being loaded.
    pub provider: String,
    /// Config for the OpenAI / OpenAI-compatible provider (`[llm.openai]`).
    pub openai: OpenAiConfig,
}

/// Fully-resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory for all persistent state (already expanded, no `~`).
    pub data_dir: PathBuf,
    pub log_level: String,
    pub history: HistoryConfig,
    /// Persona active at startup (users can switch per session).
    pub default_persona: String,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var — `None` for keyless local providers.
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
}

impl Config {
    /// Path of the credentials file under the data directory.
    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    /// Directory holding per-user transcript files.
    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    service: RawService,
    #[serde(default)]
    history: RawHistory,
    #[serde(default)]
    persona: RawPersona,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawService {
    data_dir: String,
    log_level: String,
}

#[derive(Deserialize)]
struct RawHistory {
    #[serde(default = "default_history_cap")]
    cap: usize,
    #[serde(default = "default_history_replay")]
    replay: usize,
}

impl Default for RawHistory {
    fn default() -> Self {
        Self { cap: default_history_cap(), replay: default_history_replay() }
    }
}

#[derive(Deserialize)]
struct RawPersona {
    #[serde(rename = "default", default = "default_persona_id")]
    default_persona: String,
}

impl Default for RawPersona {
    fn default() -> Self {
        Self { default_persona: default_persona_id() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            max_tokens: default_openai_max_tokens(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

fn default_history_cap() -> usize { 500 }
fn default_history_replay() -> usize { 10 }
fn default_persona_id() -> String { "supportive".to_string() }
fn default_llm_provider() -> String { "sentiment".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_openai_temperature() -> f32 { 0.7 }
fn default_openai_max_tokens() -> u32 { 150 }
fn default_openai_timeout_seconds() -> u64 { 30 }

/// Load config from `path` (default `config/default.toml`), then apply
/// env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let data_dir_override = env::var("SOLACE_DATA_DIR").ok();
    let log_level_override = env::var("SOLACE_LOG_LEVEL").ok();
    load_from(
        Path::new(path.unwrap_or("config/default.toml")),
        data_dir_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    data_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let s = parsed.service;

    let data_dir_str = data_dir_override.unwrap_or(&s.data_dir).to_string();
    let data_dir = expand_home(&data_dir_str);
    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();

    if parsed.history.cap == 0 {
        return Err(AppError::Config("history cap must be at least 1".into()));
    }

    Ok(Config {
        data_dir,
        log_level,
        history: HistoryConfig {
            cap: parsed.history.cap,
            replay: parsed.history.replay,
        },
        default_persona: parsed.persona.default_persona,
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                max_tokens: parsed.llm.openai.max_tokens,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — sentiment provider, no API keys, no
/// external calls.
#[cfg(test)]
impl Config {
    pub fn test_default(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            log_level: "info".into(),
            history: HistoryConfig { cap: 500, replay: 10 },
            default_persona: "supportive".into(),
            llm: LlmConfig {
                provider: "sentiment".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    max_tokens: 16,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
        }
    }
}
