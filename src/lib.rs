//! solace — a console companion chatbot with accounts and transcripts.
//!
//! Module map:
//! - [`config`] — TOML config with env-var overrides
//! - [`logger`] — tracing subscriber setup
//! - [`error`] — application error type
//! - [`storage`] — atomic file writes shared by the stores
//! - [`auth`] — credential store, Argon2id password hashing
//! - [`history`] — per-user JSONL transcripts
//! - [`persona`] — built-in persona catalog
//! - [`reply`] — reply providers: local sentiment, OpenAI-compatible HTTP
//! - [`session`] — per-login session state
//! - [`console`] — interactive stdin/stdout front end

pub mod auth;
pub mod config;
pub mod console;
pub mod error;
pub mod history;
pub mod logger;
pub mod persona;
pub mod reply;
pub mod session;
pub mod storage;
