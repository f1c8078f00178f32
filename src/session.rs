//! Per-login session state.
//!
//! One `Session` exists per authenticated login and owns everything that was
//! previously ambient: who is logged in, which persona is active, and the
//! in-memory transcript. It dies at `/logout`; nothing session-scoped
//! outlives it.

use uuid::Uuid;

use crate::{
    error::AppError,
    history::{BOT_SENDER, TranscriptStore, Turn},
    persona::Persona,
    reply::ReplyProvider,
};

/// State of one authenticated chat session.
pub struct Session {
    id: String,
    username: String,
    persona: &'static Persona,
    turns: Vec<Turn>,
}

impl Session {
    /// Begin a session for `username` with its compacted transcript.
    pub fn start(username: impl Into<String>, persona: &'static Persona, turns: Vec<Turn>) -> Self {
        let username = username.into();
        let id = Uuid::now_v7().to_string();
        tracing::info!(session = %id, user = %username, "session started");
        Self { id, username, persona, turns }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn persona(&self) -> &'static Persona {
        self.persona
    }

    /// Switch persona for the rest of the session. Takes effect on the next
    /// exchange; past turns are not rewritten.
    pub fn set_persona(&mut self, persona: &'static Persona) {
        tracing::info!(session = %self.id, persona = persona.id, "persona changed");
        self.persona = persona;
    }

    /// Full transcript as currently known to this session, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// One user message, one assistant response.
    ///
    /// The user turn is persisted before the provider is called, so the
    /// message survives even if reply generation fails. A provider failure
    /// comes back as an error turn: shown, persisted, and excluded from
    /// future prompts. Only storage failures propagate as `Err`.
    pub async fn exchange(
        &mut self,
        store: &TranscriptStore,
        provider: &ReplyProvider,
        text: &str,
    ) -> Result<Turn, AppError> {
        let user_turn = Turn::message(self.username.clone(), text);
        store.append(&self.username, &user_turn)?;
        self.turns.push(user_turn);

        let reply_turn = match provider.reply(self.persona.system_prompt, &self.turns).await {
            Ok(reply) => Turn::message(BOT_SENDER, reply),
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "reply generation failed");
                Turn::error(e.to_string())
            }
        };
        store.append(&self.username, &reply_turn)?;
        self.turns.push(reply_turn.clone());
        Ok(reply_turn)
    }
}
