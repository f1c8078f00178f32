//! Per-user conversation transcripts.
//!
//! Each user owns one JSON-lines file under `history/` in the data dir.
//! Appending a turn writes a single line; nothing else in the file moves.
//! At login the file is compacted down to the configured cap, so steady
//! chatting costs one line per turn and the file length is bounded.
//!
//! A torn final line (crash mid-append) or any other unparseable line is
//! skipped on load with a warning instead of poisoning the whole file.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{error::AppError, storage::atomic_write};

/// Sender name recorded for the assistant's own turns.
pub const BOT_SENDER: &str = "solace";

/// Wall-clock format stored in each turn, e.g. `2026-08-21 14:03:59`.
pub const TURN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Distinguishes normal conversation from recorded failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    #[default]
    Message,
    /// A provider failure shown to the user. Persisted so the transcript
    /// reflects what was on screen, but never replayed into prompts.
    Error,
}

impl TurnKind {
    pub fn is_message(&self) -> bool {
        matches!(self, TurnKind::Message)
    }
}

/// One transcript entry: who said what, when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub sender: String,
    pub text: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "TurnKind::is_message")]
    pub kind: TurnKind,
}

impl Turn {
    /// A normal turn stamped with the current local time.
    pub fn message(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            time: stamp(),
            kind: TurnKind::Message,
        }
    }

    /// An error turn attributed to the assistant.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            sender: BOT_SENDER.to_string(),
            text: text.into(),
            time: stamp(),
            kind: TurnKind::Error,
        }
    }
}

fn stamp() -> String {
    chrono::Local::now().format(TURN_TIME_FORMAT).to_string()
}

/// Filename-safe identifier for a user's transcript file.
///
/// Keeps up to 24 of the username's `[A-Za-z0-9_-]` characters for
/// readability and appends the first 8 hex chars of its SHA-256 so that
/// usernames differing only in stripped characters cannot collide.
pub fn user_slug(username: &str) -> String {
    let tag = &hex::encode(Sha256::digest(username.as_bytes()))[..8];
    let safe: String = username
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(24)
        .collect();
    if safe.is_empty() {
        format!("user-{tag}")
    } else {
        format!("{safe}-{tag}")
    }
}

/// Flat-file transcript store, one JSONL file per user.
pub struct TranscriptStore {
    dir: PathBuf,
    cap: usize,
}

impl TranscriptStore {
    /// `dir` is created lazily on first write. `cap` bounds turns kept per
    /// user after compaction; must be at least 1 (config enforces this).
    pub fn open(dir: impl Into<PathBuf>, cap: usize) -> Self {
        Self { dir: dir.into(), cap }
    }

    /// Path of one user's transcript file.
    pub fn user_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", user_slug(username)))
    }

    /// Load a user's full transcript. Missing file means no history yet.
    /// Unparseable lines are counted, warned about, and skipped. A file
    /// that exists but cannot be read is an error, never an empty
    /// transcript: a read fault must not replay as a blank history.
    pub fn load(&self, username: &str) -> Result<Vec<Turn>, AppError> {
        let path = self.user_path(username);
        if !path.exists() {
            tracing::debug!("no transcript at {}", path.display());
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| AppError::History(format!("cannot read {}: {e}", path.display())))?;

        let mut turns = Vec::new();
        let mut skipped = 0usize;
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Turn>(line) {
                Ok(turn) => turns.push(turn),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(
                "skipped {skipped} unparseable line(s) in {}",
                path.display()
            );
        }
        Ok(turns)
    }

    /// Append one turn to a user's file. Constant cost per call; the rest
    /// of the file is untouched.
    pub fn append(&self, username: &str, turn: &Turn) -> Result<(), AppError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .map_err(|e| AppError::History(format!("cannot create {}: {e}", self.dir.display())))?;
        }
        let path = self.user_path(username);
        let line = serde_json::to_string(turn)
            .map_err(|e| AppError::History(format!("cannot encode turn: {e}")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AppError::History(format!("cannot open {}: {e}", path.display())))?;
        writeln!(file, "{line}")
            .map_err(|e| AppError::History(format!("cannot write {}: {e}", path.display())))?;
        Ok(())
    }

    /// Atomically replace a user's transcript with `turns`.
    pub fn save(&self, username: &str, turns: &[Turn]) -> Result<(), AppError> {
        let path = self.user_path(username);
        let mut buf = String::new();
        for turn in turns {
            let line = serde_json::to_string(turn)
                .map_err(|e| AppError::History(format!("cannot encode turn: {e}")))?;
            buf.push_str(&line);
            buf.push('\n');
        }
        atomic_write(&path, buf.as_bytes())
            .map_err(|e| AppError::History(format!("cannot write {}: {e}", path.display())))?;
        Ok(())
    }

    /// Load a transcript and trim it to the cap, rewriting the file only
    /// when it actually shrank. Returns the retained turns, oldest first.
    /// Called once per login so appends stay cheap in between.
    pub fn compact(&self, username: &str) -> Result<Vec<Turn>, AppError> {
        let mut turns = self.load(username)?;
        if turns.len() > self.cap {
            let excess = turns.len() - self.cap;
            turns.drain(..excess);
            self.save(username, &turns)?;
            tracing::debug!("compacted transcript for '{username}': dropped {excess} turn(s)");
        }
        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(cap: usize) -> (TempDir, TranscriptStore) {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::open(dir.path().join("history"), cap);
        (dir, store)
    }

    #[test]
    fn slug_keeps_safe_chars_and_hash_tag() {
        let slug = user_slug("alice_92");
        assert!(slug.starts_with("alice_92-"));
        assert_eq!(slug.len(), "alice_92".len() + 1 + 8);
    }

    #[test]
    fn slug_strips_unsafe_chars() {
        let slug = user_slug("a/b c");
        assert!(slug.starts_with("abc-"));
    }

    #[test]
    fn stripped_usernames_do_not_collide() {
        assert_ne!(user_slug("a/b"), user_slug("a b"));
        assert_ne!(user_slug("a/b"), user_slug("ab"));
    }

    #[test]
    fn fully_stripped_username_gets_placeholder() {
        let slug = user_slug("日本語");
        assert!(slug.starts_with("user-"));
    }

    #[test]
    fn long_username_is_truncated() {
        let name = "x".repeat(100);
        let slug = user_slug(&name);
        assert_eq!(slug.len(), 24 + 1 + 8);
    }

    #[test]
    fn load_missing_is_empty() {
        let (_dir, store) = setup(10);
        assert!(store.load("nobody").unwrap().is_empty());
    }

    #[test]
    fn unreadable_file_is_an_error_not_empty() {
        let (_dir, store) = setup(10);
        // A directory at the transcript path exists but cannot be read as a
        // file, regardless of the uid the tests run under.
        fs::create_dir_all(store.user_path("alice")).unwrap();
        assert!(store.load("alice").is_err());
        assert!(store.compact("alice").is_err());
    }

    #[test]
    fn appends_preserve_order() {
        let (_dir, store) = setup(10);
        store.append("alice", &Turn::message("alice", "hi")).unwrap();
        store.append("alice", &Turn::message(BOT_SENDER, "hello")).unwrap();
        store.append("alice", &Turn::message("alice", "bye")).unwrap();

        let turns = store.load("alice").unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].text, "hi");
        assert_eq!(turns[1].sender, BOT_SENDER);
        assert_eq!(turns[2].text, "bye");
    }

    #[test]
    fn users_do_not_share_files() {
        let (_dir, store) = setup(10);
        store.append("alice", &Turn::message("alice", "mine")).unwrap();
        store.append("bob", &Turn::message("bob", "also mine")).unwrap();

        let alice = store.load("alice").unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].text, "mine");
        assert_eq!(store.load("bob").unwrap().len(), 1);
    }

    #[test]
    fn bad_lines_are_skipped() {
        let (_dir, store) = setup(10);
        store.append("alice", &Turn::message("alice", "first")).unwrap();
        store.append("alice", &Turn::message("alice", "second")).unwrap();

        // Simulate a crash mid-append: a torn trailing line.
        let path = store.user_path("alice");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"sender\":\"alice\",\"tex").unwrap();
        drop(file);

        let turns = store.load("alice").unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text, "second");
    }

    #[test]
    fn compact_keeps_most_recent_turns() {
        let (_dir, store) = setup(3);
        for i in 0..7 {
            store.append("alice", &Turn::message("alice", format!("m{i}"))).unwrap();
        }
        let turns = store.compact("alice").unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].text, "m4");
        assert_eq!(turns[2].text, "m6");

        // The trim is on disk too.
        assert_eq!(store.load("alice").unwrap().len(), 3);
    }

    #[test]
    fn compact_under_cap_changes_nothing() {
        let (_dir, store) = setup(10);
        store.append("alice", &Turn::message("alice", "only")).unwrap();
        let before = fs::read_to_string(store.user_path("alice")).unwrap();
        let turns = store.compact("alice").unwrap();
        assert_eq!(turns.len(), 1);
        let after = fs::read_to_string(store.user_path("alice")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn message_turns_omit_kind_on_disk() {
        let (_dir, store) = setup(10);
        store.append("alice", &Turn::message("alice", "hi")).unwrap();
        let raw = fs::read_to_string(store.user_path("alice")).unwrap();
        assert!(!raw.contains("\"kind\""));
    }

    #[test]
    fn error_turns_round_trip_with_kind() {
        let (_dir, store) = setup(10);
        store.append("alice", &Turn::error("upstream unavailable")).unwrap();
        let raw = fs::read_to_string(store.user_path("alice")).unwrap();
        assert!(raw.contains("\"kind\":\"error\""));

        let turns = store.load("alice").unwrap();
        assert_eq!(turns[0].kind, TurnKind::Error);
        assert_eq!(turns[0].sender, BOT_SENDER);
    }
}
