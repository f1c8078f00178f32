//! User credential store.
//!
//! Accounts live in a single JSON file (`users.json` under the data dir):
//!
//! ```json
//! { "users": { "alice": { "password_hash": "$argon2id$...", "created_at": "..." } } }
//! ```
//!
//! The whole file is read at startup and rewritten atomically on change.
//! Files written by earlier releases hold a bare `{"name": "<sha256 hex>"}`
//! mapping; those still load, and the next save rewrites the new shape.
//! Lookups never reveal whether a username exists; `authenticate` returns
//! the same `Ok(false)` for an unknown user and a wrong password.

pub mod password;

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{error::AppError, history::BOT_SENDER, storage::atomic_write};

/// One stored account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Argon2id PHC string, or a legacy bare SHA-256 hex digest.
    pub password_hash: String,
    /// RFC 3339 timestamp of registration. Empty for accounts imported
    /// from the legacy file shape, which did not record it.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_at: String,
}

/// On-disk shape of the credentials file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    users: BTreeMap<String, Credential>,
}

/// In-memory credential store backed by a JSON file.
pub struct CredentialStore {
    path: PathBuf,
    users: BTreeMap<String, Credential>,
}

impl CredentialStore {
    /// Open the store at `path`, loading existing accounts.
    ///
    /// A missing file is a first run and yields an empty store. An
    /// unreadable or unparseable file also yields an empty store, loudly:
    /// the broken file will be replaced on the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let users = Self::load(&path);
        Self { path, users }
    }

    fn load(path: &Path) -> BTreeMap<String, Credential> {
        if !path.exists() {
            tracing::info!("no credential file at {}, starting fresh", path.display());
            return BTreeMap::new();
        }
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("cannot read {}: {e}; treating as empty", path.display());
                return BTreeMap::new();
            }
        };
        match serde_json::from_str::<UsersFile>(&raw) {
            Ok(file) => {
                tracing::debug!("loaded {} account(s) from {}", file.users.len(), path.display());
                file.users
            }
            Err(e) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(flat) => {
                    tracing::info!(
                        "importing {} account(s) from legacy credential file {}",
                        flat.len(),
                        path.display()
                    );
                    flat.into_iter()
                        .map(|(name, digest)| {
                            (name, Credential { password_hash: digest, created_at: String::new() })
                        })
                        .collect()
                }
                Err(_) => {
                    tracing::warn!(
                        "corrupt credential file {}: {e}; treating as empty (next save replaces it)",
                        path.display()
                    );
                    BTreeMap::new()
                }
            },
        }
    }

    /// Persist all accounts atomically.
    pub fn save(&self) -> Result<(), AppError> {
        let file = UsersFile { users: self.users.clone() };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| AppError::Auth(format!("cannot encode credentials: {e}")))?;
        atomic_write(&self.path, json.as_bytes())
            .map_err(|e| AppError::Auth(format!("cannot write {}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Create an account. Returns `Ok(false)` if the username is taken,
    /// leaving the store untouched. The new account is persisted before
    /// returning.
    ///
    /// The assistant's own sender name is rejected: transcripts and prompt
    /// shaping classify turns by comparing the sender against it, so a user
    /// carrying that name would have their messages read as the bot's.
    pub fn register(&mut self, username: &str, pass: &str) -> Result<bool, AppError> {
        if username.is_empty() {
            return Err(AppError::Auth("username must not be empty".into()));
        }
        if pass.is_empty() {
            return Err(AppError::Auth("password must not be empty".into()));
        }
        if username == BOT_SENDER {
            return Err(AppError::Auth(format!("username '{BOT_SENDER}' is reserved")));
        }
        if self.users.contains_key(username) {
            return Ok(false);
        }
        let credential = Credential {
            password_hash: password::hash(pass)?,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.users.insert(username.to_string(), credential);
        self.save()?;
        tracing::info!("registered account '{username}'");
        Ok(true)
    }

    /// Check a username/password pair. Unknown users and wrong passwords
    /// both return `Ok(false)`; callers must not distinguish the two.
    ///
    /// A successful login against a legacy SHA-256 entry rewrites it as
    /// Argon2id. If that rewrite cannot be persisted the login still
    /// succeeds; the upgrade is retried on the next login.
    pub fn authenticate(&mut self, username: &str, pass: &str) -> Result<bool, AppError> {
        let Some(credential) = self.users.get(username) else {
            return Ok(false);
        };
        if !password::verify(pass, &credential.password_hash) {
            return Ok(false);
        }
        if password::is_legacy_digest(&credential.password_hash) {
            self.upgrade_hash(username, pass);
        }
        Ok(true)
    }

    fn upgrade_hash(&mut self, username: &str, pass: &str) {
        let rehashed = match password::hash(pass) {
            Ok(phc) => phc,
            Err(e) => {
                tracing::warn!("hash upgrade for '{username}' failed: {e}");
                return;
            }
        };
        if let Some(credential) = self.users.get_mut(username) {
            credential.password_hash = rehashed;
        }
        if let Err(e) = self.save() {
            tracing::warn!("hash upgrade for '{username}' not persisted: {e}");
        } else {
            tracing::info!("upgraded legacy password hash for '{username}'");
        }
    }

    /// Number of stored accounts.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    #[cfg(test)]
    fn stored_hash(&self, username: &str) -> Option<&str> {
        self.users.get(username).map(|c| c.password_hash.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, CredentialStore) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(dir.path().join("users.json"));
        (dir, store)
    }

    #[test]
    fn register_then_authenticate() {
        let (_dir, mut store) = setup();
        assert!(store.register("alice", "correct horse").unwrap());
        assert!(store.authenticate("alice", "correct horse").unwrap());
        assert!(!store.authenticate("alice", "wrong").unwrap());
    }

    #[test]
    fn duplicate_register_keeps_original_password() {
        let (_dir, mut store) = setup();
        assert!(store.register("alice", "first").unwrap());
        assert!(!store.register("alice", "second").unwrap());
        assert_eq!(store.len(), 1);
        assert!(store.authenticate("alice", "first").unwrap());
        assert!(!store.authenticate("alice", "second").unwrap());
    }

    #[test]
    fn unknown_user_and_wrong_password_look_identical() {
        let (_dir, mut store) = setup();
        store.register("alice", "pw").unwrap();
        let unknown = store.authenticate("bob", "pw").unwrap();
        let wrong = store.authenticate("alice", "nope").unwrap();
        assert_eq!(unknown, wrong);
        assert!(!unknown);
    }

    #[test]
    fn empty_username_or_password_rejected() {
        let (_dir, mut store) = setup();
        assert!(store.register("", "pw").is_err());
        assert!(store.register("alice", "").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn bot_sender_name_is_not_registrable() {
        let (_dir, mut store) = setup();
        assert!(store.register(BOT_SENDER, "pw").is_err());
        assert!(store.is_empty());
        assert!(!store.authenticate(BOT_SENDER, "pw").unwrap());
    }

    #[test]
    fn missing_file_starts_empty() {
        let (_dir, store) = setup();
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, "{ not json").unwrap();
        let store = CredentialStore::open(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn reopen_sees_registered_accounts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        {
            let mut store = CredentialStore::open(&path);
            store.register("alice", "pw-a").unwrap();
            store.register("bob", "pw-b").unwrap();
        }
        let mut reopened = CredentialStore::open(&path);
        assert_eq!(reopened.len(), 2);
        assert!(reopened.authenticate("alice", "pw-a").unwrap());
        assert!(reopened.authenticate("bob", "pw-b").unwrap());
    }

    #[test]
    fn save_of_loaded_store_rewrites_equivalent_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        {
            let mut store = CredentialStore::open(&path);
            store.register("alice", "pw").unwrap();
        }
        let first = fs::read_to_string(&path).unwrap();
        CredentialStore::open(&path).save().unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn legacy_hash_upgraded_after_successful_login() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        let digest = password::legacy_digest("old-pw");
        fs::write(
            &path,
            format!(
                r#"{{"users":{{"carol":{{"password_hash":"{digest}","created_at":"2024-01-01T00:00:00Z"}}}}}}"#
            ),
        )
        .unwrap();

        let mut store = CredentialStore::open(&path);
        assert!(store.authenticate("carol", "old-pw").unwrap());
        assert!(store.stored_hash("carol").unwrap().starts_with("$argon2"));

        // The upgrade is already on disk.
        let reopened = CredentialStore::open(&path);
        assert!(reopened.stored_hash("carol").unwrap().starts_with("$argon2"));
    }

    #[test]
    fn failed_login_leaves_legacy_hash_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        let digest = password::legacy_digest("old-pw");
        fs::write(
            &path,
            format!(
                r#"{{"users":{{"carol":{{"password_hash":"{digest}","created_at":"2024-01-01T00:00:00Z"}}}}}}"#
            ),
        )
        .unwrap();

        let mut store = CredentialStore::open(&path);
        assert!(!store.authenticate("carol", "guess").unwrap());
        assert_eq!(store.stored_hash("carol").unwrap(), digest);
    }

    #[test]
    fn legacy_flat_file_is_imported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        let digest = password::legacy_digest("hunter2");
        fs::write(&path, format!(r#"{{"alice":"{digest}"}}"#)).unwrap();

        let mut store = CredentialStore::open(&path);
        assert_eq!(store.len(), 1);
        assert!(store.authenticate("alice", "hunter2").unwrap());

        // Login rewrote the file in the current shape with an upgraded hash.
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"users\""));
        assert!(raw.contains("$argon2"));
        assert!(!raw.contains(&digest));
        assert!(CredentialStore::open(&path).authenticate("alice", "hunter2").unwrap());
    }
}
