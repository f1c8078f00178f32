//! Password hashing and verification.
//!
//! New hashes are Argon2id in PHC string format. Stores created by earlier
//! releases hold bare SHA-256 hex digests; those still verify, and the
//! caller rewrites them as Argon2 after a successful login.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core},
};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Hash a password with Argon2id and a fresh random salt.
/// Returns the PHC string (`$argon2id$...`).
pub fn hash(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Auth(format!("password hashing failed: {e}")))?
        .to_string();
    Ok(phc)
}

/// Verify a password against a stored hash, in either format.
pub fn verify(password: &str, stored: &str) -> bool {
    if is_legacy_digest(stored) {
        return legacy_digest(password).eq_ignore_ascii_case(stored);
    }
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        // Unparseable hash: never a match. The store logs the entry.
        Err(_) => false,
    }
}

/// True for the pre-Argon2 on-disk format: a bare 64-char hex SHA-256 digest.
pub fn is_legacy_digest(stored: &str) -> bool {
    stored.len() == 64 && stored.chars().all(|c| c.is_ascii_hexdigit())
}

/// Unsalted SHA-256 hex digest, as earlier releases stored it.
/// Only used to verify and migrate old entries.
pub fn legacy_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
