//! Password hashing
//!
//! Argon2id with the argon2 crate's default parameters and a random salt per
//! hash. Hashes are stored as PHC strings, which carry the algorithm,
//! parameters and salt alongside the digest.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a plaintext password into a PHC string.
///
/// ```ignore
/// use taskboard::services::password::hash_password;
///
/// let hash = hash_password("correct horse battery")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Check `password` against a stored PHC hash.
///
/// A mismatch is `Ok(false)`; only a malformed hash or an internal argon2
/// failure is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_and_salted() {
        let first = hash_password("same_password").expect("Failed to hash password");
        let second = hash_password("same_password").expect("Failed to hash password");

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second, "Random salt should give distinct hashes");
        assert!(!first.contains("same_password"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password").expect("Failed to hash password");

        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        let result = verify_password("password", "invalid_hash_format");
        assert!(result.is_err(), "Invalid hash format should return error");
    }

    #[test]
    fn test_hash_password_unicode() {
        let password = "pässwörd-🔐";
        let hash = hash_password(password).expect("Failed to hash unicode password");

        assert!(verify_password(password, &hash).unwrap());
    }
}
