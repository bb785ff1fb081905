//! Gallery Vault - Password Hashing
//!
//! New hashes are Argon2id PHC strings. Catalogs created by earlier
//! releases store unsalted SHA-256 hex digests; those still verify.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};

use crate::error::{VaultError, VaultResult};

/// Hash a password for storage
pub fn hash_password(password: &str) -> VaultResult<String> {
    if password.is_empty() {
        return Err(VaultError::InvalidInput("password must not be empty".into()));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| VaultError::PasswordHash(e.to_string()))
}

/// Verify a password against a stored hash (Argon2 PHC or legacy SHA-256 hex)
pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.is_empty() {
        return false;
    }

    if is_legacy_digest(stored) {
        return constant_time_eq(sha256_hex(password).as_bytes(), stored.to_ascii_lowercase().as_bytes());
    }

    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hex SHA-256 of a string
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

fn is_legacy_digest(stored: &str) -> bool {
    stored.len() == 64 && stored.bytes().all(|b| b.is_ascii_hexdigit())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
