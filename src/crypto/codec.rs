//! Gallery Vault - Page Codec
//!
//! AES-256-GCM for every page written into the vault.
//!
//! ```text
//! [NONCE 12B][random per call]
//! [CIPHERTEXT variable][AES-256-GCM encrypted]
//! [TAG 16B][GCM auth tag]
//! ```
//!
//! There is no magic prefix: files written before encryption was introduced
//! sit next to sealed ones, so anything that does not authenticate is
//! handed back untouched as legacy plaintext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use super::keys::{generate_nonce, VaultKey, NONCE_LEN};
use crate::error::{VaultError, VaultResult};

/// Result of opening a stored blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened {
    /// Blob authenticated and was decrypted
    Decrypted(Vec<u8>),
    /// Blob was too short or failed authentication; returned as-is
    Passthrough(Vec<u8>),
}

impl Opened {
    /// Bytes to serve, whichever way they were obtained
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Opened::Decrypted(bytes) | Opened::Passthrough(bytes) => bytes,
        }
    }

    /// Whether the legacy plaintext fallback was taken
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Opened::Passthrough(_))
    }
}

/// Symmetric codec bound to the vault key
pub struct Codec {
    cipher: Aes256Gcm,
}

impl Codec {
    /// Create a codec from the vault key
    pub fn new(key: &VaultKey) -> VaultResult<Self> {
        let cipher = Aes256Gcm::new_from_slice(key.expose())
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

        Ok(Self { cipher })
    }

    /// Encrypt with a fresh random nonce; output is `nonce || ciphertext`
    pub fn encrypt(&self, plaintext: &[u8]) -> VaultResult<Vec<u8>> {
        let nonce_bytes = generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open a stored blob, reporting whether the plaintext fallback was used
    pub fn open(&self, blob: &[u8]) -> Opened {
        if blob.len() < NONCE_LEN {
            return Opened::Passthrough(blob.to_vec());
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        match self.cipher.decrypt(nonce, ciphertext) {
            Ok(plaintext) => Opened::Decrypted(plaintext),
            Err(_) => Opened::Passthrough(blob.to_vec()),
        }
    }

    /// Decrypt, or return the input unchanged if it does not authenticate
    pub fn try_decrypt(&self, blob: &[u8]) -> Vec<u8> {
        self.open(blob).into_bytes()
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Codec { cipher: Aes256Gcm }")
    }
}
