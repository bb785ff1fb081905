//! Gallery Vault - Key Material
//!
//! The vault is sealed with one static symmetric key. The compatibility key
//! matches what existing vaults on disk were written with; a different key
//! can be provisioned through the config file or `GALLERY_VAULT_KEY`.

use secrecy::{ExposeSecret, Secret};
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Environment variable carrying a hex-encoded vault key
pub const KEY_ENV: &str = "GALLERY_VAULT_KEY";

/// Key every pre-existing vault was sealed with
const COMPAT_KEY: &[u8; KEY_LEN] = b"GalleryVault_SecureKey_2026_IDN!";

/// Secure key wrapper, zeroized on drop
pub struct VaultKey {
    inner: Secret<[u8; KEY_LEN]>,
}

impl VaultKey {
    /// Create a new vault key from bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// Key compatible with vaults written by earlier releases
    pub fn compat() -> Self {
        Self::new(*COMPAT_KEY)
    }

    /// Parse a 64 character hex key
    pub fn from_hex(encoded: &str) -> VaultResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(encoded.trim()).map_err(|e| VaultError::InvalidKey(e.to_string()))?,
        );

        if bytes.len() != KEY_LEN {
            return Err(VaultError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// Resolve the key: environment first, then config, then the compat key
    pub fn resolve(configured: Option<&str>) -> VaultResult<Self> {
        if let Ok(from_env) = std::env::var(KEY_ENV) {
            if !from_env.trim().is_empty() {
                return Self::from_hex(&from_env);
            }
        }

        match configured {
            Some(hex_key) => Self::from_hex(hex_key),
            None => Ok(Self::compat()),
        }
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// Generate a random key
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    use rand::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}
