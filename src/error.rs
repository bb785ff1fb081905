//! Gallery Vault - Error Types

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    // ═══════════════════════════════════════════════════════════════
    // INPUT ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsafe path: {0}")]
    UnsafePath(String),

    // ═══════════════════════════════════════════════════════════════
    // CONFLICT ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Item already exists: {0}")]
    DuplicateItem(String),

    #[error("Collection already exists: {0}")]
    DuplicateCollection(String),

    #[error("No images found in: {0}")]
    NoImages(String),

    // ═══════════════════════════════════════════════════════════════
    // ACCESS ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Path escapes the vault: {0}")]
    PathTraversal(String),

    // ═══════════════════════════════════════════════════════════════
    // FILE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════
    // CATALOG ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // ═══════════════════════════════════════════════════════════════
    // IMAGE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Preview generation failed: {0}")]
    PreviewFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl VaultError {
    /// Check if this error is an access-control rejection
    pub fn is_access_denied(&self) -> bool {
        matches!(self, VaultError::AccessDenied(_) | VaultError::PathTraversal(_))
    }

    /// Check if this error only affects the current operation.
    ///
    /// Everything except failing to reach the vault root or the catalog is
    /// reported back to the caller instead of stopping the process.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, VaultError::DatabaseError(_) | VaultError::InvalidKey(_))
    }

    /// HTTP status code used by the content server
    pub fn status_code(&self) -> u16 {
        match self {
            VaultError::InvalidInput(_) | VaultError::UnsafePath(_) => 400,
            VaultError::AccessDenied(_) | VaultError::PathTraversal(_) => 403,
            VaultError::FileNotFound(_)
            | VaultError::ItemNotFound(_)
            | VaultError::CollectionNotFound(_)
            | VaultError::TagNotFound(_) => 404,
            VaultError::DuplicateItem(_) | VaultError::DuplicateCollection(_) => 409,
            VaultError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => 404,
            _ => 500,
        }
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        VaultError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::SerializationError(e.to_string())
    }
}

impl From<image::ImageError> for VaultError {
    fn from(e: image::ImageError) -> Self {
        VaultError::ImageError(e.to_string())
    }
}
