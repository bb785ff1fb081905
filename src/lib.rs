//! # Gallery Vault
//!
//! Encrypted image library with a hidden zone and per-book passwords.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     GALLERY VAULT                        │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │ TREE SCANNER│→ │ IMPORT POOL │→ │  CRYPTO CODEC   │  │
//! │  │ + SANITIZER │  │ (N workers) │  │  AES-256-GCM    │  │
//! │  └─────────────┘  └─────────────┘  └────────┬────────┘  │
//! │                                             │ vault/    │
//! │  ┌─────────────┐  ┌─────────────┐  ┌────────┴────────┐  │
//! │  │ HTTP SERVER │→ │   ACCESS    │→ │ CONTENT +       │  │
//! │  │ /img /thumb │  │ CONTROLLER  │  │ PREVIEW CACHE   │  │
//! │  └─────────────┘  └──────┬──────┘  └─────────────────┘  │
//! │                          │                               │
//! │                 ┌────────┴────────┐                      │
//! │                 │ CATALOG (SQLite)│                      │
//! │                 └─────────────────┘                      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Pages encrypted with AES-256-GCM, fresh random nonce per file
//! - Files that fail authentication are served as legacy plaintext
//! - Hidden zone and item unlocks live in process memory only
//! - Cover previews are cached as plaintext outside the vault

pub mod access;
pub mod catalog;
pub mod config;
pub mod content;
pub mod crypto;
pub mod error;
pub mod import;
pub mod migrate;
pub mod natord;
pub mod sanitize;
pub mod server;
pub mod storage;
pub mod vault;

pub use access::AccessController;
pub use catalog::{Catalog, ItemFilter, SortKey, StoredItem};
pub use config::AppConfig;
pub use error::{VaultError, VaultResult};
pub use import::{ImportMode, ImportSummary};
pub use vault::GalleryVault;

/// Gallery Vault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
