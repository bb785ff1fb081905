//! Gallery Vault - Configuration
//!
//! Defaults, optionally overridden by `<base_dir>/config.json` and then by
//! command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::VaultResult;

/// Directory name under the per-user config location
pub const APP_DIR: &str = "GalleryVault";

/// Name of the optional config file inside the base directory
pub const CONFIG_FILE: &str = "config.json";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Holds the vault, the preview cache and the catalog
    pub base_dir: PathBuf,
    /// Address the content server listens on
    pub bind_address: String,
    /// Pages wider than this are downsampled on import
    pub max_width: u32,
    /// JPEG quality for imported pages and previews
    pub jpeg_quality: u8,
    /// Width of cover previews
    pub preview_width: u32,
    /// Import workers (host parallelism when unset)
    pub workers: Option<usize>,
    /// Hex encoded 32 byte key; the compatibility key when unset
    pub key_hex: Option<String>,
    /// Deny reads of vault directories that are not in the catalog
    pub deny_uncataloged: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            bind_address: "127.0.0.1:34115".into(),
            max_width: 1920,
            jpeg_quality: 75,
            preview_width: 300,
            workers: None,
            key_hex: None,
            deny_uncataloged: false,
        }
    }
}

impl AppConfig {
    /// Defaults rooted at `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    /// Load `<base_dir>/config.json` on top of the defaults.
    ///
    /// The file may not override the base directory it was found in.
    pub fn load(base_dir: Option<&Path>) -> VaultResult<Self> {
        let base_dir = base_dir.map(Path::to_path_buf).unwrap_or_else(default_base_dir);
        let file = base_dir.join(CONFIG_FILE);

        let mut config = if file.exists() {
            let data = std::fs::read_to_string(&file)?;
            let config: AppConfig = serde_json::from_str(&data)?;
            log::info!("📄 Loaded config from {}", file.display());
            config
        } else {
            AppConfig::default()
        };

        config.base_dir = base_dir;
        Ok(config)
    }

    /// Write the config file into the base directory
    pub fn save(&self) -> VaultResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        crate::storage::write_atomic(&self.base_dir.join(CONFIG_FILE), &json)
    }

    /// Encrypted page store
    pub fn vault_dir(&self) -> PathBuf {
        self.base_dir.join("vault")
    }

    /// Plaintext preview cache
    pub fn cache_dir(&self) -> PathBuf {
        self.base_dir.join("cache")
    }

    /// SQLite catalog
    pub fn catalog_path(&self) -> PathBuf {
        self.base_dir.join("library.db")
    }

    /// Number of import workers for `jobs` queued files
    pub fn worker_count(&self, jobs: usize) -> usize {
        let available = self.workers.filter(|&n| n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        available.min(jobs).max(1)
    }
}

fn default_base_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
