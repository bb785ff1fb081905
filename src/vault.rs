//! Gallery Vault - Main Vault Implementation
//!
//! Ties the catalog, the access controller, the codec and the filesystem
//! layout together. Every read goes through the access check first.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::access::AccessController;
use crate::catalog::{Catalog, CatalogStats, CollectionSummary, ItemFilter, StoredItem};
use crate::config::AppConfig;
use crate::content::{read_page, Page, PreviewCache};
use crate::crypto::{Codec, VaultKey};
use crate::error::{VaultError, VaultResult};
use crate::import::{BatchSummary, ImportMode, ImportSummary, Importer};
use crate::migrate::{migrate_legacy, MigrationReport};
use crate::natord::natural_sort;
use crate::sanitize::PAGE_EXTENSION;
use crate::storage::{resolve_within, split_request_path};

/// Editable item details; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub hidden: Option<bool>,
    pub cover_masked: Option<bool>,
}

/// Gallery Vault
pub struct GalleryVault {
    config: AppConfig,
    vault_dir: PathBuf,
    catalog: Arc<Catalog>,
    access: AccessController,
    codec: Codec,
    previews: PreviewCache,
}

impl GalleryVault {
    /// Open the vault described by `config`, creating its directories
    pub fn open(config: AppConfig) -> VaultResult<Self> {
        let vault_dir = config.vault_dir();
        fs::create_dir_all(&vault_dir)?;
        fs::create_dir_all(config.cache_dir())?;

        let catalog = Arc::new(Catalog::open(&config.catalog_path())?);
        let key = VaultKey::resolve(config.key_hex.as_deref())?;
        let codec = Codec::new(&key)?;

        let access = AccessController::new(catalog.clone(), config.deny_uncataloged);
        let previews = PreviewCache::new(&config.cache_dir(), config.preview_width, config.jpeg_quality);

        log::info!("🔐 Vault opened at {}", config.base_dir.display());

        Ok(Self {
            config,
            vault_dir,
            catalog,
            access,
            codec,
            previews,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn access(&self) -> &AccessController {
        &self.access
    }

    pub fn vault_dir(&self) -> &Path {
        &self.vault_dir
    }

    // ═══════════════════════════════════════════════════════════════════════
    // IMPORT
    // ═══════════════════════════════════════════════════════════════════════

    fn importer(&self) -> Importer<'_> {
        Importer::new(&self.vault_dir, &self.catalog, &self.codec, &self.config)
    }

    /// Import a directory of images as item `name`
    pub fn import(&self, name: &str, source: &Path, mode: ImportMode) -> VaultResult<ImportSummary> {
        self.importer().import(name, source, mode)
    }

    /// Import every sub-directory of `root` as its own item
    pub fn batch_import(&self, root: &Path) -> VaultResult<BatchSummary> {
        self.importer().batch_import(root)
    }

    /// Catalog vault directories left by older releases
    pub fn migrate_legacy(&self) -> VaultResult<MigrationReport> {
        migrate_legacy(&self.vault_dir, &self.catalog)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LISTING
    // ═══════════════════════════════════════════════════════════════════════

    /// Query items; hidden ones only while the hidden zone is unlocked
    pub fn list_items(&self, mut filter: ItemFilter) -> VaultResult<Vec<StoredItem>> {
        filter.include_hidden = self.access.hidden_zone_active();
        let items = self.catalog.find(&filter)?;
        Ok(items.into_iter().filter(|i| self.access.is_visible(i)).collect())
    }

    pub fn list_collections(&self) -> VaultResult<Vec<CollectionSummary>> {
        self.catalog.list_collections(self.access.hidden_zone_active())
    }

    pub fn stats(&self) -> VaultResult<CatalogStats> {
        self.catalog.stats(self.access.hidden_zone_active())
    }

    /// Cataloged item, if visible
    pub fn item(&self, item_id: &str) -> VaultResult<StoredItem> {
        match self.catalog.find_by_path(item_id)? {
            Some(item) if self.access.is_visible(&item) => Ok(item),
            _ => Err(VaultError::ItemNotFound(item_id.to_string())),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // READER
    // ═══════════════════════════════════════════════════════════════════════

    /// Stored directory name for a request id (catalog lookups ignore case)
    fn canonical_id(&self, segment: String) -> VaultResult<String> {
        Ok(self
            .catalog
            .find_by_path(&segment)?
            .map(|item| item.path)
            .unwrap_or(segment))
    }

    fn item_dir(&self, item_id: &str) -> VaultResult<PathBuf> {
        let segment = self.canonical_id(single_segment(item_id)?)?;
        self.access.check_access(&segment)?;

        let dir = resolve_within(&self.vault_dir, &[segment])?;
        if !dir.is_dir() {
            return Err(VaultError::ItemNotFound(item_id.to_string()));
        }
        Ok(dir)
    }

    /// Chapter directories of an item, in natural order
    pub fn chapters(&self, item_id: &str) -> VaultResult<Vec<String>> {
        let dir = self.item_dir(item_id)?;

        let mut chapters: Vec<String> = fs::read_dir(&dir)?
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();

        natural_sort(&mut chapters);
        Ok(chapters)
    }

    /// Page files of an item, or of one of its chapters, in natural order
    pub fn pages(&self, item_id: &str, chapter: Option<&str>) -> VaultResult<Vec<String>> {
        let mut dir = self.item_dir(item_id)?;

        if let Some(chapter) = chapter.filter(|c| !c.is_empty()) {
            let segment = single_segment(chapter)?;
            dir = resolve_within(&dir, &[segment])?;
            if !dir.is_dir() {
                return Err(VaultError::FileNotFound(chapter.to_string()));
            }
        }

        let mut pages: Vec<String> = fs::read_dir(&dir)?
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| is_page(name))
            .collect();

        natural_sort(&mut pages);
        Ok(pages)
    }

    /// Decrypt one file; `request_path` is `<item>/<relative path>`
    pub fn read_file(&self, request_path: &str) -> VaultResult<Page> {
        let mut segments = split_request_path(request_path)?;
        if segments.len() < 2 {
            return Err(VaultError::UnsafePath(request_path.to_string()));
        }
        segments[0] = self.canonical_id(std::mem::take(&mut segments[0]))?;

        self.access.check_access(&segments[0])?;
        read_page(&self.vault_dir, &self.codec, &segments)
    }

    /// Cover preview of an item, rendered once and then served from cache
    pub fn preview(&self, item_id: &str) -> VaultResult<Vec<u8>> {
        let segment = single_segment(item_id)?;
        self.access.check_access(&segment)?;

        if let Some(cached) = self.previews.get(&segment) {
            return Ok(cached);
        }

        let item = self
            .catalog
            .find_by_path(&segment)?
            .ok_or_else(|| VaultError::ItemNotFound(segment.clone()))?;
        if item.cover_path.is_empty() {
            return Err(VaultError::FileNotFound(format!("{} has no cover", item.path)));
        }

        let mut segments = vec![item.path.clone()];
        segments.extend(split_request_path(&item.cover_path)?);

        let cover = resolve_within(&self.vault_dir, &segments)?;
        if !cover.is_file() {
            return Err(VaultError::FileNotFound(item.cover_path));
        }

        let sealed = fs::read(&cover)?;
        self.previews.render(&segment, &self.codec, &sealed)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════

    fn readable_item(&self, item_id: &str) -> VaultResult<StoredItem> {
        let segment = single_segment(item_id)?;
        self.access.check_access(&segment)?;
        self.catalog
            .find_by_path(&segment)?
            .ok_or_else(|| VaultError::ItemNotFound(item_id.to_string()))
    }

    /// Point the cover at another stored page and drop the old preview
    pub fn set_cover(&self, item_id: &str, page: &str) -> VaultResult<()> {
        let item = self.readable_item(item_id)?;

        let mut segments = vec![item.path.clone()];
        segments.extend(split_request_path(page)?);
        if !resolve_within(&self.vault_dir, &segments)?.is_file() {
            return Err(VaultError::FileNotFound(page.to_string()));
        }

        self.catalog.set_cover(item.id, &segments[1..].join("/"))?;
        self.previews.invalidate(&item.path);
        Ok(())
    }

    pub fn update_progress(&self, item_id: &str, page: u32) -> VaultResult<()> {
        let item = self.readable_item(item_id)?;
        self.catalog.update_progress(item.id, page)
    }

    pub fn toggle_favorite(&self, item_id: &str) -> VaultResult<bool> {
        let item = self.readable_item(item_id)?;
        self.catalog.toggle_favorite(item.id)
    }

    /// Apply the given changes to an item
    pub fn update_item(&self, item_id: &str, update: ItemUpdate) -> VaultResult<StoredItem> {
        let mut item = self.readable_item(item_id)?;

        if let Some(title) = update.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(VaultError::InvalidInput("title must not be empty".into()));
            }
            item.title = title.to_string();
        }
        if let Some(description) = update.description {
            item.description = description;
        }
        if let Some(tags) = update.tags {
            item.tags = tags;
        }
        if let Some(hidden) = update.hidden {
            item.hidden = hidden;
        }
        if let Some(cover_masked) = update.cover_masked {
            item.cover_masked = cover_masked;
        }

        self.catalog.save_item(&item)?;
        self.catalog.get_item(item.id)
    }

    /// Delete an item: its pages, its catalog entry and its preview
    pub fn delete_item(&self, item_id: &str) -> VaultResult<()> {
        let item = self.readable_item(item_id)?;
        let dir = resolve_within(&self.vault_dir, &[item.path.clone()])?;

        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        self.catalog.delete_item(item.id)?;
        self.previews.invalidate(&item.path);
        self.access.relock_item(&item.path);

        log::info!("🗑️ Deleted {}", item.path);
        Ok(())
    }
}

fn single_segment(raw: &str) -> VaultResult<String> {
    let mut segments = split_request_path(raw)?;
    if segments.len() != 1 {
        return Err(VaultError::UnsafePath(raw.to_string()));
    }
    Ok(segments.remove(0))
}

fn is_page(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(PAGE_EXTENSION))
        .unwrap_or(false)
}
