//! Gallery Vault - Import
//!
//! Turns a directory of images into a vault item: scan, transcode and seal
//! in parallel, then register the item in the catalog.

pub mod pool;
pub mod scanner;
pub mod transcode;

pub use pool::{ImportFailure, ImportPool, ImportReport};
pub use scanner::{scan, stored_pages, ImportJob, ScanPlan};
pub use transcode::TranscodeSettings;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::{Catalog, StoredItem};
use crate::config::AppConfig;
use crate::crypto::Codec;
use crate::error::{VaultError, VaultResult};
use crate::natord::natural_cmp;
use crate::sanitize::sanitize_segment;

/// How an import treats an existing item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportMode {
    /// New item; fails if it already exists
    Create,
    /// Add pages missing from an existing (or new) item
    Sync,
}

/// Result of importing one item
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    /// Item identifier (directory name)
    pub item: String,
    pub mode: ImportMode,
    pub discovered: usize,
    pub skipped_existing: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<String>,
    pub total_pages: usize,
    /// Whether the item is in the catalog afterwards
    pub registered: bool,
}

/// Result of a batch import
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub imported: Vec<ImportSummary>,
    /// (directory name, reason)
    pub skipped: Vec<(String, String)>,
}

/// Runs imports against one vault
pub struct Importer<'a> {
    vault_dir: &'a Path,
    catalog: &'a Catalog,
    codec: &'a Codec,
    config: &'a AppConfig,
}

impl<'a> Importer<'a> {
    pub fn new(vault_dir: &'a Path, catalog: &'a Catalog, codec: &'a Codec, config: &'a AppConfig) -> Self {
        Self {
            vault_dir,
            catalog,
            codec,
            config,
        }
    }

    /// Import `source` as item `name`
    pub fn import(&self, name: &str, source: &Path, mode: ImportMode) -> VaultResult<ImportSummary> {
        let title = name.trim();
        if title.is_empty() {
            return Err(VaultError::InvalidInput("item name must not be empty".into()));
        }
        if source.as_os_str().is_empty() {
            return Err(VaultError::InvalidInput("source path must not be empty".into()));
        }
        if !source.is_dir() {
            return Err(VaultError::FileNotFound(source.display().to_string()));
        }

        let dir_name = sanitize_segment(title)
            .ok_or_else(|| VaultError::InvalidInput(format!("unusable item name: {}", name)))?;
        let item_dir = self.vault_dir.join(&dir_name);

        match mode {
            ImportMode::Create => self.create(title, &dir_name, &item_dir, source),
            ImportMode::Sync => self.sync(title, &dir_name, &item_dir, source),
        }
    }

    fn create(&self, title: &str, dir_name: &str, item_dir: &Path, source: &Path) -> VaultResult<ImportSummary> {
        if self.catalog.find_by_path(dir_name)?.is_some() {
            return Err(VaultError::DuplicateItem(dir_name.to_string()));
        }

        fs::create_dir_all(self.vault_dir)?;
        // Exclusive: a concurrent create for the same name loses here
        match fs::create_dir(item_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(VaultError::DuplicateItem(dir_name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let result = self.populate(title, dir_name, item_dir, source, ImportMode::Create);
        discard_unregistered(item_dir, result)
    }

    fn sync(&self, title: &str, dir_name: &str, item_dir: &Path, source: &Path) -> VaultResult<ImportSummary> {
        if item_dir.is_dir() {
            return self.populate(title, dir_name, item_dir, source, ImportMode::Sync);
        }

        fs::create_dir_all(item_dir)?;
        let result = self.populate(title, dir_name, item_dir, source, ImportMode::Sync);
        discard_unregistered(item_dir, result)
    }

    fn populate(
        &self,
        title: &str,
        dir_name: &str,
        item_dir: &Path,
        source: &Path,
        mode: ImportMode,
    ) -> VaultResult<ImportSummary> {
        let plan = scan(source, item_dir, mode == ImportMode::Sync)?;

        if mode == ImportMode::Create && plan.jobs.is_empty() {
            return Err(VaultError::NoImages(source.display().to_string()));
        }

        let settings = TranscodeSettings {
            max_width: self.config.max_width,
            jpeg_quality: self.config.jpeg_quality,
        };
        let workers = self.config.worker_count(plan.jobs.len());
        let report = ImportPool::new(self.codec, settings, workers).run(plan.jobs);

        let pages = stored_pages(item_dir);
        let cover = plan
            .cover
            .filter(|c| pages.contains(c))
            .or_else(|| pages.first().cloned())
            .unwrap_or_default();

        let registered = self.register(title, dir_name, &cover, pages.len())?;

        let summary = ImportSummary {
            item: dir_name.to_string(),
            mode,
            discovered: plan.discovered,
            skipped_existing: plan.skipped_existing,
            attempted: report.attempted,
            succeeded: report.succeeded,
            failed: report
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.source.display(), f.reason))
                .collect(),
            total_pages: pages.len(),
            registered,
        };

        log::info!(
            "✅ {:?} {}: {}/{} images imported ({} already present)",
            mode,
            dir_name,
            summary.succeeded,
            summary.attempted,
            summary.skipped_existing
        );
        Ok(summary)
    }

    /// Insert or refresh the catalog entry; false when there is nothing to register
    fn register(&self, title: &str, dir_name: &str, cover: &str, total_pages: usize) -> VaultResult<bool> {
        match self.catalog.find_by_path(dir_name)? {
            Some(existing) => {
                self.catalog.set_total_pages(existing.id, total_pages as u32)?;
                if existing.cover_path.is_empty() && !cover.is_empty() {
                    self.catalog.set_cover(existing.id, cover)?;
                }
                Ok(true)
            }
            None if total_pages == 0 => Ok(false),
            None => {
                self.catalog.insert_item(&StoredItem {
                    title: title.to_string(),
                    path: dir_name.to_string(),
                    cover_path: cover.to_string(),
                    progress: crate::catalog::ReadingProgress {
                        total_pages: total_pages as u32,
                        ..Default::default()
                    },
                    ..Default::default()
                })?;
                Ok(true)
            }
        }
    }

    /// Import every immediate sub-directory of `root` as a new item.
    ///
    /// Per-item failures are collected; a catalog failure stops the batch.
    pub fn batch_import(&self, root: &Path) -> VaultResult<BatchSummary> {
        let mut dirs: Vec<(String, PathBuf)> = fs::read_dir(root)?
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
            .collect();

        dirs.sort_by(|a, b| natural_cmp(&a.0, &b.0));

        let mut batch = BatchSummary::default();
        for (name, path) in dirs {
            match self.import(&name, &path, ImportMode::Create) {
                Ok(summary) if summary.registered => batch.imported.push(summary),
                Ok(_) => batch.skipped.push((name, "no image could be imported".into())),
                Err(e) if !e.is_recoverable() => return Err(e),
                Err(e) => {
                    log::warn!("⚠️ Skip [{}]: {}", name, e);
                    batch.skipped.push((name, e.to_string()));
                }
            }
        }

        log::info!(
            "📚 Batch import finished: {} imported, {} skipped",
            batch.imported.len(),
            batch.skipped.len()
        );
        Ok(batch)
    }
}

/// Remove a directory this import reserved when the item did not make it
/// into the catalog
fn discard_unregistered(item_dir: &Path, result: VaultResult<ImportSummary>) -> VaultResult<ImportSummary> {
    match &result {
        Ok(summary) if summary.registered => {}
        _ => {
            if let Err(e) = fs::remove_dir_all(item_dir) {
                log::warn!("⚠️ Could not remove {}: {}", item_dir.display(), e);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::VaultKey;
    use image::RgbImage;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _root: TempDir,
        vault_dir: PathBuf,
        catalog: Catalog,
        codec: Codec,
        config: AppConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempdir().unwrap();
            let config = AppConfig::with_base_dir(root.path());
            Self {
                vault_dir: config.vault_dir(),
                catalog: Catalog::open_in_memory().unwrap(),
                codec: Codec::new(&VaultKey::compat()).unwrap(),
                config,
                _root: root,
            }
        }

        fn importer(&self) -> Importer<'_> {
            Importer::new(&self.vault_dir, &self.catalog, &self.codec, &self.config)
        }
    }

    fn png(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::new(16, 16).save(path).unwrap();
    }

    #[test]
    fn test_create_registers_item() {
        let fx = Fixture::new();
        let src = tempdir().unwrap();
        png(&src.path().join("ch 2/p1.png"));
        png(&src.path().join("ch 10/p1.png"));
        fs::write(src.path().join("ch 2/broken.jpg"), b"nope").unwrap();

        let summary = fx
            .importer()
            .import("My: Book", src.path(), ImportMode::Create)
            .unwrap();

        assert_eq!(summary.item, "My_ Book");
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.registered);

        let item = fx.catalog.find_by_path("My_ Book").unwrap().unwrap();
        assert_eq!(item.title, "My: Book");
        assert_eq!(item.cover_path, "ch 2/p1.jpg");
        assert_eq!(item.progress.total_pages, 2);
        assert!(fx.vault_dir.join("My_ Book/ch 10/p1.jpg").exists());
    }

    #[test]
    fn test_create_rejects_duplicate() {
        let fx = Fixture::new();
        let src = tempdir().unwrap();
        png(&src.path().join("p.png"));

        fx.importer().import("Book", src.path(), ImportMode::Create).unwrap();
        let before = fs::read(fx.vault_dir.join("Book/p.jpg")).unwrap();

        assert!(matches!(
            fx.importer().import("Book", src.path(), ImportMode::Create),
            Err(VaultError::DuplicateItem(_))
        ));
        assert_eq!(fs::read(fx.vault_dir.join("Book/p.jpg")).unwrap(), before);
    }

    #[test]
    fn test_create_rejects_existing_directory() {
        let fx = Fixture::new();
        let src = tempdir().unwrap();
        png(&src.path().join("p.png"));
        fs::create_dir_all(fx.vault_dir.join("Book")).unwrap();

        assert!(matches!(
            fx.importer().import("Book", src.path(), ImportMode::Create),
            Err(VaultError::DuplicateItem(_))
        ));
        assert!(fx.vault_dir.join("Book").exists());
    }

    #[test]
    fn test_create_without_images_cleans_up() {
        let fx = Fixture::new();
        let src = tempdir().unwrap();
        fs::write(src.path().join("readme.txt"), b"hi").unwrap();

        assert!(matches!(
            fx.importer().import("Empty", src.path(), ImportMode::Create),
            Err(VaultError::NoImages(_))
        ));
        assert!(!fx.vault_dir.join("Empty").exists());
        assert_eq!(fx.catalog.count().unwrap(), 0);
    }

    #[test]
    fn test_invalid_input() {
        let fx = Fixture::new();
        let src = tempdir().unwrap();

        assert!(matches!(
            fx.importer().import("  ", src.path(), ImportMode::Create),
            Err(VaultError::InvalidInput(_))
        ));
        assert!(matches!(
            fx.importer().import("..", src.path(), ImportMode::Create),
            Err(VaultError::InvalidInput(_))
        ));
        assert!(matches!(
            fx.importer().import("Book", Path::new(""), ImportMode::Create),
            Err(VaultError::InvalidInput(_))
        ));
        assert!(!fx.vault_dir.exists());
    }

    #[test]
    fn test_sync_is_idempotent() {
        let fx = Fixture::new();
        let src = tempdir().unwrap();
        png(&src.path().join("a.png"));
        png(&src.path().join("b.png"));

        let first = fx.importer().import("Book", src.path(), ImportMode::Sync).unwrap();
        assert_eq!(first.succeeded, 2);
        assert!(first.registered);

        let second = fx.importer().import("Book", src.path(), ImportMode::Sync).unwrap();
        assert_eq!(second.attempted, 0);
        assert_eq!(second.succeeded, 0);
        assert_eq!(second.skipped_existing, 2);

        png(&src.path().join("c.png"));
        let third = fx.importer().import("Book", src.path(), ImportMode::Sync).unwrap();
        assert_eq!(third.succeeded, 1);

        let item = fx.catalog.find_by_path("Book").unwrap().unwrap();
        assert_eq!(item.progress.total_pages, 3);
        assert_eq!(item.cover_path, "a.jpg");
    }

    #[test]
    fn test_empty_sync_leaves_no_directory() {
        let fx = Fixture::new();
        let empty = tempdir().unwrap();

        let summary = fx.importer().import("Book", empty.path(), ImportMode::Sync).unwrap();
        assert!(!summary.registered);
        assert_eq!(summary.attempted, 0);
        assert!(!fx.vault_dir.join("Book").exists());

        let src = tempdir().unwrap();
        png(&src.path().join("p.png"));
        let created = fx.importer().import("Book", src.path(), ImportMode::Create).unwrap();
        assert!(created.registered);
        assert_eq!(created.total_pages, 1);
    }

    #[test]
    fn test_mislabeled_page_imports() {
        let fx = Fixture::new();
        let src = tempdir().unwrap();
        png(&src.path().join("real.png"));
        fs::rename(src.path().join("real.png"), src.path().join("page.jpg")).unwrap();

        let summary = fx.importer().import("Book", src.path(), ImportMode::Sync).unwrap();
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.succeeded, 1);
        assert!(summary.failed.is_empty());
        assert!(fx.vault_dir.join("Book/page.jpg").exists());
    }

    #[test]
    fn test_failed_sync_leaves_no_directory() {
        let fx = Fixture::new();
        let src = tempdir().unwrap();
        fs::write(src.path().join("broken.jpg"), b"nope").unwrap();

        let summary = fx.importer().import("Book", src.path(), ImportMode::Sync).unwrap();
        assert_eq!(summary.failed.len(), 1);
        assert!(!summary.registered);
        assert!(!fx.vault_dir.join("Book").exists());
    }

    #[test]
    fn test_sync_keeps_existing_directory() {
        let fx = Fixture::new();
        let src = tempdir().unwrap();
        png(&src.path().join("p.png"));
        fx.importer().import("Book", src.path(), ImportMode::Create).unwrap();

        let empty = tempdir().unwrap();
        let summary = fx.importer().import("Book", empty.path(), ImportMode::Sync).unwrap();
        assert!(summary.registered);
        assert!(fx.vault_dir.join("Book/p.jpg").exists());
    }

    #[test]
    fn test_batch_import() {
        let fx = Fixture::new();
        let root = tempdir().unwrap();
        png(&root.path().join("Vol 2/p.png"));
        png(&root.path().join("Vol 10/p.png"));
        fs::create_dir_all(root.path().join("Empty")).unwrap();
        fs::write(root.path().join("stray.png"), b"x").unwrap();

        fx.importer().import("Vol 10", &root.path().join("Vol 10"), ImportMode::Create).unwrap();

        let batch = fx.importer().batch_import(root.path()).unwrap();
        let imported: Vec<&str> = batch.imported.iter().map(|s| s.item.as_str()).collect();
        assert_eq!(imported, vec!["Vol 2"]);

        let skipped: Vec<&str> = batch.skipped.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(skipped, vec!["Empty", "Vol 10"]);
        assert_eq!(fx.catalog.count().unwrap(), 2);
    }
}
