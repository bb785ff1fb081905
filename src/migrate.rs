//! Gallery Vault - Legacy Migration
//!
//! Registers vault directories written before the catalog existed. Those
//! directories may carry a `metadata.json` with reader state and a
//! `cover.db` file naming the cover page.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ReadingProgress, StoredItem};
use crate::error::VaultResult;
use crate::import::stored_pages;
use crate::natord::natural_cmp;

/// Per-item legacy metadata file
pub const LEGACY_METADATA: &str = "metadata.json";

/// Per-item legacy cover pointer
pub const LEGACY_COVER: &str = "cover.db";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyMetadata {
    tags: Vec<String>,
    description: String,
    mask_cover: bool,
    is_hidden: bool,
    last_page: i64,
    total_pages: i64,
    is_favorite: bool,
    /// Unix seconds, 0 when never read
    last_read_time: i64,
}

/// Migration outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub migrated: Vec<String>,
    /// Already cataloged
    pub skipped: Vec<String>,
}

/// Register every vault directory that is not cataloged yet
pub fn migrate_legacy(vault_dir: &Path, catalog: &Catalog) -> VaultResult<MigrationReport> {
    let mut report = MigrationReport::default();
    if !vault_dir.is_dir() {
        return Ok(report);
    }

    let mut names: Vec<String> = fs::read_dir(vault_dir)?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort_by(|a, b| natural_cmp(a, b));

    for name in names {
        if catalog.find_by_path(&name)?.is_some() {
            report.skipped.push(name);
            continue;
        }

        let item = legacy_item(&vault_dir.join(&name), &name);
        catalog.insert_item(&item)?;
        log::info!("📦 Migrated {}", name);
        report.migrated.push(name);
    }

    log::info!(
        "📦 Migration finished: {} migrated, {} skipped",
        report.migrated.len(),
        report.skipped.len()
    );
    Ok(report)
}

fn legacy_item(item_dir: &Path, name: &str) -> StoredItem {
    let meta = read_metadata(item_dir);
    let pages = stored_pages(item_dir);

    let cover = fs::read_to_string(item_dir.join(LEGACY_COVER))
        .ok()
        .map(|c| c.trim().replace('\\', "/"))
        .filter(|c| !c.is_empty())
        .or_else(|| pages.first().cloned())
        .unwrap_or_default();

    let total_pages = if meta.total_pages > 0 {
        meta.total_pages as u32
    } else {
        pages.len() as u32
    };

    StoredItem {
        title: name.to_string(),
        path: name.to_string(),
        cover_path: cover,
        description: meta.description,
        hidden: meta.is_hidden,
        cover_masked: meta.mask_cover,
        favorite: meta.is_favorite,
        progress: ReadingProgress {
            last_page: meta.last_page.max(0) as u32,
            total_pages,
            last_read: (meta.last_read_time > 0)
                .then(|| DateTime::<Utc>::from_timestamp(meta.last_read_time, 0))
                .flatten(),
        },
        tags: meta.tags,
        ..Default::default()
    }
}

fn read_metadata(item_dir: &Path) -> LegacyMetadata {
    let path = item_dir.join(LEGACY_METADATA);
    let Ok(data) = fs::read_to_string(&path) else {
        return LegacyMetadata::default();
    };

    serde_json::from_str(&data).unwrap_or_else(|e| {
        log::warn!("⚠️ Ignoring unreadable {}: {}", path.display(), e);
        LegacyMetadata::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_migrate_with_metadata() {
        let vault = tempdir().unwrap();
        let book = vault.path().join("Old Book");
        fs::create_dir_all(book.join("ch 1")).unwrap();
        fs::write(book.join("ch 1/p2.jpg"), b"x").unwrap();
        fs::write(book.join("ch 1/p10.jpg"), b"x").unwrap();
        fs::write(
            book.join(LEGACY_METADATA),
            r#"{"tags":["Drama"," drama ","Action"],"description":"d","is_hidden":true,
               "mask_cover":true,"last_page":4,"total_pages":0,"is_favorite":true,
               "last_read_time":1700000000}"#,
        )
        .unwrap();
        fs::write(book.join(LEGACY_COVER), "ch 1\\p10.jpg\n").unwrap();

        let catalog = Catalog::open_in_memory().unwrap();
        let report = migrate_legacy(vault.path(), &catalog).unwrap();
        assert_eq!(report.migrated, vec!["Old Book"]);

        let item = catalog.find_by_path("Old Book").unwrap().unwrap();
        assert_eq!(item.cover_path, "ch 1/p10.jpg");
        assert_eq!(item.tags, vec!["action", "drama"]);
        assert!(item.hidden && item.cover_masked && item.favorite);
        assert_eq!(item.progress.last_page, 4);
        assert_eq!(item.progress.total_pages, 2);
        assert_eq!(item.progress.last_read.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_migrate_without_metadata_and_skip_existing() {
        let vault = tempdir().unwrap();
        let book = vault.path().join("Plain");
        fs::create_dir_all(&book).unwrap();
        fs::write(book.join("b10.jpg"), b"x").unwrap();
        fs::write(book.join("b9.jpg"), b"x").unwrap();
        fs::write(book.join(LEGACY_METADATA), b"{ not json").unwrap();

        let catalog = Catalog::open_in_memory().unwrap();
        migrate_legacy(vault.path(), &catalog).unwrap();

        let item = catalog.find_by_path("Plain").unwrap().unwrap();
        assert_eq!(item.cover_path, "b9.jpg");
        assert!(item.progress.last_read.is_none());

        let again = migrate_legacy(vault.path(), &catalog).unwrap();
        assert!(again.migrated.is_empty());
        assert_eq!(again.skipped, vec!["Plain"]);
    }

    #[test]
    fn test_missing_vault_is_empty() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open_in_memory().unwrap();
        let report = migrate_legacy(&dir.path().join("vault"), &catalog).unwrap();
        assert_eq!(report, MigrationReport::default());
    }
}
