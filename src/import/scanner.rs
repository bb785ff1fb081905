//! Gallery Vault - Tree Scanner
//!
//! Walks a source tree and plans where every image lands in the vault.
//! Sub-directories become chapters; each segment is sanitized on its own
//! and page files are renamed to the stored extension.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{VaultError, VaultResult};
use crate::natord::natural_cmp;
use crate::sanitize::{page_file_name, sanitize_segment, PAGE_EXTENSION};
use crate::storage::to_slash;

/// Source extensions picked up by the scanner
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// One file to transcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    pub source: PathBuf,
    pub dest: PathBuf,
}

/// Scan result
#[derive(Debug, Default)]
pub struct ScanPlan {
    /// Work items in natural order
    pub jobs: Vec<ImportJob>,
    /// Item-relative path of the first image found
    pub cover: Option<String>,
    /// Images found in the source tree
    pub discovered: usize,
    /// Already present at their destination (sync only)
    pub skipped_existing: usize,
    /// Sources dropped because an earlier file maps to the same destination
    pub collisions: Vec<PathBuf>,
}

/// Check the extension against the importable set
pub fn is_importable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Plan the import of `source_root` into `item_dir`.
///
/// With `skip_existing`, files whose destination already exists are counted
/// but not queued.
pub fn scan(source_root: &Path, item_dir: &Path, skip_existing: bool) -> VaultResult<ScanPlan> {
    if !source_root.is_dir() {
        return Err(VaultError::FileNotFound(source_root.display().to_string()));
    }

    let mut plan = ScanPlan::default();
    let mut seen: HashSet<String> = HashSet::new();

    let walker = WalkDir::new(source_root)
        .follow_links(false)
        .sort_by(|a, b| {
            natural_cmp(&a.file_name().to_string_lossy(), &b.file_name().to_string_lossy())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("⚠️ Skipping unreadable entry: {}", e);
                continue;
            }
        };

        // Linked files are read through the link; linked directories are not descended
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file || !is_importable(entry.path()) {
            continue;
        }

        let relative = match entry.path().strip_prefix(source_root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };

        let Some(dest_relative) = destination_for(relative) else {
            log::warn!("⚠️ Skipping unsafe name: {}", relative.display());
            continue;
        };

        plan.discovered += 1;

        let key = to_slash(&dest_relative);
        if !seen.insert(key.to_lowercase()) {
            log::warn!("⚠️ {} collides with an earlier page, skipped", relative.display());
            plan.collisions.push(entry.path().to_path_buf());
            continue;
        }

        if plan.cover.is_none() {
            plan.cover = Some(key);
        }

        let dest = item_dir.join(&dest_relative);
        if skip_existing && dest.exists() {
            plan.skipped_existing += 1;
            continue;
        }

        plan.jobs.push(ImportJob {
            source: entry.path().to_path_buf(),
            dest,
        });
    }

    Ok(plan)
}

/// Map a source-relative path to its item-relative destination
fn destination_for(relative: &Path) -> Option<PathBuf> {
    let parts: Vec<String> = relative
        .iter()
        .map(|part| part.to_string_lossy().into_owned())
        .collect();

    let (file_name, chapters) = parts.split_last()?;

    let mut dest = PathBuf::new();
    for chapter in chapters {
        dest.push(sanitize_segment(chapter)?);
    }
    dest.push(page_file_name(file_name)?);
    Some(dest)
}

fn is_stored_page(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(PAGE_EXTENSION))
        .unwrap_or(false)
}

/// Stored pages under an item directory, item-relative, in natural order
pub fn stored_pages(item_dir: &Path) -> Vec<String> {
    WalkDir::new(item_dir)
        .sort_by(|a, b| {
            natural_cmp(&a.file_name().to_string_lossy(), &b.file_name().to_string_lossy())
        })
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_stored_page(e.path()))
        .filter_map(|e| e.path().strip_prefix(item_dir).ok().map(to_slash))
        .collect()
}
