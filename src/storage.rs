//! Gallery Vault - Vault Filesystem
//!
//! Atomic writes and confinement of request paths to the vault root.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::{VaultError, VaultResult};

/// Suffix of in-flight writes; readers never list these
pub const PARTIAL_SUFFIX: &str = ".part";

/// Write a file so readers only ever see the old or the complete new content
pub fn write_atomic(path: &Path, data: &[u8]) -> VaultResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = partial_path(path);

    let result = (|| -> VaultResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        file.write_all(data)?;
        file.sync_all()?;

        fs::rename(&temp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

/// Split a slash separated request path into validated segments.
///
/// Rejects empty paths, absolute paths and any `.`/`..` component before
/// anything touches the filesystem.
pub fn split_request_path(raw: &str) -> VaultResult<Vec<String>> {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        return Err(VaultError::UnsafePath("empty path".into()));
    }

    let mut segments = Vec::new();
    for segment in trimmed.split(['/', '\\']) {
        match segment {
            "" => continue,
            "." | ".." => return Err(VaultError::UnsafePath(raw.to_string())),
            s if s.contains('\0') || s.contains(':') => {
                return Err(VaultError::UnsafePath(raw.to_string()))
            }
            s => segments.push(s.to_string()),
        }
    }

    if segments.is_empty() {
        return Err(VaultError::UnsafePath(raw.to_string()));
    }
    Ok(segments)
}

/// Join segments under `root` and make sure the result stays inside it.
///
/// The lexical join is checked first; when the target exists it is also
/// canonicalized so symlinks cannot point outside the vault.
pub fn resolve_within(root: &Path, segments: &[String]) -> VaultResult<PathBuf> {
    let mut joined = root.to_path_buf();
    for segment in segments {
        let component = Path::new(segment);
        let mut components = component.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => joined.push(segment),
            _ => return Err(VaultError::UnsafePath(segment.clone())),
        }
    }

    if joined.exists() {
        let canonical_root = root.canonicalize()?;
        let canonical = joined.canonicalize()?;
        if !canonical.starts_with(&canonical_root) {
            return Err(VaultError::PathTraversal(segments.join("/")));
        }
    }

    Ok(joined)
}

/// Relative path with forward slashes, as stored in the catalog
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Total size of a directory tree
pub fn dir_size(path: &Path) -> VaultResult<u64> {
    let mut size = 0;

    if path.is_dir() {
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                size += dir_size(&path)?;
            } else {
                size += fs::metadata(&path)?.len();
            }
        }
    }

    Ok(size)
}
