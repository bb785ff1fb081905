//! Gallery Vault - Content
//!
//! Decrypting page reads and the cover preview cache.
//!
//! Previews are stored as plaintext JPEGs under the cache directory, outside
//! the encrypted vault. Anyone with access to the base directory can see the
//! covers of every item that was previewed at least once.

use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::crypto::{sha256_hex, Codec, Opened};
use crate::error::{VaultError, VaultResult};
use crate::import::transcode::{encode_jpeg, resize_to_width};
use crate::storage::{resolve_within, write_atomic};

/// Decrypted page ready to serve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

impl Page {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: "image/jpeg",
        }
    }
}

/// Sniff the image type of decrypted bytes (JPEG when unknown)
pub fn content_type_of(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::Bmp) => "image/bmp",
        _ => "image/jpeg",
    }
}

/// Read and decrypt `segments` (item id first) under the vault root.
///
/// The caller has already passed the access check for the item.
pub fn read_page(vault_dir: &Path, codec: &Codec, segments: &[String]) -> VaultResult<Page> {
    let path = resolve_within(vault_dir, segments)?;
    if !path.is_file() {
        return Err(VaultError::FileNotFound(segments.join("/")));
    }

    let sealed = fs::read(&path)?;
    let bytes = match codec.open(&sealed) {
        Opened::Decrypted(plain) => plain,
        Opened::Passthrough(raw) => {
            log::warn!("⚠️ Serving {} as legacy plaintext", segments.join("/"));
            raw
        }
    };

    Ok(Page {
        content_type: content_type_of(&bytes),
        bytes,
    })
}

/// Plaintext cover preview cache
pub struct PreviewCache {
    dir: PathBuf,
    width: u32,
    quality: u8,
}

impl PreviewCache {
    pub fn new(dir: &Path, width: u32, quality: u8) -> Self {
        Self {
            dir: dir.to_path_buf(),
            width,
            quality,
        }
    }

    /// Cache file for an item; the id is hashed so any name is a safe file name
    pub fn cache_path(&self, item_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.jpg", sha256_hex(&item_id.to_lowercase())))
    }

    /// Cached preview, if any
    pub fn get(&self, item_id: &str) -> Option<Vec<u8>> {
        let bytes = fs::read(self.cache_path(item_id)).ok()?;
        log::debug!("Preview cache hit: {}", item_id);
        Some(bytes)
    }

    /// Render a preview from a sealed cover and cache it
    pub fn render(&self, item_id: &str, codec: &Codec, sealed_cover: &[u8]) -> VaultResult<Vec<u8>> {
        let plain = codec.try_decrypt(sealed_cover);
        let img = image::load_from_memory(&plain)
            .map_err(|e| VaultError::PreviewFailed(e.to_string()))?;

        let preview = encode_jpeg(&resize_to_width(&img, self.width), self.quality)?;

        if let Err(e) = write_atomic(&self.cache_path(item_id), &preview) {
            log::warn!("⚠️ Could not cache preview for {}: {}", item_id, e);
        }
        Ok(preview)
    }

    /// Drop the cached preview of an item
    pub fn invalidate(&self, item_id: &str) {
        let path = self.cache_path(item_id);
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("Preview dropped: {}", item_id),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("⚠️ Could not drop preview {}: {}", path.display(), e),
        }
    }
}
