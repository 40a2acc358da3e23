//! Storage & Thumbnail Store (component A).
//!
//! A process-local filesystem root holding selfie uploads and per-event
//! thumbnails. Mirrors the teacher's `check_drive_info`/`get_media` idiom
//! for path handling (`path_clean`, posix-normalized relative paths) but
//! owns the write side rather than just serving reads.

use std::io;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::ImageFormat;
use path_clean::clean;
use thiserror::Error;
use tracing::warn;

const THUMBNAIL_JPEG_QUALITY: u8 = 84;
const ALLOWED_SELFIE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unsupported selfie extension: {0}")]
    UnsupportedExtension(String),
    #[error("filesystem error: {0}")]
    Io(#[from] io::Error),
    #[error("image decode/encode error: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Creates the store rooted at `root`, creating `selfies/` and
    /// `thumbnails/` beneath it if absent.
    ///
    /// # Errors
    /// If either directory can't be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("selfies"))?;
        std::fs::create_dir_all(root.join("thumbnails"))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persists selfie bytes under `selfies/<query_id>.<ext>`, returning the
    /// path relative to the store root.
    ///
    /// # Errors
    /// If `ext` isn't one of the allowed selfie extensions, or the write fails.
    pub fn save_selfie(
        &self,
        query_id: &str,
        ext: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let ext_lower = ext.trim_start_matches('.').to_ascii_lowercase();
        if !ALLOWED_SELFIE_EXTENSIONS.contains(&ext_lower.as_str()) {
            return Err(StorageError::UnsupportedExtension(ext_lower));
        }
        let safe_id = sanitize_identifier(query_id);
        let relative = format!("selfies/{safe_id}.{ext_lower}");
        let absolute = self.resolve(&relative)?;
        std::fs::write(&absolute, bytes)?;
        Ok(relative)
    }

    /// Regenerates a thumbnail for `event_id`/`remote_file_id` from decoded
    /// image bytes, capped at `max_side` on the longest edge, encoded as an
    /// 84-quality JPEG. Returns the path relative to the store root.
    ///
    /// # Errors
    /// If the bytes don't decode as an image, or the write fails.
    pub fn save_thumbnail(
        &self,
        event_id: &str,
        remote_file_id: &str,
        image_bytes: &[u8],
        max_side: u32,
    ) -> Result<String, StorageError> {
        let img = image::load_from_memory(image_bytes)?;
        let (w, h) = (img.width(), img.height());
        let resized = if w.max(h) > max_side {
            let (new_w, new_h) = if w >= h {
                (max_side, (h as f32 * max_side as f32 / w as f32) as u32)
            } else {
                ((w as f32 * max_side as f32 / h as f32) as u32, max_side)
            };
            img.resize(new_w.max(1), new_h.max(1), FilterType::Lanczos3)
        } else {
            img
        };

        let safe_event = sanitize_identifier(event_id);
        let safe_file = sanitize_identifier(remote_file_id);
        let relative = format!("thumbnails/{safe_event}/{safe_file}.jpg");
        let absolute = self.resolve(&relative)?;
        if let Some(parent) = absolute.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut encoded = Vec::new();
        let mut cursor = io::Cursor::new(&mut encoded);
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, THUMBNAIL_JPEG_QUALITY);
        resized.write_with_encoder(encoder)?;
        std::fs::write(&absolute, &encoded)?;
        let _ = ImageFormat::Jpeg; // format is fixed; kept for clarity at call sites
        Ok(relative)
    }

    /// Deletes a store-relative path if it exists; swallows any filesystem
    /// error (a missing file is not a caller-visible failure).
    pub fn delete_if_exists(&self, relative_path: &str) {
        if let Ok(absolute) = self.resolve(relative_path) {
            if let Err(e) = std::fs::remove_file(&absolute) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("failed to delete {}: {}", absolute.display(), e);
                }
            }
        }
    }

    /// Resolves a store-relative path to an absolute path, rejecting any
    /// attempt to escape the store root.
    ///
    /// # Errors
    /// If the cleaned path would fall outside the store root.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, StorageError> {
        let cleaned = clean(self.root.join(relative_path));
        if !cleaned.starts_with(&self.root) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path escapes storage root",
            )));
        }
        Ok(cleaned)
    }
}

/// Restricts an externally-sourced identifier to `[A-Za-z0-9_-]`, falling
/// back to `"item"` when nothing survives.
fn sanitize_identifier(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "item".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_identifiers() {
        assert_eq!(sanitize_identifier("abc-123_XYZ"), "abc-123_XYZ");
        assert_eq!(sanitize_identifier("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_identifier("???"), "item");
    }

    #[test]
    fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path()).unwrap();
        let resolved = store.resolve("../../etc/passwd");
        assert!(resolved.is_err() || resolved.unwrap().starts_with(dir.path()));
    }

    #[test]
    fn rejects_unsupported_selfie_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path()).unwrap();
        let err = store.save_selfie("q1", "exe", b"bytes").unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedExtension(_)));
    }
}
