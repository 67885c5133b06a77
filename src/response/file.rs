//! Upload directory handling: persisted uploads and transient scratch files

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Handler for the upload directory
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    /// Create a new upload directory handler
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ensure the upload directory exists
    pub async fn ensure_exists(&self) -> Result<()> {
        if !fs::try_exists(&self.root).await.unwrap_or(false) {
            fs::create_dir_all(&self.root).await.map_err(AppError::Io)?;
            debug!(path = ?self.root, "Created upload directory");
        }
        Ok(())
    }

    /// Save an uploaded file under the given name
    pub async fn save(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        self.ensure_exists().await?;

        let file_path = self.root.join(filename);
        fs::write(&file_path, data).await.map_err(AppError::Io)?;

        debug!(path = ?file_path, size = data.len(), "Saved uploaded image");

        Ok(file_path)
    }

    /// Write bytes to a uniquely named scratch file that is removed when the guard drops
    pub async fn scratch(&self, label: &str, data: &[u8]) -> Result<ScratchFile> {
        self.ensure_exists().await?;

        let file_path = self.root.join(format!("temp_{}_{}.png", label, Uuid::new_v4()));
        let guard = ScratchFile { path: file_path };
        fs::write(guard.path(), data).await.map_err(AppError::Io)?;

        debug!(path = ?guard.path(), size = data.len(), "Wrote scratch file");

        Ok(guard)
    }

}

/// A transient file deleted on drop, whatever path the request took
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // Synchronous: the file must be gone when the guard is, and scratch files are small
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = ?self.path, "Removed scratch file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, error = %e, "Failed to remove scratch file"),
        }
    }
}

/// File extension for an uploaded file: text after the last '.', "jpg" otherwise.
/// Only ASCII alphanumerics are kept so the stored name stays inside the upload directory.
pub fn upload_extension(original_name: &str) -> String {
    let ext: String = original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.chars().filter(char::is_ascii_alphanumeric).collect())
        .unwrap_or_default();

    if ext.is_empty() {
        "jpg".to_string()
    } else {
        ext
    }
}

/// Detect image format from binary data using magic bytes
pub fn detect_image_format(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpeg");
    }

    // GIF: GIF87a or GIF89a
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("gif");
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("webp");
    }

    // BMP: BM
    if data.starts_with(b"BM") {
        return Some("bmp");
    }

    None
}
