use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

pub const ASSET_SUBDIR: &str = "task-assets";
pub const PUBLIC_PREFIX: &str = "/storage";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Invalid image format")]
    InvalidFormat,
    #[error("Image too large: {0} bytes (max {1} bytes)")]
    TooLarge(u64, u64),
    #[error("The image field is required.")]
    Missing,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An image received from a client, before validation.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Writes uploaded task images under a public storage directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    max_bytes: u64,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Validates the upload and returns the lowercase file extension to store it with.
    pub fn validate(
        &self,
        content_type: Option<&str>,
        file_name: Option<&str>,
        size: u64,
    ) -> Result<String, ImageError> {
        if size > self.max_bytes {
            return Err(ImageError::TooLarge(size, self.max_bytes));
        }
        let extension = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        let is_image_type = content_type.is_some_and(|ct| ct.starts_with("image/"));
        match extension {
            Some(ext) if is_allowed_extension(&ext) => Ok(ext),
            Some(_) => Err(ImageError::InvalidFormat),
            None if is_image_type => content_type
                .and_then(|ct| ct.strip_prefix("image/"))
                .map(|sub| if sub == "jpeg" { "jpg" } else { sub })
                .filter(|ext| is_allowed_extension(ext))
                .map(str::to_string)
                .ok_or(ImageError::InvalidFormat),
            None => Err(ImageError::InvalidFormat),
        }
    }

    /// Validates and stores an upload, returning its public URL.
    pub async fn store(&self, upload: &ImageUpload) -> Result<String, ImageError> {
        if upload.bytes.is_empty() {
            return Err(ImageError::Missing);
        }
        let extension = self.validate(
            upload.content_type.as_deref(),
            upload.file_name.as_deref(),
            upload.bytes.len() as u64,
        )?;
        self.save(&upload.bytes, &extension).await
    }

    /// Stores the bytes and returns the public URL of the new file.
    pub async fn save(&self, bytes: &[u8], extension: &str) -> Result<String, ImageError> {
        let dir = self.root.join(ASSET_SUBDIR);
        tokio::fs::create_dir_all(&dir).await?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(dir.join(&file_name), bytes).await?;
        Ok(format!("{PUBLIC_PREFIX}/{ASSET_SUBDIR}/{file_name}"))
    }

    /// Best-effort removal of a stored file, used when the database write fails.
    pub async fn discard(&self, url: &str) {
        let Some(relative) = url.strip_prefix(&format!("{PUBLIC_PREFIX}/")) else {
            return;
        };
        if let Err(err) = tokio::fs::remove_file(self.root.join(relative)).await {
            tracing::warn!(error = %err, url, "Failed to remove orphaned upload");
        }
    }
}

fn is_allowed_extension(ext: &str) -> bool {
    matches!(ext, "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "svg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_type_and_size() {
        let store = ImageStore::new("/tmp/unused", 10);
        assert_eq!(
            store.validate(Some("image/png"), Some("shot.PNG"), 5).unwrap(),
            "png"
        );
        assert_eq!(store.validate(Some("image/jpeg"), None, 5).unwrap(), "jpg");
        assert!(matches!(
            store.validate(Some("text/plain"), Some("notes.txt"), 5),
            Err(ImageError::InvalidFormat)
        ));
        assert!(matches!(
            store.validate(Some("image/png"), Some("big.png"), 11),
            Err(ImageError::TooLarge(11, 10))
        ));
    }

    #[tokio::test]
    async fn save_writes_under_asset_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), 1024);
        let url = store.save(b"png-bytes", "png").await.unwrap();
        assert!(url.starts_with("/storage/task-assets/"));
        assert!(url.ends_with(".png"));

        let relative = url.trim_start_matches("/storage/");
        let written = std::fs::read(dir.path().join(relative)).unwrap();
        assert_eq!(written, b"png-bytes");

        store.discard(&url).await;
        assert!(!dir.path().join(relative).exists());
    }
}
