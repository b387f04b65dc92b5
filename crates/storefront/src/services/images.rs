//! Product image storage on the local filesystem.
//!
//! Files live flat in the configured images directory and are served under
//! `/images`. Products store only the file name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

/// MIME types accepted for product images.
pub const ACCEPTED_CONTENT_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];

/// Errors from storing or removing an image.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("empty upload")]
    Empty,

    #[error("invalid image name: {0}")]
    InvalidName(String),

    #[error("image I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether an uploaded part's content type is an accepted image type.
#[must_use]
pub fn is_accepted_image(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ACCEPTED_CONTENT_TYPES.contains(&ct.to_ascii_lowercase().as_str()))
}

/// Filesystem-backed image store.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an uploaded image and return the stored file name.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnsupportedType` for non-image uploads,
    /// `UploadError::Empty` for zero-byte bodies, or `UploadError::Io` if the
    /// write fails.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn save(
        &self,
        original_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        if !is_accepted_image(content_type) {
            return Err(UploadError::UnsupportedType(
                content_type.unwrap_or("none").to_owned(),
            ));
        }
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }

        let file_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(original_name));
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;

        tracing::debug!(file_name = %file_name, "Stored product image");
        Ok(file_name)
    }

    /// Remove a stored image. A file that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidName` if `file_name` is not a plain file
    /// name, or `UploadError::Io` for any other removal failure.
    pub async fn delete(&self, file_name: &str) -> Result<(), UploadError> {
        if file_name.is_empty() || file_name != sanitize_file_name(file_name) {
            return Err(UploadError::InvalidName(file_name.to_owned()));
        }

        match tokio::fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(file_name = %file_name, "Image already removed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Keep the last path segment and replace anything outside `[A-Za-z0-9._-]`.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "image".to_owned()
    } else {
        cleaned.to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_store() -> ImageStore {
        ImageStore::new(std::env::temp_dir().join(format!("bazaar-images-{}", Uuid::new_v4())))
    }

    #[test]
    fn test_accepted_types() {
        assert!(is_accepted_image(Some("image/png")));
        assert!(is_accepted_image(Some("IMAGE/JPEG")));
        assert!(is_accepted_image(Some("image/jpg")));
        assert!(!is_accepted_image(Some("image/gif")));
        assert!(!is_accepted_image(Some("text/plain")));
        assert!(!is_accepted_image(None));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("lamp.png"), "lamp.png");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\pics\\my lamp.jpg"), "my_lamp.jpg");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "image");
    }

    #[tokio::test]
    async fn test_save_then_delete() {
        let store = temp_store();
        let name = store
            .save("lamp.png", Some("image/png"), b"\x89PNG")
            .await
            .unwrap();
        assert!(name.ends_with("-lamp.png"));
        assert!(store.dir().join(&name).exists());

        store.delete(&name).await.unwrap();
        assert!(!store.dir().join(&name).exists());

        // Second delete is a no-op.
        store.delete(&name).await.unwrap();

        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn test_save_rejects_non_images() {
        let store = temp_store();
        let err = store
            .save("notes.txt", Some("text/plain"), b"hello")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType(_)));

        let err = store.save("a.png", Some("image/png"), b"").await.unwrap_err();
        assert!(matches!(err, UploadError::Empty));
    }

    #[tokio::test]
    async fn test_delete_rejects_paths() {
        let store = temp_store();
        let err = store.delete("../secret.png").await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidName(_)));
    }
}
