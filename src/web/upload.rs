// Image upload policy: which declared types are accepted, where accepted files
// go, and how a multipart field is streamed to disk.

use axum::extract::multipart::Field;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{IMAGES_URL_PREFIX, error::ApiError};

/// Declared content types accepted for uploaded images.
pub const ACCEPTED_IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

pub fn is_accepted_image(content_type: &str) -> bool {
    ACCEPTED_IMAGE_TYPES.contains(&content_type)
}

/// An image written to the upload directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub directory: PathBuf,
    pub file_name: String,
    pub original_name: String,
    pub content_type: String,
}

impl StoredImage {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    /// Relative URL under which the static layer serves this file.
    pub fn url(&self) -> String {
        format!("{}/{}", IMAGES_URL_PREFIX.trim_start_matches('/'), self.file_name)
    }
}

/// Fixed directory shared by every upload.
#[derive(Debug, Clone)]
pub struct UploadDestination {
    directory: PathBuf,
}

impl UploadDestination {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Assigns a fresh name: a random v4 uuid followed by the client's file name.
    pub fn resolve(&self, original_name: &str, content_type: &str) -> StoredImage {
        // Only the last path segment survives so a name cannot leave the directory.
        let original_name = Path::new(original_name)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        StoredImage {
            directory: self.directory.clone(),
            file_name: format!("{}{}", Uuid::new_v4(), original_name),
            original_name,
            content_type: content_type.to_string(),
        }
    }

    /// Maps a stored image URL back to its file, if it points into this directory.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let file_name = Path::new(url).file_name()?;
        Some(self.directory.join(file_name))
    }

    /// Best-effort removal of a previously stored image.
    pub async fn clear(&self, url: &str) {
        let Some(path) = self.path_for_url(url) else {
            return;
        };
        match fs::remove_file(&path).await {
            Ok(()) => debug!("Removed image {}", path.display()),
            Err(e) => warn!("Failed to remove image {}: {}", path.display(), e),
        }
    }

    /// Streams an accepted field to disk. On any failure the partial file is
    /// removed before the error is returned.
    pub async fn store(&self, mut field: Field<'_>) -> Result<StoredImage, ApiError> {
        let content_type = field.content_type().unwrap_or_default().to_string();
        let original_name = field.file_name().unwrap_or_default().to_string();
        let stored = self.resolve(&original_name, &content_type);
        let path = stored.path();

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        let written = async {
            let mut total = 0usize;
            while let Some(chunk) = field.chunk().await? {
                total += chunk.len();
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<_, ApiError>(total)
        }
        .await;

        match written {
            Ok(total) => {
                debug!(
                    original_name = %stored.original_name,
                    content_type = %stored.content_type,
                    "Stored upload {} ({} bytes)",
                    path.display(),
                    total
                );
                Ok(stored)
            }
            Err(e) => {
                drop(file);
                if let Err(remove_err) = fs::remove_file(&path).await {
                    warn!(
                        "Failed to remove partial upload {}: {}",
                        path.display(),
                        remove_err
                    );
                }
                Err(e)
            }
        }
    }
}
