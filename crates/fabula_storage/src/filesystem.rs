//! Filesystem-backed blob storage.
//!
//! Used for local runs and tests. Files land under
//! `{root}/{bucket}/{story_id}/{sequence}.{ext}` and the returned URL is a
//! `file://` URL over that path, which keeps the idempotency contract: the
//! same `(story_id, sequence, kind)` always maps to the same path.

use crate::blob::{ensure_payload, object_path, BlobStore, MediaKind};
use async_trait::async_trait;
use fabula_core::StoryId;
use fabula_error::{FabulaResult, StorageError, StorageErrorKind};
use std::path::PathBuf;

/// Filesystem storage backend.
pub struct FileSystemBlobStore {
    root: PathBuf,
    bucket_images: String,
    bucket_audio: String,
}

impl FileSystemBlobStore {
    /// Create a new filesystem backend rooted at `root`.
    ///
    /// Creates the root directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    #[tracing::instrument(skip_all)]
    pub fn new(
        root: impl Into<PathBuf>,
        bucket_images: impl Into<String>,
        bucket_audio: impl Into<String>,
    ) -> FabulaResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                root.display(),
                e
            )))
        })?;

        tracing::info!(path = %root.display(), "Created filesystem blob store");
        Ok(Self {
            root,
            bucket_images: bucket_images.into(),
            bucket_audio: bucket_audio.into(),
        })
    }

    fn bucket(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Image => &self.bucket_images,
            MediaKind::Audio => &self.bucket_audio,
        }
    }
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len(), kind = %kind, story_id = %story_id, sequence))]
    async fn put(
        &self,
        kind: MediaKind,
        story_id: StoryId,
        sequence: i32,
        bytes: &[u8],
    ) -> FabulaResult<String> {
        ensure_payload(bytes)?;

        let path = self
            .root
            .join(self.bucket(kind))
            .join(object_path(kind, story_id, sequence));

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        // Write to a temp file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, bytes).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;
        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        tracing::debug!(path = %path.display(), "Stored media file");
        Ok(format!("file://{}", path.display()))
    }
}
