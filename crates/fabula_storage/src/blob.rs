//! Blob store trait definition.

use async_trait::async_trait;
use fabula_core::StoryId;
use fabula_error::{FabulaResult, StorageError, StorageErrorKind};

/// Payloads below this size are degenerate media masquerading as success.
pub const MIN_PAYLOAD_BYTES: usize = 100;

/// The two media kinds the pipeline stores, each in its own bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Scene illustration (PNG)
    Image,
    /// Scene narration (MP3)
    Audio,
}

impl MediaKind {
    /// File extension for this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "png",
            MediaKind::Audio => "mp3",
        }
    }

    /// MIME type for this kind.
    pub fn content_type(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/png",
            MediaKind::Audio => "audio/mpeg",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => f.write_str("image"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

/// Object name under the kind's bucket: `<story_id>/<sequence>.<ext>`.
pub(crate) fn object_path(kind: MediaKind, story_id: StoryId, sequence: i32) -> String {
    format!("{}/{}.{}", story_id, sequence, kind.extension())
}

/// Reject payloads below [`MIN_PAYLOAD_BYTES`].
pub(crate) fn ensure_payload(bytes: &[u8]) -> Result<(), StorageError> {
    if bytes.len() < MIN_PAYLOAD_BYTES {
        return Err(StorageError::new(StorageErrorKind::InvalidPayload {
            size: bytes.len(),
            minimum: MIN_PAYLOAD_BYTES,
        }));
    }
    Ok(())
}

/// Trait for pluggable blob storage backends.
///
/// Uploads are idempotent with respect to `(story_id, sequence, kind)`:
/// re-invocation overwrites the object and returns the same URL. Returned
/// URLs are public-readable by contract.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store media bytes and return the public URL.
    async fn put(
        &self,
        kind: MediaKind,
        story_id: StoryId,
        sequence: i32,
        bytes: &[u8],
    ) -> FabulaResult<String>;

    /// Store a scene illustration.
    async fn put_image(
        &self,
        story_id: StoryId,
        sequence: i32,
        bytes: &[u8],
    ) -> FabulaResult<String> {
        self.put(MediaKind::Image, story_id, sequence, bytes).await
    }

    /// Store a scene narration clip.
    async fn put_audio(
        &self,
        story_id: StoryId,
        sequence: i32,
        bytes: &[u8],
    ) -> FabulaResult<String> {
        self.put(MediaKind::Audio, story_id, sequence, bytes).await
    }
}
