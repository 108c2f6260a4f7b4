//! Supabase object storage backend.
//!
//! Objects are PUT with `x-upsert` so redelivered jobs overwrite in place,
//! and the returned URL is the bucket's public-read URL for the same path.

use crate::blob::{ensure_payload, object_path, BlobStore, MediaKind};
use async_trait::async_trait;
use fabula_core::StoryId;
use fabula_error::{FabulaResult, StorageError, StorageErrorKind};
use reqwest::Client;
use std::time::Duration;

/// Environment variable holding the service-role key with write access to
/// both buckets.
pub const SUPABASE_SERVICE_KEY_VAR: &str = "SUPABASE_SERVICE_KEY";

/// Upload request deadline.
const UPLOAD_TIMEOUT_SECS: u64 = 60;

/// Supabase storage backend.
pub struct SupabaseBlobStore {
    client: Client,
    base_url: String,
    service_key: String,
    bucket_images: String,
    bucket_audio: String,
}

impl SupabaseBlobStore {
    /// Create a new backend for the given project URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `SUPABASE_SERVICE_KEY` is not set or the HTTP
    /// client cannot be initialized.
    pub fn new(
        base_url: impl Into<String>,
        bucket_images: impl Into<String>,
        bucket_audio: impl Into<String>,
    ) -> FabulaResult<Self> {
        let service_key = std::env::var(SUPABASE_SERVICE_KEY_VAR).map_err(|_| {
            StorageError::new(StorageErrorKind::NotWritable(format!(
                "{SUPABASE_SERVICE_KEY_VAR} environment variable not set"
            )))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| StorageError::new(StorageErrorKind::Upload(e.to_string())))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key,
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
impl BlobStore for SupabaseBlobStore {
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len(), kind = %kind, story_id = %story_id, sequence))]
    async fn put(
        &self,
        kind: MediaKind,
        story_id: StoryId,
        sequence: i32,
        bytes: &[u8],
    ) -> FabulaResult<String> {
        ensure_payload(bytes)?;

        let bucket = self.bucket(kind);
        let path = object_path(kind, story_id, sequence);
        let upload_url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);

        let response = self
            .client
            .post(&upload_url)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", kind.content_type())
            .header("x-upsert", "true")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StorageError::new(StorageErrorKind::Upload(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = match status.as_u16() {
                401 | 403 | 404 => StorageError::new(StorageErrorKind::NotWritable(format!(
                    "{bucket}: HTTP {status}: {body}"
                ))),
                _ => StorageError::new(StorageErrorKind::Upload(format!(
                    "HTTP {status}: {body}"
                ))),
            };
            return Err(err.into());
        }

        tracing::info!(bucket = %bucket, path = %path, "Uploaded media object");
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        ))
    }
}
