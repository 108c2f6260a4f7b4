//! Together image-generation adapter.

use crate::retry::{transport_error, with_retries};
use crate::ProviderResult;
use async_trait::async_trait;
use base64::Engine as _;
use fabula_config::ImageProviderConfig;
use fabula_error::{FabulaResult, ProviderError, ProviderErrorKind};
use fabula_interface::{ImageGenerator, ImageRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Environment variable holding the Together API key.
pub const TOGETHER_API_KEY_VAR: &str = "TOGETHER_API_KEY";

/// Appended to every illustration prompt. Guards against the model drifting
/// into content unsuitable for a children's story.
const SAFETY_SUFFIX: &str = "\nThis image must be safe for children. No nudity, violence, or inappropriate content. G-rated. Wholesome.";

/// Upstream bodies below this size are degenerate, not images.
const MIN_IMAGE_BYTES: usize = 100;

#[derive(Debug, Serialize)]
struct ImageGenRequest {
    model: String,
    prompt: String,
    width: u32,
    height: u32,
    steps: u32,
    response_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ImageGenResponse {
    data: Vec<ImagePayload>,
}

#[derive(Debug, Deserialize)]
struct ImagePayload {
    b64_json: Option<String>,
}

/// Together API client returning raw PNG bytes.
#[derive(Debug, Clone)]
pub struct TogetherClient {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl TogetherClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `TOGETHER_API_KEY` is not set or the HTTP client
    /// cannot be initialized.
    pub fn new(config: &ImageProviderConfig) -> ProviderResult<Self> {
        let api_key = std::env::var(TOGETHER_API_KEY_VAR).map_err(|_| {
            ProviderError::new(ProviderErrorKind::MissingApiKey(
                TOGETHER_API_KEY_VAR.to_string(),
            ))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::new(ProviderErrorKind::ClientCreation(e.to_string())))?;

        Ok(Self {
            client,
            api_key,
            url: config.base_url.clone(),
            model: config.model.clone(),
        })
    }

    async fn request_once(&self, req: &ImageRequest) -> ProviderResult<Vec<u8>> {
        let payload = ImageGenRequest {
            model: self.model.clone(),
            prompt: format!("{}{}", req.prompt, SAFETY_SUFFIX),
            width: req.width,
            height: req.height,
            steps: req.steps,
            response_format: "b64_json",
            seed: req.seed,
        };

        debug!(url = %self.url, model = %self.model, "Sending image generation request");

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let body: ImageGenResponse = response.json().await.map_err(|e| {
            ProviderError::new(ProviderErrorKind::UpstreamMalformed(format!(
                "undecodable image response: {e}"
            )))
        })?;

        let encoded = body
            .data
            .into_iter()
            .next()
            .and_then(|p| p.b64_json)
            .ok_or_else(|| {
                ProviderError::new(ProviderErrorKind::UpstreamMalformed(
                    "image response with no b64_json payload".to_string(),
                ))
            })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| {
                ProviderError::new(ProviderErrorKind::UpstreamMalformed(format!(
                    "image payload is not valid base64: {e}"
                )))
            })?;

        if bytes.len() < MIN_IMAGE_BYTES {
            return Err(ProviderError::new(ProviderErrorKind::UpstreamMalformed(
                format!("image payload of {} bytes is degenerate", bytes.len()),
            )));
        }

        debug!(size = bytes.len(), "Decoded image payload");
        Ok(bytes)
    }
}

#[async_trait]
impl ImageGenerator for TogetherClient {
    #[instrument(skip(self, req))]
    async fn render(&self, req: &ImageRequest) -> FabulaResult<Vec<u8>> {
        with_retries("together", || self.request_once(req))
            .await
            .map_err(Into::into)
    }

    fn provider_name(&self) -> &'static str {
        "together"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
