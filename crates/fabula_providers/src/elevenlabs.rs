//! ElevenLabs text-to-speech adapter.

use crate::retry::{transport_error, with_retries};
use crate::ProviderResult;
use async_trait::async_trait;
use fabula_config::AudioProviderConfig;
use fabula_error::{FabulaResult, ProviderError, ProviderErrorKind};
use fabula_interface::{AudioRequest, AudioSynthesizer};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// Environment variable holding the ElevenLabs API key.
pub const ELEVENLABS_API_KEY_VAR: &str = "ELEVENLABS_API_KEY";

/// MP3 output profile requested from the API.
const OUTPUT_FORMAT: &str = "mp3_22050_32";

/// ElevenLabs API client returning raw MP3 bytes.
#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    client: Client,
    api_key: String,
    base_url: String,
    voice_id: String,
    use_v3: bool,
}

impl ElevenLabsClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `ELEVENLABS_API_KEY` is not set or the HTTP
    /// client cannot be initialized.
    pub fn new(config: &AudioProviderConfig) -> ProviderResult<Self> {
        let api_key = std::env::var(ELEVENLABS_API_KEY_VAR).map_err(|_| {
            ProviderError::new(ProviderErrorKind::MissingApiKey(
                ELEVENLABS_API_KEY_VAR.to_string(),
            ))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::new(ProviderErrorKind::ClientCreation(e.to_string())))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.clone(),
            voice_id: config.voice_id.clone(),
            use_v3: config.use_v3,
        })
    }

    async fn request_once(&self, req: &AudioRequest) -> ProviderResult<Vec<u8>> {
        let voice_id = req.voice_id.as_deref().unwrap_or(&self.voice_id);
        let url = format!("{}/text-to-speech/{}", self.base_url, voice_id);

        let mut payload = json!({ "text": req.text });
        if self.use_v3 || req.high_quality {
            payload["model_id"] = json!("eleven_v3");
            payload["voice_settings"] = json!({
                "stability": 0.7,
                "similarity_boost": 0.7,
                "style": 0.7,
                "use_speaker_boost": true
            });
        }

        debug!(url = %url, text_len = req.text.len(), "Sending text-to-speech request");

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .query(&[("output_format", OUTPUT_FORMAT)])
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        if bytes.is_empty() {
            return Err(ProviderError::new(ProviderErrorKind::UpstreamMalformed(
                "empty audio payload".to_string(),
            )));
        }

        debug!(size = bytes.len(), "Received audio payload");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AudioSynthesizer for ElevenLabsClient {
    #[instrument(skip(self, req))]
    async fn narrate(&self, req: &AudioRequest) -> FabulaResult<Vec<u8>> {
        with_retries("elevenlabs", || self.request_once(req))
            .await
            .map_err(Into::into)
    }

    fn provider_name(&self) -> &'static str {
        "elevenlabs"
    }
}
