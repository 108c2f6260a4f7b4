//! Trait definitions for the three provider adapters.

use crate::{AudioRequest, ImageRequest, TextRequest};
use async_trait::async_trait;
use fabula_error::FabulaResult;

/// Text LLM adapter.
///
/// Performs one bounded outbound call and returns the response body verbatim;
/// JSON extraction and validation happen in the prompt assembler, not here.
/// Retries within the adapter's budget are invisible to callers.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for the given prompt.
    async fn generate(&self, req: &TextRequest) -> FabulaResult<String>;

    /// Provider name (e.g., "openrouter").
    fn provider_name(&self) -> &'static str;

    /// Default model identifier used when the request does not override it.
    fn model_name(&self) -> &str;
}

/// Image generation adapter.
///
/// Returns raw image bytes (PNG assumed). The adapter owns base64 decoding
/// when the upstream wraps payloads.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Render an illustration for the given prompt.
    async fn render(&self, req: &ImageRequest) -> FabulaResult<Vec<u8>>;

    /// Provider name (e.g., "together").
    fn provider_name(&self) -> &'static str;

    /// Default model identifier.
    fn model_name(&self) -> &str;
}

/// Audio synthesis adapter.
///
/// Returns raw audio bytes (MP3 assumed).
#[async_trait]
pub trait AudioSynthesizer: Send + Sync {
    /// Synthesize narration audio for the given text.
    async fn narrate(&self, req: &AudioRequest) -> FabulaResult<Vec<u8>>;

    /// Provider name (e.g., "elevenlabs").
    fn provider_name(&self) -> &'static str;
}
