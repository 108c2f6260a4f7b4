//! Request types for the provider adapters.

use serde::{Deserialize, Serialize};

/// A text generation request.
///
/// # Examples
///
/// ```
/// use fabula_interface::TextRequest;
///
/// let request = TextRequest::builder()
///     .prompt("Write a haiku about rivers.")
///     .max_tokens(Some(128))
///     .temperature(Some(0.7))
///     .build()
///     .unwrap();
///
/// assert_eq!(request.max_tokens(), &Some(128));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TextRequest {
    /// The full prompt to send
    prompt: String,
    /// Maximum number of tokens to generate
    max_tokens: Option<u32>,
    /// Sampling temperature (0.0 to 1.0)
    temperature: Option<f32>,
    /// Model identifier overriding the adapter default
    model: Option<String>,
}

impl TextRequest {
    /// Creates a new builder for TextRequest.
    pub fn builder() -> TextRequestBuilder {
        TextRequestBuilder::default()
    }

    /// Returns the prompt.
    pub fn prompt(&self) -> &String {
        &self.prompt
    }

    /// Returns the max_tokens.
    pub fn max_tokens(&self) -> &Option<u32> {
        &self.max_tokens
    }

    /// Returns the temperature.
    pub fn temperature(&self) -> &Option<f32> {
        &self.temperature
    }

    /// Returns the model.
    pub fn model(&self) -> &Option<String> {
        &self.model
    }
}

/// Builder for TextRequest.
#[derive(Debug, Clone, Default)]
pub struct TextRequestBuilder {
    prompt: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    model: Option<String>,
}

impl TextRequestBuilder {
    /// Sets the prompt.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Sets the max_tokens.
    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the temperature.
    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the model.
    pub fn model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Builds the TextRequest.
    pub fn build(self) -> Result<TextRequest, String> {
        Ok(TextRequest {
            prompt: self.prompt.ok_or("prompt is required")?,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            model: self.model,
        })
    }
}

/// An image generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// The illustration prompt
    pub prompt: String,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Diffusion step count
    pub steps: u32,
    /// Optional seed for reproducible output
    pub seed: Option<u64>,
}

impl ImageRequest {
    /// Create a request with the given prompt and dimensions.
    pub fn new(prompt: impl Into<String>, width: u32, height: u32, steps: u32) -> Self {
        Self {
            prompt: prompt.into(),
            width,
            height,
            steps,
            seed: None,
        }
    }
}

/// An audio synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRequest {
    /// Narration text to speak
    pub text: String,
    /// Voice identifier overriding the adapter default
    pub voice_id: Option<String>,
    /// Request the higher-quality synthesis path
    pub high_quality: bool,
}

impl AudioRequest {
    /// Create a request with the adapter's default voice.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: None,
            high_quality: false,
        }
    }
}
