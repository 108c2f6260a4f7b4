//! OpenRouter chat-completions adapter for the text stages.

use crate::retry::{transport_error, with_retries};
use crate::ProviderResult;
use async_trait::async_trait;
use fabula_config::TextProviderConfig;
use fabula_error::{FabulaResult, ProviderError, ProviderErrorKind};
use fabula_interface::{TextGenerator, TextRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Environment variable holding the OpenRouter API key.
pub const OPENROUTER_API_KEY_VAR: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// OpenRouter API client.
///
/// Returns the model's text verbatim; JSON extraction happens downstream in
/// the prompt assembler.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenRouterClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `OPENROUTER_API_KEY` is not set or the HTTP
    /// client cannot be initialized.
    pub fn new(config: &TextProviderConfig) -> ProviderResult<Self> {
        let api_key = std::env::var(OPENROUTER_API_KEY_VAR).map_err(|_| {
            ProviderError::new(ProviderErrorKind::MissingApiKey(
                OPENROUTER_API_KEY_VAR.to_string(),
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
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    async fn request_once(&self, req: &TextRequest) -> ProviderResult<String> {
        let payload = ChatRequest {
            model: req
                .model()
                .clone()
                .unwrap_or_else(|| self.model.clone()),
            messages: vec![ChatMessage {
                role: "user",
                content: req.prompt().clone(),
            }],
            max_tokens: req.max_tokens().unwrap_or(self.max_tokens),
            temperature: req.temperature().unwrap_or(self.temperature),
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %payload.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
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

        let body: ChatResponse = response.json().await.map_err(|e| {
            ProviderError::new(ProviderErrorKind::UpstreamMalformed(format!(
                "undecodable chat response: {e}"
            )))
        })?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::new(ProviderErrorKind::UpstreamMalformed(
                    "chat response with no usable choices".to_string(),
                ))
            })
    }
}

#[async_trait]
impl TextGenerator for OpenRouterClient {
    #[instrument(skip(self, req))]
    async fn generate(&self, req: &TextRequest) -> FabulaResult<String> {
        with_retries("openrouter", || self.request_once(req))
            .await
            .map_err(Into::into)
    }

    fn provider_name(&self) -> &'static str {
        "openrouter"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
