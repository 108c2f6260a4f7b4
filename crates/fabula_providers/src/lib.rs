//! Provider adapters for the Fabula story pipeline.
//!
//! Three outbound HTTP adapters — OpenRouter (text), Together (image),
//! ElevenLabs (audio) — plus mock implementations that return canned output
//! after a configurable delay. All adapters share one retry executor:
//! exponential backoff with jitter, three attempts, retrying on network
//! failures and HTTP 408/429/5xx.

#![forbid(unsafe_code)]

mod elevenlabs;
mod mock;
mod openrouter;
mod retry;
mod together;

pub use elevenlabs::ElevenLabsClient;
pub use mock::{MockAudioSynthesizer, MockImageGenerator, MockTextGenerator};
pub use openrouter::OpenRouterClient;
pub use together::TogetherClient;

/// Result type for adapter-internal operations.
pub type ProviderResult<T> = std::result::Result<T, fabula_error::ProviderError>;
