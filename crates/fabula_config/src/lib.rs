//! Configuration for the Fabula pipeline.
//!
//! Configuration is loaded once at process start and injected by reference;
//! nothing mutates it afterwards. The precedence system layers:
//! 1. Bundled defaults (`include_str!` from `fabula.toml`)
//! 2. User override (`./fabula.toml`, optional)
//! 3. `FABULA_`-prefixed environment variables (`__` as section separator)
//!
//! Secrets — provider API keys, `DATABASE_URL`, the Supabase service key —
//! are read from plain environment variables by the components that need
//! them, never from the TOML layer.

#![forbid(unsafe_code)]

use config::{Config, Environment, File, FileFormat};
use fabula_error::{ConfigError, FabulaResult};
use serde::{Deserialize, Serialize};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../fabula.toml");

/// Worker and orchestration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Max concurrent scenes per job
    pub scene_parallelism: usize,
    /// Max concurrent jobs per worker process
    pub job_parallelism: usize,
    /// Deliveries before a job is declared FAILED
    pub max_attempts: u32,
    /// Broker redelivery window in seconds
    pub visibility_timeout_secs: u64,
    /// Broker queue name, fixed per deployment
    pub queue_name: String,
}

/// Broker connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// Redis connection URL
    pub redis_url: String,
}

/// Blob storage destinations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Supabase project URL; filesystem storage is used when unset
    #[serde(default)]
    pub supabase_url: Option<String>,
    /// Bucket for scene illustrations
    pub bucket_images: String,
    /// Bucket for narration clips
    pub bucket_audio: String,
    /// Root directory for the filesystem backend
    pub filesystem_root: String,
}

/// Text LLM provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextProviderConfig {
    /// API base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Request deadline in seconds
    pub timeout_secs: u64,
    /// Generation token cap
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// Image provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageProviderConfig {
    /// Image generation endpoint
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Diffusion step count
    pub steps: u32,
    /// Request deadline in seconds
    pub timeout_secs: u64,
}

/// Audio provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioProviderConfig {
    /// API base URL
    pub base_url: String,
    /// Narration voice identifier
    pub voice_id: String,
    /// Enable the v3 voice-settings block
    pub use_v3: bool,
    /// Request deadline in seconds
    pub timeout_secs: u64,
}

/// Mock-mode settings for development and tests.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockConfig {
    /// Swap every provider adapter for a canned implementation
    pub mock_ai: bool,
    /// Simulated latency per mock call, in milliseconds
    pub delay_ms: u64,
    /// Directory of fixture files overriding the built-in samples
    #[serde(default)]
    pub fixture_dir: Option<String>,
}

/// Top-level Fabula configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FabulaConfig {
    /// Worker and orchestration settings
    pub pipeline: PipelineConfig,
    /// Broker connection settings
    pub broker: BrokerConfig,
    /// Blob storage destinations
    pub storage: StorageConfig,
    /// Text LLM provider settings
    pub text: TextProviderConfig,
    /// Image provider settings
    pub image: ImageProviderConfig,
    /// Audio provider settings
    pub audio: AudioProviderConfig,
    /// Mock-mode settings
    pub mock: MockConfig,
}

impl FabulaConfig {
    /// Load configuration with the bundled-defaults / user-file / environment
    /// precedence.
    pub fn load() -> FabulaResult<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::with_name("fabula").required(false))
            .add_source(Environment::with_prefix("FABULA").separator("__"))
            .build()
            .map_err(|e| ConfigError::new(format!("failed to assemble configuration: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("invalid configuration: {e}")).into())
    }

    /// Load only the bundled defaults, ignoring user files and environment.
    ///
    /// Used by tests that must not be perturbed by the host environment.
    pub fn defaults() -> FabulaResult<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .map_err(|e| ConfigError::new(format!("failed to assemble configuration: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("invalid bundled defaults: {e}")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_defaults_deserialize() {
        let config = FabulaConfig::defaults().unwrap();
        assert_eq!(config.pipeline.scene_parallelism, 3);
        assert_eq!(config.pipeline.job_parallelism, 1);
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.pipeline.visibility_timeout_secs, 7200);
        assert_eq!(config.storage.bucket_images, "story-images");
        assert!(config.storage.supabase_url.is_none());
        assert!(!config.mock.mock_ai);
    }

    #[test]
    fn defaults_match_adapter_deadlines() {
        let config = FabulaConfig::defaults().unwrap();
        assert_eq!(config.text.timeout_secs, 60);
        assert_eq!(config.image.timeout_secs, 120);
        assert_eq!(config.audio.timeout_secs, 120);
    }
}
