//! Shared context owned by the worker process.

use fabula_broker::Broker;
use fabula_config::FabulaConfig;
use fabula_database::StoryRepository;
use fabula_interface::{AudioSynthesizer, ImageGenerator, TextGenerator};
use fabula_storage::BlobStore;
use std::sync::Arc;
use std::time::Duration;

/// The three provider adapters, shared by reference across jobs.
#[derive(Clone)]
pub struct ProviderSet {
    /// Text LLM adapter
    pub text: Arc<dyn TextGenerator>,
    /// Image generation adapter
    pub image: Arc<dyn ImageGenerator>,
    /// Audio synthesis adapter
    pub audio: Arc<dyn AudioSynthesizer>,
}

/// Immutable orchestration settings, fixed at worker start.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Max concurrent scenes per job
    pub scene_parallelism: usize,
    /// Max concurrent jobs per worker
    pub job_parallelism: usize,
    /// Deliveries before a job is declared FAILED
    pub max_attempts: u32,
    /// Broker redelivery window
    pub visibility_timeout: Duration,
    /// Illustration width in pixels
    pub image_width: u32,
    /// Illustration height in pixels
    pub image_height: u32,
    /// Diffusion step count
    pub image_steps: u32,
}

impl PipelineSettings {
    /// Build settings from the loaded configuration.
    pub fn from_config(config: &FabulaConfig) -> Self {
        Self {
            scene_parallelism: config.pipeline.scene_parallelism.max(1),
            job_parallelism: config.pipeline.job_parallelism.max(1),
            max_attempts: config.pipeline.max_attempts.max(1),
            visibility_timeout: Duration::from_secs(config.pipeline.visibility_timeout_secs),
            image_width: config.image.width,
            image_height: config.image.height,
            image_steps: config.image.steps,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            scene_parallelism: 3,
            job_parallelism: 1,
            max_attempts: 3,
            visibility_timeout: Duration::from_secs(2 * 60 * 60),
            image_width: 1024,
            image_height: 768,
            image_steps: 4,
        }
    }
}

/// Everything a worker needs to process jobs. No shared mutable state lives
/// here beyond the repository and blob store themselves; adapters are safe
/// for concurrent use.
#[derive(Clone)]
pub struct PipelineContext {
    /// Story and scene persistence
    pub repository: Arc<dyn StoryRepository>,
    /// Durable job queue
    pub broker: Arc<dyn Broker>,
    /// Media blob store
    pub blobs: Arc<dyn BlobStore>,
    /// Provider adapters
    pub providers: ProviderSet,
    /// Orchestration settings
    pub settings: PipelineSettings,
}
