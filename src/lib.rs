//! Fabula: an asynchronous illustrated audio story generation pipeline.
//!
//! Clients submit a title and prompt, receive a story id immediately, and
//! poll until the job reaches COMPLETED or FAILED. A worker consumes jobs
//! from a Redis-backed queue and drives the stage graph: a structured story
//! plan, shared visual anchors, then a bounded per-scene fan-out generating
//! an illustration and a narration clip per scene, uploaded to blob storage
//! and persisted relationally.
//!
//! This crate is a facade over the workspace members.

#![forbid(unsafe_code)]

pub use fabula_broker::{Broker, Delivery, JobHandle, MemoryBroker, RedisBroker};
pub use fabula_config::FabulaConfig;
pub use fabula_core::{
    telemetry, JobEnvelope, Scene, SceneId, Story, StoryId, StoryPlan, StoryStatus,
};
pub use fabula_database::{
    create_pool, ClaimOutcome, MemoryStoryRepository, PgPool, PostgresStoryRepository,
    StoryRepository,
};
pub use fabula_error::{FabulaError, FabulaErrorKind, FabulaResult};
pub use fabula_interface::{
    AudioRequest, AudioSynthesizer, ImageGenerator, ImageRequest, TextGenerator, TextRequest,
};
pub use fabula_pipeline::{
    shutdown_channel, Dispatcher, Orchestrator, PipelineContext, PipelineSettings, ProviderSet,
    SubmitRequest, Worker,
};
pub use fabula_providers::{
    ElevenLabsClient, MockAudioSynthesizer, MockImageGenerator, MockTextGenerator,
    OpenRouterClient, TogetherClient,
};
pub use fabula_storage::{BlobStore, FileSystemBlobStore, MediaKind, SupabaseBlobStore};
