//! Dispatcher, orchestrator and worker loop for the Fabula story pipeline.
//!
//! The dispatcher persists a PENDING story and enqueues a job; the worker
//! loop consumes jobs and hands each to the orchestrator, which drives the
//! stage graph — plan, then visual profile and base style in parallel, then
//! a bounded per-scene fan-out — with idempotent, resumable persistence.

#![forbid(unsafe_code)]

mod context;
mod dispatcher;
mod orchestrator;
mod worker;

pub use context::{PipelineContext, PipelineSettings, ProviderSet};
pub use dispatcher::{Dispatcher, SubmitRequest, DEFAULT_NUM_SCENES, MAX_NUM_SCENES};
pub use orchestrator::Orchestrator;
pub use worker::{shutdown_channel, Worker};
