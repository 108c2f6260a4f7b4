//! Durable job queue client for the Fabula story pipeline.
//!
//! The broker hands jobs to workers with at-least-once delivery: a dequeued
//! job stays invisible to other consumers for the visibility timeout, and is
//! redelivered with an incremented attempt counter if the worker neither
//! acks nor nacks in time. Jobs that exhaust `max_attempts` land on a
//! dead-letter list for inspection.

#![forbid(unsafe_code)]

mod memory;
mod redis_broker;

pub use memory::MemoryBroker;
pub use redis_broker::RedisBroker;

use async_trait::async_trait;
use fabula_core::JobEnvelope;
use fabula_error::BrokerError;
use std::time::Duration;

/// Result type for broker operations.
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Opaque handle identifying one in-flight delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    token: String,
}

impl JobHandle {
    pub(crate) fn generate() -> Self {
        Self {
            token: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }
}

/// One delivered job: the handle to settle it plus the decoded envelope.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Handle for ack/nack/extend
    pub handle: JobHandle,
    /// The decoded job envelope, attempt counter included
    pub envelope: JobEnvelope,
}

/// A durable queue with visibility-timeout semantics.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Durably enqueue a job envelope.
    async fn enqueue(&self, envelope: &JobEnvelope) -> BrokerResult<()>;

    /// Pull the next job, hiding it from other consumers for `visibility`.
    ///
    /// Blocks up to a short poll interval; `None` means the queue was empty.
    async fn dequeue(&self, visibility: Duration) -> BrokerResult<Option<Delivery>>;

    /// Remove a delivered job from the queue.
    async fn ack(&self, handle: &JobHandle) -> BrokerResult<()>;

    /// Return a delivered job to the queue with its attempt counter
    /// advanced, optionally after `delay`.
    async fn nack(&self, handle: &JobHandle, delay: Option<Duration>) -> BrokerResult<()>;

    /// Push a delivered job's visibility deadline out by `visibility` from
    /// now. Renewal of an already-reclaimed handle is a no-op.
    async fn extend(&self, handle: &JobHandle, visibility: Duration) -> BrokerResult<()>;
}
