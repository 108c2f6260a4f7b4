//! The broker job envelope.

use crate::StoryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The durable handoff between dispatcher and worker.
///
/// `attempt` counts deliveries starting at 1; the broker increments it on
/// every negative acknowledgement and visibility-timeout reclaim. Delivery is
/// at-least-once, so the orchestrator treats the envelope as a resumable
/// pointer into repository state rather than a unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Story this job generates
    pub story_id: StoryId,
    /// Opaque submitter identifier
    pub user_id: Option<String>,
    /// User-provided title
    pub title: String,
    /// User-provided generation prompt
    pub prompt: String,
    /// Optional style hint carried from the request
    pub style: Option<String>,
    /// Requested scene count; the plan must honor it
    pub num_scenes: u32,
    /// Delivery attempt counter, starting at 1
    pub attempt: u32,
    /// When the dispatcher enqueued the job
    pub enqueued_at: DateTime<Utc>,
}

impl JobEnvelope {
    /// Copy of this envelope with the attempt counter advanced, as the
    /// broker produces on redelivery.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}
