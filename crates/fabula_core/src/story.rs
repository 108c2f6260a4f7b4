//! The story aggregate.

use crate::{StoryId, StoryStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The job-level aggregate: one submitted request and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    /// Stable identifier generated by the dispatcher
    pub story_id: StoryId,
    /// User-provided title
    pub title: String,
    /// User-provided generation prompt
    pub prompt: String,
    /// Opaque identifier of the submitter; not interpreted by the pipeline
    pub user_id: Option<String>,
    /// Current lifecycle status
    pub status: StoryStatus,
    /// Short machine-tagged diagnostic, set when status is FAILED
    pub error: Option<String>,
    /// The stage-1 plan, captured verbatim for reproducibility
    pub story_metadata: Option<serde_json::Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Refreshed on every status transition and metadata write
    pub updated_at: DateTime<Utc>,
}

impl Story {
    /// Create a fresh PENDING story as the dispatcher does.
    pub fn pending(
        story_id: StoryId,
        title: impl Into<String>,
        prompt: impl Into<String>,
        user_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            story_id,
            title: title.into(),
            prompt: prompt.into(),
            user_id,
            status: StoryStatus::Pending,
            error: None,
            story_metadata: None,
            created_at: now,
            updated_at: now,
        }
    }
}
