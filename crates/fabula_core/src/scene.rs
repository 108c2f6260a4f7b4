//! The scene entity, a derived child of a story.

use crate::{SceneId, StoryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scene of a story: narrative text plus generated media URLs.
///
/// `sequence` is 0-based, unique within the owning story, and dense on a
/// COMPLETED story. Both URLs are non-null on COMPLETED stories; either may
/// be null transiently while the scene is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Scene identifier
    pub scene_id: SceneId,
    /// Owning story
    pub story_id: StoryId,
    /// 0-based position within the story
    pub sequence: i32,
    /// Scene title from the stage-1 plan
    pub title: String,
    /// Narrative text from the stage-1 plan
    pub text: String,
    /// The composed prompt used to generate the illustration
    pub image_prompt: String,
    /// Public URL of the generated illustration
    pub image_url: Option<String>,
    /// Public URL of the generated narration clip
    pub audio_url: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last write timestamp
    pub updated_at: DateTime<Utc>,
}

impl Scene {
    /// True when both media URLs are populated, i.e. the scene is complete
    /// and frozen across redeliveries.
    pub fn has_media(&self) -> bool {
        self.image_url.is_some() && self.audio_url.is_some()
    }
}
