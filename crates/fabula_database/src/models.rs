//! Row models and conversions between diesel rows and domain types.

use crate::schema::{scenes, stories};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use fabula_core::{Scene, Story, StoryStatus};
use fabula_error::{RepositoryError, RepositoryErrorKind};
use uuid::Uuid;

/// A `stories` row as loaded from the database.
#[derive(Debug, Clone, Queryable)]
pub struct StoryRow {
    /// Primary key
    pub story_id: Uuid,
    /// User-provided title
    pub title: String,
    /// User-provided prompt
    pub prompt: String,
    /// Opaque submitter identifier
    pub user_id: Option<String>,
    /// Status as its canonical uppercase name
    pub status: String,
    /// Diagnostic attached on FAILED
    pub error: Option<String>,
    /// Captured stage-1 plan
    pub story_metadata: Option<serde_json::Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last write timestamp
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<StoryRow> for Story {
    type Error = RepositoryError;

    fn try_from(row: StoryRow) -> Result<Self, Self::Error> {
        let status: StoryStatus = row.status.parse().map_err(|e: String| {
            RepositoryError::new(RepositoryErrorKind::Serialization(e))
        })?;
        Ok(Story {
            story_id: row.story_id.into(),
            title: row.title,
            prompt: row.prompt,
            user_id: row.user_id,
            status,
            error: row.error,
            story_metadata: row.story_metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Insertable form of a story.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = stories)]
pub struct NewStoryRow {
    /// Primary key
    pub story_id: Uuid,
    /// User-provided title
    pub title: String,
    /// User-provided prompt
    pub prompt: String,
    /// Opaque submitter identifier
    pub user_id: Option<String>,
    /// Status as its canonical uppercase name
    pub status: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last write timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<&Story> for NewStoryRow {
    fn from(story: &Story) -> Self {
        Self {
            story_id: story.story_id.as_uuid(),
            title: story.title.clone(),
            prompt: story.prompt.clone(),
            user_id: story.user_id.clone(),
            status: story.status.as_str().to_string(),
            created_at: story.created_at,
            updated_at: story.updated_at,
        }
    }
}

/// A `scenes` row as loaded from the database.
#[derive(Debug, Clone, Queryable)]
pub struct SceneRow {
    /// Primary key
    pub scene_id: Uuid,
    /// Owning story
    pub story_id: Uuid,
    /// 0-based position within the story
    pub sequence: i32,
    /// Scene title
    pub title: String,
    /// Narrative text
    pub text: String,
    /// Composed illustration prompt
    pub image_prompt: String,
    /// Illustration URL
    pub image_url: Option<String>,
    /// Narration URL
    pub audio_url: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last write timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<SceneRow> for Scene {
    fn from(row: SceneRow) -> Self {
        Scene {
            scene_id: row.scene_id.into(),
            story_id: row.story_id.into(),
            sequence: row.sequence,
            title: row.title,
            text: row.text,
            image_prompt: row.image_prompt,
            image_url: row.image_url,
            audio_url: row.audio_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Insertable form of a scene.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = scenes)]
pub struct NewSceneRow {
    /// Primary key
    pub scene_id: Uuid,
    /// Owning story
    pub story_id: Uuid,
    /// 0-based position within the story
    pub sequence: i32,
    /// Scene title
    pub title: String,
    /// Narrative text
    pub text: String,
    /// Composed illustration prompt
    pub image_prompt: String,
    /// Illustration URL
    pub image_url: Option<String>,
    /// Narration URL
    pub audio_url: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last write timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<&Scene> for NewSceneRow {
    fn from(scene: &Scene) -> Self {
        Self {
            scene_id: scene.scene_id.as_uuid(),
            story_id: scene.story_id.as_uuid(),
            sequence: scene.sequence,
            title: scene.title.clone(),
            text: scene.text.clone(),
            image_prompt: scene.image_prompt.clone(),
            image_url: scene.image_url.clone(),
            audio_url: scene.audio_url.clone(),
            created_at: scene.created_at,
            updated_at: scene.updated_at,
        }
    }
}
