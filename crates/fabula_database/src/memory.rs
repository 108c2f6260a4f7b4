//! In-memory implementation of the story repository.
//!
//! Used by tests and local experiments. Applies the same state-machine and
//! uniqueness guards as the PostgreSQL implementation.

use crate::repository::{ClaimOutcome, RepositoryResult, StoryRepository};
use async_trait::async_trait;
use chrono::Utc;
use fabula_core::{Scene, Story, StoryId, StoryStatus};
use fabula_error::{RepositoryError, RepositoryErrorKind};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    stories: HashMap<StoryId, Story>,
    scenes: HashMap<StoryId, BTreeMap<i32, Scene>>,
}

/// Mutex-guarded in-memory repository.
#[derive(Default, Clone)]
pub struct MemoryStoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers of every stored story, for inspection in tests.
    pub fn story_ids(&self) -> Vec<StoryId> {
        self.state
            .lock()
            .map(|state| state.stories.keys().copied().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| {
            RepositoryError::new(RepositoryErrorKind::Connection(
                "state mutex poisoned".to_string(),
            ))
        })
    }
}

#[async_trait]
impl StoryRepository for MemoryStoryRepository {
    async fn create_story(
        &self,
        story_id: StoryId,
        title: &str,
        prompt: &str,
        user_id: Option<&str>,
    ) -> RepositoryResult<Story> {
        let mut state = self.lock()?;
        if state.stories.contains_key(&story_id) {
            return Err(RepositoryError::new(RepositoryErrorKind::Conflict(format!(
                "story {story_id} already exists"
            ))));
        }
        let story = Story::pending(story_id, title, prompt, user_id.map(str::to_string));
        state.stories.insert(story_id, story.clone());
        Ok(story)
    }

    async fn set_status(
        &self,
        story_id: StoryId,
        status: StoryStatus,
        error: Option<&str>,
    ) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        let story = state
            .stories
            .get_mut(&story_id)
            .ok_or_else(|| RepositoryError::new(RepositoryErrorKind::NotFound))?;

        if !story.status.can_transition_to(status) {
            return Err(RepositoryError::new(RepositoryErrorKind::InvalidTransition {
                from: story.status.to_string(),
                to: status.to_string(),
            }));
        }

        story.status = status;
        story.error = error.map(str::to_string);
        story.updated_at = Utc::now();
        Ok(())
    }

    async fn claim_story(&self, story_id: StoryId) -> RepositoryResult<ClaimOutcome> {
        let mut state = self.lock()?;
        let story = state
            .stories
            .get_mut(&story_id)
            .ok_or_else(|| RepositoryError::new(RepositoryErrorKind::NotFound))?;

        match story.status {
            StoryStatus::Pending => {
                story.status = StoryStatus::Processing;
                story.updated_at = Utc::now();
                Ok(ClaimOutcome::Claimed)
            }
            StoryStatus::Processing => Ok(ClaimOutcome::AlreadyProcessing),
            other => Ok(ClaimOutcome::Terminal(other)),
        }
    }

    async fn set_metadata(
        &self,
        story_id: StoryId,
        metadata: &serde_json::Value,
    ) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        let story = state
            .stories
            .get_mut(&story_id)
            .ok_or_else(|| RepositoryError::new(RepositoryErrorKind::NotFound))?;

        if story.status != StoryStatus::Processing {
            return Err(RepositoryError::new(RepositoryErrorKind::Conflict(format!(
                "metadata may only be written while PROCESSING, story is {}",
                story.status
            ))));
        }

        story.story_metadata = Some(metadata.clone());
        story.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_scene(&self, scene: &Scene) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        if !state.stories.contains_key(&scene.story_id) {
            return Err(RepositoryError::new(RepositoryErrorKind::NotFound));
        }
        let scenes = state.scenes.entry(scene.story_id).or_default();
        if scenes.contains_key(&scene.sequence) {
            return Err(RepositoryError::new(RepositoryErrorKind::Conflict(format!(
                "scene ({}, {}) already exists",
                scene.story_id, scene.sequence
            ))));
        }
        scenes.insert(scene.sequence, scene.clone());
        Ok(())
    }

    async fn update_scene_media(
        &self,
        story_id: StoryId,
        sequence: i32,
        image_url: Option<&str>,
        audio_url: Option<&str>,
    ) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        let scene = state
            .scenes
            .get_mut(&story_id)
            .and_then(|scenes| scenes.get_mut(&sequence))
            .ok_or_else(|| RepositoryError::new(RepositoryErrorKind::NotFound))?;

        if let Some(url) = image_url {
            scene.image_url = Some(url.to_string());
        }
        if let Some(url) = audio_url {
            scene.audio_url = Some(url.to_string());
        }
        scene.updated_at = Utc::now();
        Ok(())
    }

    async fn get_story(&self, story_id: StoryId) -> RepositoryResult<Story> {
        let state = self.lock()?;
        state
            .stories
            .get(&story_id)
            .cloned()
            .ok_or_else(|| RepositoryError::new(RepositoryErrorKind::NotFound))
    }

    async fn list_scenes(&self, story_id: StoryId) -> RepositoryResult<Vec<Scene>> {
        let state = self.lock()?;
        Ok(state
            .scenes
            .get(&story_id)
            .map(|scenes| scenes.values().cloned().collect())
            .unwrap_or_default())
    }
}
