//! The repository trait.

use async_trait::async_trait;
use fabula_core::{Scene, Story, StoryId, StoryStatus};
use fabula_error::RepositoryError;

/// Result type for repository operations.
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Outcome of the conditional claim update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller won the PENDING -> PROCESSING transition.
    Claimed,
    /// The story is already PROCESSING. On a redelivery this means resume;
    /// on a first delivery it means another worker holds the claim.
    AlreadyProcessing,
    /// The story is in a terminal status; nothing to do.
    Terminal(StoryStatus),
}

/// Persistence operations for stories and scenes.
///
/// Implementations MUST reject status transitions the state machine does not
/// permit and MUST stamp `updated_at` on every write. The `(story_id,
/// sequence)` pair is unique; duplicate scene inserts surface as conflicts
/// so the orchestrator can treat them as already-persisted.
#[async_trait]
pub trait StoryRepository: Send + Sync {
    /// Insert a new story at PENDING and return it.
    async fn create_story(
        &self,
        story_id: StoryId,
        title: &str,
        prompt: &str,
        user_id: Option<&str>,
    ) -> RepositoryResult<Story>;

    /// Transition the story's status, guarded by the state machine.
    ///
    /// `error` is persisted alongside a FAILED transition.
    async fn set_status(
        &self,
        story_id: StoryId,
        status: StoryStatus,
        error: Option<&str>,
    ) -> RepositoryResult<()>;

    /// Conditionally claim a PENDING story for processing.
    ///
    /// The update is atomic: of two concurrent claims on the same PENDING
    /// story, exactly one observes [`ClaimOutcome::Claimed`].
    async fn claim_story(&self, story_id: StoryId) -> RepositoryResult<ClaimOutcome>;

    /// Attach the captured plan. Only legal while the story is PROCESSING.
    async fn set_metadata(
        &self,
        story_id: StoryId,
        metadata: &serde_json::Value,
    ) -> RepositoryResult<()>;

    /// Insert a single scene row.
    async fn insert_scene(&self, scene: &Scene) -> RepositoryResult<()>;

    /// Fill in media URLs on an existing scene row.
    ///
    /// Recovery path for partial rows left behind by a failed attempt: a
    /// `Some` URL overwrites, `None` leaves the column untouched.
    async fn update_scene_media(
        &self,
        story_id: StoryId,
        sequence: i32,
        image_url: Option<&str>,
        audio_url: Option<&str>,
    ) -> RepositoryResult<()>;

    /// Insert a batch of scenes, reporting the first failure.
    async fn insert_scenes_batch(&self, scenes: &[Scene]) -> RepositoryResult<()> {
        for scene in scenes {
            self.insert_scene(scene).await?;
        }
        Ok(())
    }

    /// Load a story by id.
    async fn get_story(&self, story_id: StoryId) -> RepositoryResult<Story>;

    /// Load a story's scenes ordered by sequence.
    async fn list_scenes(&self, story_id: StoryId) -> RepositoryResult<Vec<Scene>>;
}
