//! The front of the pipeline: create the story row, then enqueue the job.

use chrono::Utc;
use fabula_broker::Broker;
use fabula_core::{JobEnvelope, Scene, Story, StoryId, StoryStatus};
use fabula_database::StoryRepository;
use fabula_error::FabulaResult;
use std::sync::Arc;
use tracing::{error, instrument, warn};

/// Scene count used when the request does not carry a hint.
pub const DEFAULT_NUM_SCENES: u32 = 3;
/// Upper bound on the requested scene count.
pub const MAX_NUM_SCENES: u32 = 10;

/// A story submission as received from the HTTP layer collaborator.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Story title
    pub title: String,
    /// Generation prompt
    pub prompt: String,
    /// Opaque submitter identifier
    pub user_id: Option<String>,
    /// Optional style hint (fantasy, sci-fi, ...)
    pub style: Option<String>,
    /// Optional scene count hint, clamped to 1..=10
    pub num_scenes: Option<u32>,
}

/// Accepts submissions and exposes the cheap read paths.
pub struct Dispatcher {
    repository: Arc<dyn StoryRepository>,
    broker: Arc<dyn Broker>,
}

impl Dispatcher {
    /// Create a dispatcher over the given repository and broker.
    pub fn new(repository: Arc<dyn StoryRepository>, broker: Arc<dyn Broker>) -> Self {
        Self { repository, broker }
    }

    /// Submit a story for generation and return its identifier.
    ///
    /// The story row is created before the enqueue, so clients can poll the
    /// returned id immediately; the enqueue is the durable handoff point. An
    /// enqueue failure marks the story FAILED and surfaces the error —
    /// nothing is left silently stuck in PENDING.
    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn submit(&self, request: SubmitRequest) -> FabulaResult<StoryId> {
        let story_id = StoryId::generate();
        let num_scenes = request
            .num_scenes
            .unwrap_or(DEFAULT_NUM_SCENES)
            .clamp(1, MAX_NUM_SCENES);

        self.repository
            .create_story(
                story_id,
                &request.title,
                &request.prompt,
                request.user_id.as_deref(),
            )
            .await?;

        let envelope = JobEnvelope {
            story_id,
            user_id: request.user_id,
            title: request.title,
            prompt: request.prompt,
            style: request.style,
            num_scenes,
            attempt: 1,
            enqueued_at: Utc::now(),
        };

        if let Err(enqueue_err) = self.broker.enqueue(&envelope).await {
            error!(story_id = %story_id, error = %enqueue_err, "enqueue failed, failing story");
            if let Err(status_err) = self
                .repository
                .set_status(story_id, StoryStatus::Failed, Some("enqueue_failed"))
                .await
            {
                warn!(story_id = %story_id, error = %status_err, "could not record enqueue failure");
            }
            return Err(enqueue_err.into());
        }

        Ok(story_id)
    }

    /// Cheap status read for polling clients.
    pub async fn get_status(
        &self,
        story_id: StoryId,
    ) -> FabulaResult<(StoryStatus, Option<String>)> {
        let story = self.repository.get_story(story_id).await?;
        Ok((story.status, story.error))
    }

    /// Full story read: the aggregate plus its scenes ordered by sequence.
    pub async fn get_story(&self, story_id: StoryId) -> FabulaResult<(Story, Vec<Scene>)> {
        let story = self.repository.get_story(story_id).await?;
        let scenes = self.repository.list_scenes(story_id).await?;
        Ok((story, scenes))
    }
}
