//! PostgreSQL implementation of the story repository.

use crate::connection::PgPool;
use crate::models::{NewSceneRow, NewStoryRow, SceneRow, StoryRow};
use crate::repository::{ClaimOutcome, RepositoryResult, StoryRepository};
use crate::schema::{scenes, stories};
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use fabula_core::{Scene, Story, StoryId, StoryStatus};
use fabula_error::{RepositoryError, RepositoryErrorKind};
use tracing::instrument;

/// Media-only changeset; `None` columns are left untouched.
#[derive(AsChangeset)]
#[diesel(table_name = scenes)]
struct SceneMediaChangeset<'a> {
    image_url: Option<&'a str>,
    audio_url: Option<&'a str>,
    updated_at: chrono::DateTime<Utc>,
}

/// PostgreSQL-backed repository.
///
/// Diesel calls are synchronous, so every operation checks a connection out
/// of the pool and runs on the blocking thread pool; runtime threads are
/// never parked on a database round-trip.
#[derive(Clone)]
pub struct PostgresStoryRepository {
    pool: PgPool,
}

impl PostgresStoryRepository {
    /// Create a repository over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run a synchronous diesel task on the blocking thread pool.
    async fn run<T, F>(&self, task: F) -> RepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::new(RepositoryErrorKind::Connection(e.to_string()))
            })?;
            task(&mut conn)
        })
        .await
        .map_err(|e| RepositoryError::new(RepositoryErrorKind::Query(e.to_string())))?
    }

    fn parse_status(raw: &str) -> RepositoryResult<StoryStatus> {
        raw.parse()
            .map_err(|e: String| RepositoryError::new(RepositoryErrorKind::Serialization(e)))
    }
}

#[async_trait]
impl StoryRepository for PostgresStoryRepository {
    #[instrument(skip(self, title, prompt, user_id), fields(story_id = %story_id))]
    async fn create_story(
        &self,
        story_id: StoryId,
        title: &str,
        prompt: &str,
        user_id: Option<&str>,
    ) -> RepositoryResult<Story> {
        let story = Story::pending(story_id, title, prompt, user_id.map(str::to_string));
        let row = NewStoryRow::from(&story);

        self.run(move |conn| {
            diesel::insert_into(stories::table)
                .values(&row)
                .execute(conn)?;
            Ok(story)
        })
        .await
    }

    #[instrument(skip(self, error), fields(story_id = %story_id, status = %status))]
    async fn set_status(
        &self,
        story_id: StoryId,
        status: StoryStatus,
        error: Option<&str>,
    ) -> RepositoryResult<()> {
        let error = error.map(str::to_string);

        self.run(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                let row: StoryRow = stories::table
                    .find(story_id.as_uuid())
                    .first(conn)?;
                let current = Self::parse_status(&row.status)?;

                if !current.can_transition_to(status) {
                    return Err(RepositoryError::new(
                        RepositoryErrorKind::InvalidTransition {
                            from: current.to_string(),
                            to: status.to_string(),
                        },
                    ));
                }

                diesel::update(stories::table.find(story_id.as_uuid()))
                    .set((
                        stories::status.eq(status.as_str()),
                        stories::error.eq(error.as_deref()),
                        stories::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    #[instrument(skip(self), fields(story_id = %story_id))]
    async fn claim_story(&self, story_id: StoryId) -> RepositoryResult<ClaimOutcome> {
        self.run(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                // Conditional update: only one of two concurrent claimants
                // can move the row out of PENDING.
                let updated = diesel::update(
                    stories::table
                        .find(story_id.as_uuid())
                        .filter(stories::status.eq(StoryStatus::Pending.as_str())),
                )
                .set((
                    stories::status.eq(StoryStatus::Processing.as_str()),
                    stories::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

                if updated == 1 {
                    return Ok(ClaimOutcome::Claimed);
                }

                let row: StoryRow = stories::table
                    .find(story_id.as_uuid())
                    .first(conn)?;
                let current = Self::parse_status(&row.status)?;
                Ok(match current {
                    StoryStatus::Processing => ClaimOutcome::AlreadyProcessing,
                    other => ClaimOutcome::Terminal(other),
                })
            })
        })
        .await
    }

    #[instrument(skip(self, metadata), fields(story_id = %story_id))]
    async fn set_metadata(
        &self,
        story_id: StoryId,
        metadata: &serde_json::Value,
    ) -> RepositoryResult<()> {
        let metadata = metadata.clone();

        self.run(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                let row: StoryRow = stories::table
                    .find(story_id.as_uuid())
                    .first(conn)?;
                let current = Self::parse_status(&row.status)?;

                if current != StoryStatus::Processing {
                    return Err(RepositoryError::new(RepositoryErrorKind::Conflict(format!(
                        "metadata may only be written while PROCESSING, story is {current}"
                    ))));
                }

                diesel::update(stories::table.find(story_id.as_uuid()))
                    .set((
                        stories::story_metadata.eq(&metadata),
                        stories::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    #[instrument(skip(self, scene), fields(story_id = %scene.story_id, sequence = scene.sequence))]
    async fn insert_scene(&self, scene: &Scene) -> RepositoryResult<()> {
        let row = NewSceneRow::from(scene);

        self.run(move |conn| {
            diesel::insert_into(scenes::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn insert_scenes_batch(&self, batch: &[Scene]) -> RepositoryResult<()> {
        let rows: Vec<NewSceneRow> = batch.iter().map(NewSceneRow::from).collect();

        self.run(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                diesel::insert_into(scenes::table)
                    .values(&rows)
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    async fn update_scene_media(
        &self,
        story_id: StoryId,
        sequence: i32,
        image_url: Option<&str>,
        audio_url: Option<&str>,
    ) -> RepositoryResult<()> {
        let image_url = image_url.map(str::to_string);
        let audio_url = audio_url.map(str::to_string);

        self.run(move |conn| {
            let changeset = SceneMediaChangeset {
                image_url: image_url.as_deref(),
                audio_url: audio_url.as_deref(),
                updated_at: Utc::now(),
            };
            let updated = diesel::update(
                scenes::table
                    .filter(scenes::story_id.eq(story_id.as_uuid()))
                    .filter(scenes::sequence.eq(sequence)),
            )
            .set(&changeset)
            .execute(conn)?;

            if updated == 0 {
                return Err(RepositoryError::new(RepositoryErrorKind::NotFound));
            }
            Ok(())
        })
        .await
    }

    async fn get_story(&self, story_id: StoryId) -> RepositoryResult<Story> {
        self.run(move |conn| {
            let row: StoryRow = stories::table
                .find(story_id.as_uuid())
                .first(conn)?;
            row.try_into()
        })
        .await
    }

    async fn list_scenes(&self, story_id: StoryId) -> RepositoryResult<Vec<Scene>> {
        self.run(move |conn| {
            let rows: Vec<SceneRow> = scenes::table
                .filter(scenes::story_id.eq(story_id.as_uuid()))
                .order(scenes::sequence.asc())
                .load(conn)?;
            Ok(rows.into_iter().map(Scene::from).collect())
        })
        .await
    }
}
