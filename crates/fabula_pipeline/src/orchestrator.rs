//! The pipeline orchestrator: the state machine of a single job.
//!
//! Processing is idempotent against redelivery. Repository rows are the
//! single point of synchronization: the terminal guard and the conditional
//! claim serialize workers, and scenes already persisted with both media
//! URLs are frozen and skipped on resume.

use crate::{PipelineContext, ProviderSet};
use fabula_broker::{Delivery, JobHandle};
use fabula_core::{BaseStyle, JobEnvelope, Scene, SceneId, StoryPlan, StoryStatus, VisualProfile};
use fabula_database::ClaimOutcome;
use fabula_error::{FabulaError, FabulaErrorKind, ProviderErrorKind};
use fabula_interface::{AudioRequest, ImageRequest, TextRequest};
use fabula_prompts::{
    compose_image_prompt, parse_base_style, parse_plan, parse_scene_moment, parse_visual_profile,
    render_base_style_prompt, render_plan_prompt, render_scene_moment_prompt,
    render_visual_profile_prompt,
};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Requeue delay when another worker holds the claim.
const CLAIM_RETRY_DELAY: Duration = Duration::from_secs(5);

/// One failed stage, carried up to the attempt accounting.
#[derive(Debug)]
struct JobFailure {
    /// Failing stage name (plan, visual_profile, base_style, moment, image,
    /// audio, persist, finalize)
    stage: &'static str,
    /// Reason, including the scene index for per-scene stages
    detail: String,
    /// Fail the story now instead of redelivering
    fatal: bool,
}

impl JobFailure {
    fn scene(stage: &'static str, sequence: i32, err: &FabulaError) -> Self {
        Self {
            stage,
            detail: format!("scene {sequence}: {err}"),
            fatal: false,
        }
    }

    /// The machine-tagged string persisted on a FAILED story.
    fn error_text(&self) -> String {
        format!("{}:{}", self.stage, self.detail)
    }
}

/// True for provider errors that adapter retries cannot fix.
fn is_non_retriable(err: &FabulaError) -> bool {
    match err.kind() {
        FabulaErrorKind::Provider(provider) => !matches!(
            provider.kind,
            ProviderErrorKind::Transient(_)
        ),
        _ => false,
    }
}

/// Drives dequeued jobs through the stage graph.
pub struct Orchestrator {
    ctx: Arc<PipelineContext>,
}

impl Orchestrator {
    /// Create an orchestrator over the shared context.
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    /// Process one delivery end to end, settling the broker handle.
    #[instrument(skip(self, delivery), fields(story_id = %delivery.envelope.story_id, attempt = delivery.envelope.attempt))]
    pub async fn process(&self, delivery: Delivery) {
        let Delivery { handle, envelope } = delivery;

        // Terminal guard: redelivery after a crash-post-terminal is a no-op.
        match self.ctx.repository.get_story(envelope.story_id).await {
            Ok(story) if story.status.is_terminal() => {
                debug!(status = %story.status, "redelivery of terminal story");
                self.ack(&handle).await;
                return;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "could not load story, returning job to the queue");
                self.nack(&handle, Some(CLAIM_RETRY_DELAY)).await;
                return;
            }
        }

        // Claim: of two concurrent workers, exactly one wins the conditional
        // update. A redelivered job finding PROCESSING resumes instead.
        match self.ctx.repository.claim_story(envelope.story_id).await {
            Ok(ClaimOutcome::Claimed) => {}
            Ok(ClaimOutcome::AlreadyProcessing) if envelope.attempt > 1 => {
                debug!("resuming a redelivered PROCESSING job");
            }
            Ok(ClaimOutcome::AlreadyProcessing) => {
                debug!("story claimed by another worker, backing off");
                self.nack(&handle, Some(CLAIM_RETRY_DELAY)).await;
                return;
            }
            Ok(ClaimOutcome::Terminal(status)) => {
                debug!(status = %status, "story reached a terminal status, acking");
                self.ack(&handle).await;
                return;
            }
            Err(err) => {
                warn!(error = %err, "claim failed, returning job to the queue");
                self.nack(&handle, Some(CLAIM_RETRY_DELAY)).await;
                return;
            }
        }

        let renewal = self.spawn_visibility_renewal(handle.clone());
        // Soft deadline: cease work well before the broker reclaims the job.
        let deadline = self.ctx.settings.visibility_timeout.mul_f64(0.8);
        let outcome = tokio::time::timeout(deadline, self.run_job(&envelope)).await;
        renewal.abort();

        match outcome {
            Err(_elapsed) => {
                // Neither ack nor nack: redelivery takes over at visibility expiry.
                warn!("job deadline exceeded, leaving delivery for redelivery");
            }
            Ok(Ok(())) => {
                info!("story completed");
                self.ack(&handle).await;
            }
            Ok(Err(failure)) => self.settle_failure(&handle, &envelope, failure).await,
        }
    }

    /// The stage graph for one job. Returns `Ok(())` once the story is
    /// COMPLETED.
    async fn run_job(&self, envelope: &JobEnvelope) -> Result<(), JobFailure> {
        let story_id = envelope.story_id;

        // Stage 1: plan
        let plan = self.stage_plan(envelope).await?;

        // Stages 2 and 3 both depend only on the plan; run them in parallel.
        let (profile, style) = self.stage_shared_style(&plan).await?;

        // Resume scan: scenes persisted with both URLs are frozen.
        let existing = self
            .ctx
            .repository
            .list_scenes(story_id)
            .await
            .map_err(|e| JobFailure {
                stage: "persist",
                detail: format!("listing scenes: {e}"),
                fatal: false,
            })?;
        let mut complete: HashSet<i32> = HashSet::new();
        let mut partials: HashSet<i32> = HashSet::new();
        for scene in existing {
            if scene.has_media() {
                complete.insert(scene.sequence);
            } else {
                partials.insert(scene.sequence);
            }
        }
        if !complete.is_empty() {
            info!(
                complete = complete.len(),
                "resuming with already persisted scenes"
            );
        }

        // Per-scene fan-out, bounded by scene_parallelism.
        let semaphore = Semaphore::new(self.ctx.settings.scene_parallelism);
        let mut tasks = FuturesUnordered::new();
        for index in 0..plan.scenes.len() {
            let sequence = plan.scenes[index].sequence;
            if complete.contains(&sequence) {
                continue;
            }
            let has_partial_row = partials.contains(&sequence);
            let semaphore = &semaphore;
            let plan = &plan;
            let profile = &profile;
            let style = &style;
            tasks.push(async move {
                let _permit = semaphore.acquire().await;
                self.generate_scene(envelope, plan, profile, style, index, has_partial_row)
                    .await
            });
        }

        // Per-scene failures accumulate; the first one decides the nack.
        let mut first_failure: Option<JobFailure> = None;
        while let Some(result) = tasks.next().await {
            if let Err(failure) = result {
                warn!(stage = failure.stage, detail = %failure.detail, "scene stage failed");
                if first_failure.is_none() {
                    first_failure = Some(failure);
                }
            }
        }
        if let Some(failure) = first_failure {
            return Err(failure);
        }

        // Finalize: every scene persisted with both URLs.
        let persisted = self
            .ctx
            .repository
            .list_scenes(story_id)
            .await
            .map_err(|e| JobFailure {
                stage: "finalize",
                detail: format!("listing scenes: {e}"),
                fatal: false,
            })?;
        let ready = persisted.iter().filter(|s| s.has_media()).count();
        if ready != envelope.num_scenes as usize {
            return Err(JobFailure {
                stage: "finalize",
                detail: format!(
                    "{ready} of {} scenes have media after fan-out",
                    envelope.num_scenes
                ),
                fatal: false,
            });
        }

        self.ctx
            .repository
            .set_status(story_id, StoryStatus::Completed, None)
            .await
            .map_err(|e| JobFailure {
                stage: "finalize",
                detail: e.to_string(),
                fatal: false,
            })?;
        Ok(())
    }

    /// Stage 1: build the plan prompt, call the text adapter, parse and
    /// persist the plan.
    async fn stage_plan(&self, envelope: &JobEnvelope) -> Result<StoryPlan, JobFailure> {
        let prompt = render_plan_prompt(
            &envelope.title,
            &envelope.prompt,
            envelope.style.as_deref(),
            envelope.num_scenes,
        );
        let request = text_request(prompt, "plan")?;
        let response = self
            .ctx
            .providers
            .text
            .generate(&request)
            .await
            .map_err(|e| plan_failure(&e))?;
        let plan =
            parse_plan(&response, envelope.num_scenes).map_err(|e| plan_failure(&e))?;

        let metadata = serde_json::to_value(&plan).map_err(|e| JobFailure {
            stage: "plan",
            detail: format!("serializing plan metadata: {e}"),
            fatal: false,
        })?;
        self.ctx
            .repository
            .set_metadata(envelope.story_id, &metadata)
            .await
            .map_err(|e| JobFailure {
                stage: "plan",
                detail: format!("persisting plan metadata: {e}"),
                fatal: false,
            })?;

        debug!(scenes = plan.scene_count(), "plan ready");
        Ok(plan)
    }

    /// Stages 2 and 3 in parallel: visual profile and base style.
    async fn stage_shared_style(
        &self,
        plan: &StoryPlan,
    ) -> Result<(VisualProfile, BaseStyle), JobFailure> {
        let ProviderSet { text, .. } = &self.ctx.providers;

        let profile_fut = async {
            let request = text_request(render_visual_profile_prompt(plan), "visual_profile")?;
            let response = text.generate(&request).await.map_err(|e| JobFailure {
                stage: "visual_profile",
                detail: e.to_string(),
                fatal: false,
            })?;
            parse_visual_profile(&response).map_err(|e| JobFailure {
                stage: "visual_profile",
                detail: e.to_string(),
                fatal: false,
            })
        };

        let style_fut = async {
            let request = text_request(render_base_style_prompt(plan), "base_style")?;
            let response = text.generate(&request).await.map_err(|e| JobFailure {
                stage: "base_style",
                detail: e.to_string(),
                fatal: false,
            })?;
            parse_base_style(&response).map_err(|e| JobFailure {
                stage: "base_style",
                detail: e.to_string(),
                fatal: false,
            })
        };

        tokio::try_join!(profile_fut, style_fut)
    }

    /// Stages 6a-e for one scene: moment, composed image prompt, image and
    /// audio generation with their uploads, then persistence.
    ///
    /// Audio depends only on the scene text, so it runs in parallel with the
    /// moment -> image chain.
    async fn generate_scene(
        &self,
        envelope: &JobEnvelope,
        plan: &StoryPlan,
        profile: &VisualProfile,
        style: &BaseStyle,
        index: usize,
        has_partial_row: bool,
    ) -> Result<(), JobFailure> {
        let story_id = envelope.story_id;
        let plan_scene = &plan.scenes[index];
        let sequence = plan_scene.sequence;
        let ProviderSet { text, image, audio } = &self.ctx.providers;

        let audio_branch = async {
            let bytes = audio
                .narrate(&AudioRequest::new(plan_scene.text.clone()))
                .await
                .map_err(|e| JobFailure::scene("audio", sequence, &e))?;
            self.ctx
                .blobs
                .put_audio(story_id, sequence, &bytes)
                .await
                .map_err(|e| JobFailure::scene("audio", sequence, &e))
        };

        let image_branch = async {
            let request = text_request(
                render_scene_moment_prompt(plan, index, profile, style),
                "moment",
            )?;
            let response = text
                .generate(&request)
                .await
                .map_err(|e| JobFailure::scene("moment", sequence, &e))?;
            let moment =
                parse_scene_moment(&response).map_err(|e| JobFailure::scene("moment", sequence, &e))?;

            let image_prompt = compose_image_prompt(style, profile, plan, index, &moment);
            let bytes = image
                .render(&ImageRequest {
                    prompt: image_prompt.clone(),
                    width: self.ctx.settings.image_width,
                    height: self.ctx.settings.image_height,
                    steps: self.ctx.settings.image_steps,
                    seed: None,
                })
                .await
                .map_err(|e| JobFailure::scene("image", sequence, &e))?;
            let url = self
                .ctx
                .blobs
                .put_image(story_id, sequence, &bytes)
                .await
                .map_err(|e| JobFailure::scene("image", sequence, &e))?;
            Ok((image_prompt, url))
        };

        let (image_result, audio_result) = tokio::join!(image_branch, audio_branch);

        match (image_result, audio_result) {
            (Ok((image_prompt, image_url)), Ok(audio_url)) => {
                self.persist_scene(
                    envelope,
                    plan_scene_fields(plan, index),
                    image_prompt,
                    image_url,
                    audio_url,
                    has_partial_row,
                )
                .await
            }
            (image_result, audio_result) => {
                // Keep whatever succeeded so the redelivery has less to redo.
                self.persist_partial(
                    envelope,
                    plan_scene_fields(plan, index),
                    image_result.as_ref().ok().map(|(_, url)| url.as_str()),
                    audio_result.as_ref().ok().map(String::as_str),
                    has_partial_row,
                )
                .await;
                let failure = image_result
                    .err()
                    .or_else(|| audio_result.err())
                    .unwrap_or_else(|| JobFailure {
                        stage: "persist",
                        detail: format!("scene {sequence}: unknown failure"),
                        fatal: false,
                    });
                Err(failure)
            }
        }
    }

    /// Insert a media-complete scene row, treating a unique-constraint
    /// conflict as "already persisted by a prior attempt".
    async fn persist_scene(
        &self,
        envelope: &JobEnvelope,
        fields: SceneFields<'_>,
        image_prompt: String,
        image_url: String,
        audio_url: String,
        has_partial_row: bool,
    ) -> Result<(), JobFailure> {
        let sequence = fields.sequence;

        if has_partial_row {
            return self
                .ctx
                .repository
                .update_scene_media(
                    envelope.story_id,
                    sequence,
                    Some(&image_url),
                    Some(&audio_url),
                )
                .await
                .map_err(|e| JobFailure::scene("persist", sequence, &e.into()));
        }

        let now = chrono::Utc::now();
        let scene = Scene {
            scene_id: SceneId::generate(),
            story_id: envelope.story_id,
            sequence,
            title: fields.title.to_string(),
            text: fields.text.to_string(),
            image_prompt,
            image_url: Some(image_url),
            audio_url: Some(audio_url),
            created_at: now,
            updated_at: now,
        };

        match self.ctx.repository.insert_scene(&scene).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_conflict() => {
                debug!(sequence, "scene already persisted by a concurrent attempt");
                Ok(())
            }
            Err(e) => Err(JobFailure::scene("persist", sequence, &e.into())),
        }
    }

    /// Best-effort persistence of a half-generated scene. Failures here are
    /// logged and swallowed; the scene failure itself is what gets reported.
    async fn persist_partial(
        &self,
        envelope: &JobEnvelope,
        fields: SceneFields<'_>,
        image_url: Option<&str>,
        audio_url: Option<&str>,
        has_partial_row: bool,
    ) {
        if image_url.is_none() && audio_url.is_none() {
            return;
        }
        let sequence = fields.sequence;

        if has_partial_row {
            if let Err(err) = self
                .ctx
                .repository
                .update_scene_media(envelope.story_id, sequence, image_url, audio_url)
                .await
            {
                warn!(sequence, error = %err, "could not update partial scene");
            }
            return;
        }

        let now = chrono::Utc::now();
        let scene = Scene {
            scene_id: SceneId::generate(),
            story_id: envelope.story_id,
            sequence,
            title: fields.title.to_string(),
            text: fields.text.to_string(),
            image_prompt: fields.image_prompt.to_string(),
            image_url: image_url.map(str::to_string),
            audio_url: audio_url.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        match self.ctx.repository.insert_scene(&scene).await {
            Ok(()) => debug!(sequence, "persisted partial scene"),
            Err(e) if e.is_conflict() => {}
            Err(e) => warn!(sequence, error = %e, "could not persist partial scene"),
        }
    }

    /// Attempt accounting: fail the story when attempts are exhausted or the
    /// failure is fatal, otherwise hand the job back for redelivery.
    async fn settle_failure(&self, handle: &JobHandle, envelope: &JobEnvelope, failure: JobFailure) {
        let exhausted = envelope.attempt >= self.ctx.settings.max_attempts;
        if failure.fatal || exhausted {
            let error_text = failure.error_text();
            warn!(
                attempt = envelope.attempt,
                fatal = failure.fatal,
                error = %error_text,
                "failing story"
            );
            match self
                .ctx
                .repository
                .set_status(envelope.story_id, StoryStatus::Failed, Some(&error_text))
                .await
            {
                Ok(()) => self.ack(handle).await,
                Err(err) => {
                    warn!(error = %err, "could not record failure, returning job to the queue");
                    self.nack(handle, Some(CLAIM_RETRY_DELAY)).await;
                }
            }
        } else {
            debug!(
                attempt = envelope.attempt,
                stage = failure.stage,
                "nacking for redelivery"
            );
            self.nack(handle, None).await;
        }
    }

    /// Renew broker visibility every third of the window while the job runs.
    fn spawn_visibility_renewal(&self, handle: JobHandle) -> JoinHandle<()> {
        let broker = self.ctx.broker.clone();
        let visibility = self.ctx.settings.visibility_timeout;
        tokio::spawn(async move {
            let period = (visibility / 3).max(Duration::from_secs(1));
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = broker.extend(&handle, visibility).await {
                    // Renewal failure is survivable: visibility expiry hands
                    // the job to another worker.
                    warn!(error = %err, "visibility renewal failed");
                }
            }
        })
    }

    async fn ack(&self, handle: &JobHandle) {
        if let Err(err) = self.ctx.broker.ack(handle).await {
            warn!(error = %err, "ack failed");
        }
    }

    async fn nack(&self, handle: &JobHandle, delay: Option<Duration>) {
        if let Err(err) = self.ctx.broker.nack(handle, delay).await {
            warn!(error = %err, "nack failed");
        }
    }
}

/// Borrowed plan fields for one scene.
struct SceneFields<'a> {
    sequence: i32,
    title: &'a str,
    text: &'a str,
    image_prompt: &'a str,
}

fn plan_scene_fields(plan: &StoryPlan, index: usize) -> SceneFields<'_> {
    let scene = &plan.scenes[index];
    SceneFields {
        sequence: scene.sequence,
        title: &scene.title,
        text: &scene.text,
        image_prompt: &scene.image_prompt,
    }
}

fn text_request(prompt: String, stage: &'static str) -> Result<TextRequest, JobFailure> {
    TextRequest::builder()
        .prompt(prompt)
        .build()
        .map_err(|e| JobFailure {
            stage,
            detail: format!("building request: {e}"),
            fatal: false,
        })
}

/// Plan-stage failures are fatal unless transient: no scenes exist yet, so a
/// malformed or rejected plan fails the story on the first attempt.
fn plan_failure(err: &FabulaError) -> JobFailure {
    JobFailure {
        stage: "plan",
        detail: err.to_string(),
        fatal: is_non_retriable(err),
    }
}
