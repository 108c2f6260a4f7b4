//! End-to-end pipeline tests over the in-memory broker and repository, the
//! filesystem blob store, and the mock providers.

use async_trait::async_trait;
use chrono::Utc;
use fabula_broker::{Broker, MemoryBroker};
use fabula_core::{Scene, SceneId, StoryId, StoryStatus};
use fabula_database::{MemoryStoryRepository, StoryRepository};
use fabula_error::{FabulaResult, ProviderError};
use fabula_interface::{ImageGenerator, ImageRequest, TextGenerator, TextRequest};
use fabula_interface::{AudioRequest, AudioSynthesizer};
use fabula_pipeline::{
    Dispatcher, Orchestrator, PipelineContext, PipelineSettings, ProviderSet, SubmitRequest,
};
use fabula_providers::{MockAudioSynthesizer, MockImageGenerator, MockTextGenerator};
use fabula_storage::{BlobStore, FileSystemBlobStore};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const VISIBILITY: Duration = Duration::from_secs(60);

/// An image generator that fails its first N calls with a retriable status,
/// then delegates to the mock. Also counts calls, for resume assertions.
struct FlakyImageGenerator {
    inner: MockImageGenerator,
    failures: AtomicU32,
    calls: AtomicU32,
}

impl FlakyImageGenerator {
    fn new(failures: u32) -> Self {
        Self {
            inner: MockImageGenerator::instant(),
            failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FlakyImageGenerator {
    async fn render(&self, req: &ImageRequest) -> FabulaResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let inject = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject {
            return Err(ProviderError::from_status(503, "injected image failure").into());
        }
        self.inner.render(req).await
    }

    fn provider_name(&self) -> &'static str {
        "flaky"
    }

    fn model_name(&self) -> &str {
        "flaky-image"
    }
}

/// An audio synthesizer that always fails with a retriable status.
struct FailingAudioSynthesizer;

#[async_trait]
impl AudioSynthesizer for FailingAudioSynthesizer {
    async fn narrate(&self, _req: &AudioRequest) -> FabulaResult<Vec<u8>> {
        Err(ProviderError::from_status(500, "injected audio failure").into())
    }

    fn provider_name(&self) -> &'static str {
        "failing"
    }
}

/// A text generator that never produces JSON.
struct MalformedTextGenerator;

#[async_trait]
impl TextGenerator for MalformedTextGenerator {
    async fn generate(&self, _req: &TextRequest) -> FabulaResult<String> {
        Ok("Once upon a time there was no structure at all.".to_string())
    }

    fn provider_name(&self) -> &'static str {
        "malformed"
    }

    fn model_name(&self) -> &str {
        "malformed-text"
    }
}

struct Harness {
    _media_dir: TempDir,
    repository: MemoryStoryRepository,
    broker: MemoryBroker,
    dispatcher: Dispatcher,
    orchestrator: Orchestrator,
}

fn mock_providers() -> ProviderSet {
    ProviderSet {
        text: Arc::new(MockTextGenerator::instant()),
        image: Arc::new(MockImageGenerator::instant()),
        audio: Arc::new(MockAudioSynthesizer::instant()),
    }
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        visibility_timeout: VISIBILITY,
        ..Default::default()
    }
}

fn build_harness(providers: ProviderSet, settings: PipelineSettings) -> Harness {
    let media_dir = TempDir::new().unwrap();
    let repository = MemoryStoryRepository::new();
    let broker = MemoryBroker::new(settings.max_attempts);
    let blobs: Arc<dyn BlobStore> = Arc::new(
        FileSystemBlobStore::new(media_dir.path(), "story-images", "story-audio").unwrap(),
    );
    let ctx = Arc::new(PipelineContext {
        repository: Arc::new(repository.clone()),
        broker: Arc::new(broker.clone()),
        blobs,
        providers,
        settings,
    });
    Harness {
        _media_dir: media_dir,
        repository,
        broker,
        dispatcher: Dispatcher::new(ctx.repository.clone(), ctx.broker.clone()),
        orchestrator: Orchestrator::new(ctx),
    }
}

fn forest_request() -> SubmitRequest {
    SubmitRequest {
        title: "Forest".to_string(),
        prompt: "A child finds a magical forest".to_string(),
        user_id: Some("u1".to_string()),
        style: None,
        num_scenes: None,
    }
}

/// Dequeue and process until the queue is drained or `max_rounds` is hit.
async fn drive(harness: &Harness, max_rounds: usize) {
    for _ in 0..max_rounds {
        match harness.broker.dequeue(VISIBILITY).await.unwrap() {
            Some(delivery) => harness.orchestrator.process(delivery).await,
            None => return,
        }
    }
}

fn complete_scene(story_id: StoryId, sequence: i32) -> Scene {
    let now = Utc::now();
    Scene {
        scene_id: SceneId::generate(),
        story_id,
        sequence,
        title: format!("Scene {sequence}"),
        text: "Milo walks on.".to_string(),
        image_prompt: "Milo among trees".to_string(),
        image_url: Some(format!("file:///images/{sequence}.png")),
        audio_url: Some(format!("file:///audio/{sequence}.mp3")),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn happy_path_three_scenes() {
    let harness = build_harness(mock_providers(), settings());
    let story_id = harness.dispatcher.submit(forest_request()).await.unwrap();

    // The row is pollable from the instant the id is returned
    let (status, error) = harness.dispatcher.get_status(story_id).await.unwrap();
    assert_eq!(status, StoryStatus::Pending);
    assert!(error.is_none());

    drive(&harness, 3).await;

    let (story, scenes) = harness.dispatcher.get_story(story_id).await.unwrap();
    assert_eq!(story.status, StoryStatus::Completed);
    assert!(story.error.is_none());
    assert!(story.story_metadata.is_some());

    assert_eq!(scenes.len(), 3);
    let sequences: Vec<i32> = scenes.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    for scene in &scenes {
        assert!(scene.has_media(), "scene {} missing media", scene.sequence);
        assert!(!scene.title.is_empty());
        assert!(!scene.text.is_empty());
        assert!(!scene.image_prompt.is_empty());
    }

    // Queue fully drained
    assert!(harness.broker.dequeue(VISIBILITY).await.unwrap().is_none());
}

#[tokio::test]
async fn scene_count_hint_is_honored() {
    let harness = build_harness(mock_providers(), settings());
    let story_id = harness
        .dispatcher
        .submit(SubmitRequest {
            num_scenes: Some(5),
            ..forest_request()
        })
        .await
        .unwrap();

    drive(&harness, 3).await;

    let (story, scenes) = harness.dispatcher.get_story(story_id).await.unwrap();
    assert_eq!(story.status, StoryStatus::Completed);
    assert_eq!(scenes.len(), 5);
}

#[tokio::test]
async fn enqueue_failure_fails_the_story() {
    let harness = build_harness(mock_providers(), settings());
    harness.broker.set_fail_enqueue(true);

    let err = harness.dispatcher.submit(forest_request()).await.unwrap_err();
    assert!(err.to_string().contains("Enqueue failed"));

    // The story row exists and records the enqueue failure
    let ids = harness.repository.story_ids();
    assert_eq!(ids.len(), 1);
    let story = harness.repository.get_story(ids[0]).await.unwrap();
    assert_eq!(story.status, StoryStatus::Failed);
    assert!(story.error.unwrap().contains("enqueue"));
}

#[tokio::test]
async fn transient_image_failures_recover_across_redeliveries() {
    let flaky = Arc::new(FlakyImageGenerator::new(2));
    let providers = ProviderSet {
        text: Arc::new(MockTextGenerator::instant()),
        image: flaky.clone(),
        audio: Arc::new(MockAudioSynthesizer::instant()),
    };
    let harness = build_harness(providers, settings());
    let story_id = harness.dispatcher.submit(forest_request()).await.unwrap();

    drive(&harness, 5).await;

    let (story, scenes) = harness.dispatcher.get_story(story_id).await.unwrap();
    assert_eq!(story.status, StoryStatus::Completed);

    // No duplicate scene rows despite the redeliveries
    assert_eq!(scenes.len(), 3);
    let sequences: Vec<i32> = scenes.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    assert!(scenes.iter().all(Scene::has_media));
    assert!(flaky.calls() >= 3);
}

#[tokio::test]
async fn attempts_exhausted_on_audio_fails_the_story() {
    let providers = ProviderSet {
        text: Arc::new(MockTextGenerator::instant()),
        image: Arc::new(MockImageGenerator::instant()),
        audio: Arc::new(FailingAudioSynthesizer),
    };
    let harness = build_harness(providers, settings());
    let story_id = harness.dispatcher.submit(forest_request()).await.unwrap();

    drive(&harness, 5).await;

    let (story, scenes) = harness.dispatcher.get_story(story_id).await.unwrap();
    assert_eq!(story.status, StoryStatus::Failed);
    assert!(story.error.unwrap().contains("audio"));

    // Partial scenes are permitted on FAILED; their audio URLs stay null
    for scene in &scenes {
        assert!(scene.audio_url.is_none());
    }

    // The FAILED transition acks the job: nothing left to deliver
    assert!(harness.broker.dequeue(VISIBILITY).await.unwrap().is_none());
}

#[tokio::test]
async fn max_attempts_one_fails_without_retry() {
    let providers = ProviderSet {
        text: Arc::new(MockTextGenerator::instant()),
        image: Arc::new(MockImageGenerator::instant()),
        audio: Arc::new(FailingAudioSynthesizer),
    };
    let harness = build_harness(
        providers,
        PipelineSettings {
            max_attempts: 1,
            visibility_timeout: VISIBILITY,
            ..Default::default()
        },
    );
    let story_id = harness.dispatcher.submit(forest_request()).await.unwrap();

    let delivery = harness.broker.dequeue(VISIBILITY).await.unwrap().unwrap();
    harness.orchestrator.process(delivery).await;

    let (status, error) = harness.dispatcher.get_status(story_id).await.unwrap();
    assert_eq!(status, StoryStatus::Failed);
    assert!(error.unwrap().contains("audio"));
    assert!(harness.broker.dequeue(VISIBILITY).await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_plan_fails_on_the_first_attempt() {
    let providers = ProviderSet {
        text: Arc::new(MalformedTextGenerator),
        image: Arc::new(MockImageGenerator::instant()),
        audio: Arc::new(MockAudioSynthesizer::instant()),
    };
    let harness = build_harness(providers, settings());
    let story_id = harness.dispatcher.submit(forest_request()).await.unwrap();

    drive(&harness, 2).await;

    let (story, scenes) = harness.dispatcher.get_story(story_id).await.unwrap();
    assert_eq!(story.status, StoryStatus::Failed);
    let error = story.error.unwrap();
    assert!(error.contains("plan"), "error was: {error}");
    assert!(scenes.is_empty());
    assert!(harness.broker.dequeue(VISIBILITY).await.unwrap().is_none());
}

#[tokio::test]
async fn redelivery_resumes_only_the_missing_scenes() {
    let flaky = Arc::new(FlakyImageGenerator::new(0));
    let providers = ProviderSet {
        text: Arc::new(MockTextGenerator::instant()),
        image: flaky.clone(),
        audio: Arc::new(MockAudioSynthesizer::instant()),
    };
    let harness = build_harness(providers, settings());
    let story_id = harness.dispatcher.submit(forest_request()).await.unwrap();

    // A first worker claimed the job, persisted scenes 0 and 1, then died
    // before acking.
    harness.repository.claim_story(story_id).await.unwrap();
    harness
        .repository
        .insert_scene(&complete_scene(story_id, 0))
        .await
        .unwrap();
    harness
        .repository
        .insert_scene(&complete_scene(story_id, 1))
        .await
        .unwrap();
    let crashed = harness.broker.dequeue(VISIBILITY).await.unwrap().unwrap();
    harness.broker.nack(&crashed.handle, None).await.unwrap();

    // The redelivery resumes and generates exactly the one missing scene
    let redelivery = harness.broker.dequeue(VISIBILITY).await.unwrap().unwrap();
    assert_eq!(redelivery.envelope.attempt, 2);
    harness.orchestrator.process(redelivery).await;

    let (story, scenes) = harness.dispatcher.get_story(story_id).await.unwrap();
    assert_eq!(story.status, StoryStatus::Completed);
    assert_eq!(scenes.len(), 3);
    let sequences: Vec<i32> = scenes.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    assert_eq!(flaky.calls(), 1);
}

#[tokio::test]
async fn redelivering_a_completed_job_is_a_no_op() {
    let harness = build_harness(mock_providers(), settings());
    harness.dispatcher.submit(forest_request()).await.unwrap();

    let delivery = harness.broker.dequeue(VISIBILITY).await.unwrap().unwrap();
    let envelope = delivery.envelope.clone();
    harness.orchestrator.process(delivery).await;

    let story_id = envelope.story_id;
    let before = harness.dispatcher.get_story(story_id).await.unwrap();
    assert_eq!(before.0.status, StoryStatus::Completed);

    // The broker redelivers the same envelope after a crash-post-terminal
    harness.broker.enqueue(&envelope.next_attempt()).await.unwrap();
    drive(&harness, 2).await;

    let after = harness.dispatcher.get_story(story_id).await.unwrap();
    assert_eq!(before, after);
    assert!(harness.broker.dequeue(VISIBILITY).await.unwrap().is_none());
}

#[tokio::test]
async fn first_delivery_backs_off_when_another_worker_holds_the_claim() {
    let harness = build_harness(mock_providers(), settings());
    let story_id = harness.dispatcher.submit(forest_request()).await.unwrap();

    // Another worker holds the claim
    harness.repository.claim_story(story_id).await.unwrap();

    let delivery = harness.broker.dequeue(VISIBILITY).await.unwrap().unwrap();
    assert_eq!(delivery.envelope.attempt, 1);
    harness.orchestrator.process(delivery).await;

    // The loser did no work and the job went back with a requeue delay
    let (story, scenes) = harness.dispatcher.get_story(story_id).await.unwrap();
    assert_eq!(story.status, StoryStatus::Processing);
    assert!(scenes.is_empty());
    assert!(harness.broker.dequeue(VISIBILITY).await.unwrap().is_none());
}

#[tokio::test]
async fn scene_parallelism_one_produces_the_same_final_state() {
    let harness = build_harness(
        mock_providers(),
        PipelineSettings {
            scene_parallelism: 1,
            visibility_timeout: VISIBILITY,
            ..Default::default()
        },
    );
    let story_id = harness.dispatcher.submit(forest_request()).await.unwrap();

    drive(&harness, 3).await;

    let (story, scenes) = harness.dispatcher.get_story(story_id).await.unwrap();
    assert_eq!(story.status, StoryStatus::Completed);
    assert_eq!(scenes.len(), 3);
    let sequences: Vec<i32> = scenes.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    assert!(scenes.iter().all(Scene::has_media));
}
