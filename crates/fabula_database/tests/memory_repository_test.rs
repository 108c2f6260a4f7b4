//! Tests for the in-memory repository, which shares its guards with the
//! PostgreSQL implementation.

use chrono::Utc;
use fabula_core::{Scene, SceneId, StoryId, StoryStatus};
use fabula_database::{ClaimOutcome, MemoryStoryRepository, StoryRepository};
use serde_json::json;

fn scene(story_id: StoryId, sequence: i32) -> Scene {
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
async fn create_then_get_round_trips() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    let created = repo
        .create_story(id, "Forest", "A child finds a magical forest", Some("u1"))
        .await
        .unwrap();
    assert_eq!(created.status, StoryStatus::Pending);

    let loaded = repo.get_story(id).await.unwrap();
    assert_eq!(loaded, created);
}

#[tokio::test]
async fn duplicate_story_creation_conflicts() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    repo.create_story(id, "a", "b", None).await.unwrap();
    let err = repo.create_story(id, "a", "b", None).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn claim_moves_pending_to_processing_once() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    repo.create_story(id, "a", "b", None).await.unwrap();

    assert_eq!(repo.claim_story(id).await.unwrap(), ClaimOutcome::Claimed);
    assert_eq!(
        repo.get_story(id).await.unwrap().status,
        StoryStatus::Processing
    );
    assert_eq!(
        repo.claim_story(id).await.unwrap(),
        ClaimOutcome::AlreadyProcessing
    );
}

#[tokio::test]
async fn concurrent_claims_have_one_winner() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    repo.create_story(id, "a", "b", None).await.unwrap();

    let (first, second) = tokio::join!(repo.claim_story(id), repo.claim_story(id));
    let outcomes = [first.unwrap(), second.unwrap()];
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == ClaimOutcome::Claimed)
            .count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == ClaimOutcome::AlreadyProcessing)
            .count(),
        1
    );
}

#[tokio::test]
async fn claim_on_terminal_story_reports_terminal() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    repo.create_story(id, "a", "b", None).await.unwrap();
    repo.set_status(id, StoryStatus::Failed, Some("enqueue_failed"))
        .await
        .unwrap();

    assert_eq!(
        repo.claim_story(id).await.unwrap(),
        ClaimOutcome::Terminal(StoryStatus::Failed)
    );
}

#[tokio::test]
async fn terminal_statuses_are_absorbing() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    repo.create_story(id, "a", "b", None).await.unwrap();
    repo.claim_story(id).await.unwrap();
    repo.set_status(id, StoryStatus::Completed, None)
        .await
        .unwrap();

    for next in [
        StoryStatus::Pending,
        StoryStatus::Processing,
        StoryStatus::Failed,
    ] {
        let err = repo.set_status(id, next, None).await.unwrap_err();
        assert!(err.to_string().contains("Invalid status transition"));
    }
}

#[tokio::test]
async fn pending_cannot_jump_to_completed() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    repo.create_story(id, "a", "b", None).await.unwrap();
    assert!(repo
        .set_status(id, StoryStatus::Completed, None)
        .await
        .is_err());
}

#[tokio::test]
async fn metadata_requires_processing() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    repo.create_story(id, "a", "b", None).await.unwrap();

    assert!(repo.set_metadata(id, &json!({"plan": true})).await.is_err());

    repo.claim_story(id).await.unwrap();
    repo.set_metadata(id, &json!({"plan": true})).await.unwrap();
    assert!(repo.get_story(id).await.unwrap().story_metadata.is_some());
}

#[tokio::test]
async fn duplicate_scene_insert_conflicts() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    repo.create_story(id, "a", "b", None).await.unwrap();

    repo.insert_scene(&scene(id, 0)).await.unwrap();
    let err = repo.insert_scene(&scene(id, 0)).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn scenes_list_ordered_by_sequence() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    repo.create_story(id, "a", "b", None).await.unwrap();

    for sequence in [2, 0, 1] {
        repo.insert_scene(&scene(id, sequence)).await.unwrap();
    }

    let sequences: Vec<i32> = repo
        .list_scenes(id)
        .await
        .unwrap()
        .iter()
        .map(|s| s.sequence)
        .collect();
    assert_eq!(sequences, vec![0, 1, 2]);
}

#[tokio::test]
async fn updated_at_is_monotone_across_transitions() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    let created = repo.create_story(id, "a", "b", None).await.unwrap();

    repo.claim_story(id).await.unwrap();
    let after_claim = repo.get_story(id).await.unwrap();
    assert!(after_claim.updated_at >= created.updated_at);

    repo.set_status(id, StoryStatus::Completed, None)
        .await
        .unwrap();
    let after_complete = repo.get_story(id).await.unwrap();
    assert!(after_complete.updated_at >= after_claim.updated_at);
}

#[tokio::test]
async fn update_scene_media_fills_missing_urls() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    repo.create_story(id, "a", "b", None).await.unwrap();

    let mut partial = scene(id, 0);
    partial.audio_url = None;
    repo.insert_scene(&partial).await.unwrap();

    repo.update_scene_media(id, 0, None, Some("file:///audio/0.mp3"))
        .await
        .unwrap();

    let scenes = repo.list_scenes(id).await.unwrap();
    assert!(scenes[0].has_media());
    // Untouched column keeps its value
    assert_eq!(scenes[0].image_url, partial.image_url);

    let err = repo
        .update_scene_media(id, 9, None, Some("x"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn batch_insert_reports_first_conflict() {
    let repo = MemoryStoryRepository::new();
    let id = StoryId::generate();
    repo.create_story(id, "a", "b", None).await.unwrap();
    repo.insert_scene(&scene(id, 1)).await.unwrap();

    let err = repo
        .insert_scenes_batch(&[scene(id, 0), scene(id, 1), scene(id, 2)])
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    // Rows before the conflict were inserted; the orchestrator treats
    // partial success as the story's recovery problem.
    assert_eq!(repo.list_scenes(id).await.unwrap().len(), 2);
}
