//! Tests for the filesystem blob store.

use fabula_core::StoryId;
use fabula_storage::{BlobStore, FileSystemBlobStore, MediaKind, MIN_PAYLOAD_BYTES};
use tempfile::TempDir;

fn payload(fill: u8) -> Vec<u8> {
    vec![fill; MIN_PAYLOAD_BYTES + 50]
}

#[tokio::test]
async fn store_returns_a_deterministic_url() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemBlobStore::new(temp_dir.path(), "story-images", "story-audio").unwrap();
    let story_id = StoryId::generate();

    let url = store.put_image(story_id, 0, &payload(1)).await.unwrap();
    assert!(url.starts_with("file://"));
    assert!(url.contains(&story_id.to_string()));
    assert!(url.ends_with("/0.png"));
    assert!(url.contains("story-images"));
}

#[tokio::test]
async fn reupload_overwrites_and_returns_the_same_url() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemBlobStore::new(temp_dir.path(), "story-images", "story-audio").unwrap();
    let story_id = StoryId::generate();

    let first = store.put_image(story_id, 2, &payload(1)).await.unwrap();
    let second = store.put_image(story_id, 2, &payload(9)).await.unwrap();
    assert_eq!(first, second);

    // Last write wins on disk
    let path = first.strip_prefix("file://").unwrap();
    let on_disk = tokio::fs::read(path).await.unwrap();
    assert_eq!(on_disk, payload(9));
}

#[tokio::test]
async fn image_and_audio_land_in_their_own_buckets() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemBlobStore::new(temp_dir.path(), "story-images", "story-audio").unwrap();
    let story_id = StoryId::generate();

    let image_url = store.put_image(story_id, 0, &payload(1)).await.unwrap();
    let audio_url = store.put_audio(story_id, 0, &payload(2)).await.unwrap();

    assert!(image_url.contains("story-images"));
    assert!(image_url.ends_with(".png"));
    assert!(audio_url.contains("story-audio"));
    assert!(audio_url.ends_with(".mp3"));
    assert_ne!(image_url, audio_url);
}

#[tokio::test]
async fn undersized_payloads_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemBlobStore::new(temp_dir.path(), "story-images", "story-audio").unwrap();
    let story_id = StoryId::generate();

    let err = store
        .put(MediaKind::Image, story_id, 0, &[0u8; 12])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("12 bytes"));
}
