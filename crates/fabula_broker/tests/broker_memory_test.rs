//! Tests for the in-memory broker's delivery semantics.

use chrono::Utc;
use fabula_broker::{Broker, MemoryBroker};
use fabula_core::{JobEnvelope, StoryId};
use std::time::Duration;

fn envelope() -> JobEnvelope {
    JobEnvelope {
        story_id: StoryId::generate(),
        user_id: Some("u1".to_string()),
        title: "Forest".to_string(),
        prompt: "A child finds a magical forest".to_string(),
        style: None,
        num_scenes: 3,
        attempt: 1,
        enqueued_at: Utc::now(),
    }
}

const VISIBILITY: Duration = Duration::from_secs(60);

#[tokio::test]
async fn enqueue_dequeue_ack_drains_the_queue() {
    let broker = MemoryBroker::new(3);
    let job = envelope();
    broker.enqueue(&job).await.unwrap();

    let delivery = broker.dequeue(VISIBILITY).await.unwrap().unwrap();
    assert_eq!(delivery.envelope, job);

    broker.ack(&delivery.handle).await.unwrap();
    assert!(broker.dequeue(VISIBILITY).await.unwrap().is_none());
}

#[tokio::test]
async fn dequeue_on_empty_queue_returns_none() {
    let broker = MemoryBroker::new(3);
    assert!(broker.dequeue(VISIBILITY).await.unwrap().is_none());
}

#[tokio::test]
async fn nack_redelivers_with_incremented_attempt() {
    let broker = MemoryBroker::new(3);
    broker.enqueue(&envelope()).await.unwrap();

    let first = broker.dequeue(VISIBILITY).await.unwrap().unwrap();
    assert_eq!(first.envelope.attempt, 1);
    broker.nack(&first.handle, None).await.unwrap();

    let second = broker.dequeue(VISIBILITY).await.unwrap().unwrap();
    assert_eq!(second.envelope.attempt, 2);
    assert_eq!(second.envelope.story_id, first.envelope.story_id);
}

#[tokio::test]
async fn nack_with_delay_defers_redelivery() {
    let broker = MemoryBroker::new(3);
    broker.enqueue(&envelope()).await.unwrap();

    let delivery = broker.dequeue(VISIBILITY).await.unwrap().unwrap();
    broker
        .nack(&delivery.handle, Some(Duration::from_millis(60)))
        .await
        .unwrap();

    assert!(broker.dequeue(VISIBILITY).await.unwrap().is_none());
    tokio::time::sleep(Duration::from_millis(90)).await;
    let redelivered = broker.dequeue(VISIBILITY).await.unwrap().unwrap();
    assert_eq!(redelivered.envelope.attempt, 2);
}

#[tokio::test]
async fn visibility_expiry_reclaims_the_job() {
    let broker = MemoryBroker::new(3);
    broker.enqueue(&envelope()).await.unwrap();

    let first = broker
        .dequeue(Duration::from_millis(40))
        .await
        .unwrap()
        .unwrap();

    // No ack within the visibility window
    tokio::time::sleep(Duration::from_millis(70)).await;
    let redelivered = broker.dequeue(VISIBILITY).await.unwrap().unwrap();
    assert_eq!(redelivered.envelope.attempt, 2);
    assert_eq!(redelivered.envelope.story_id, first.envelope.story_id);

    // The stale handle settles as a no-op
    broker.nack(&first.handle, None).await.unwrap();
    broker.ack(&redelivered.handle).await.unwrap();
    assert!(broker.dequeue(VISIBILITY).await.unwrap().is_none());
}

#[tokio::test]
async fn extend_keeps_the_job_invisible() {
    let broker = MemoryBroker::new(3);
    broker.enqueue(&envelope()).await.unwrap();

    let delivery = broker
        .dequeue(Duration::from_millis(50))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    broker.extend(&delivery.handle, VISIBILITY).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    // Original deadline has passed, but the renewal holds the job
    assert!(broker.dequeue(VISIBILITY).await.unwrap().is_none());
    broker.ack(&delivery.handle).await.unwrap();
}

#[tokio::test]
async fn jobs_dead_letter_after_max_attempts() {
    let broker = MemoryBroker::new(2);
    broker.enqueue(&envelope()).await.unwrap();

    for expected_attempt in [1, 2] {
        let delivery = broker.dequeue(VISIBILITY).await.unwrap().unwrap();
        assert_eq!(delivery.envelope.attempt, expected_attempt);
        broker.nack(&delivery.handle, None).await.unwrap();
    }

    // Attempt 3 exceeds max_attempts=2: dead-lettered, not redelivered
    assert!(broker.dequeue(VISIBILITY).await.unwrap().is_none());
    assert_eq!(broker.dead_letter_count(), 1);
}

#[tokio::test]
async fn enqueue_failure_injection() {
    let broker = MemoryBroker::new(3);
    broker.set_fail_enqueue(true);
    let err = broker.enqueue(&envelope()).await.unwrap_err();
    assert!(err.to_string().contains("Enqueue failed"));

    broker.set_fail_enqueue(false);
    broker.enqueue(&envelope()).await.unwrap();
}
