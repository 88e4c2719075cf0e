//! Queue integration tests against a live Redis.

use std::time::Duration;

use mailfit_models::{Provider, UploadId};
use mailfit_queue::{CompressMessage, JobSource, QueueConfig, RedisJobQueue};

fn test_queue(key_suffix: &str) -> RedisJobQueue {
    dotenvy::dotenv().ok();
    let mut config = QueueConfig::from_env();
    config.queue_key = format!("mailfit:test:{}", key_suffix);
    RedisJobQueue::new(config).expect("Failed to create queue")
}

/// Push then pop round trip.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_push_pop_round_trip() {
    let queue = test_queue(&uuid::Uuid::new_v4().to_string());
    queue.ping().await.expect("Failed to ping");

    let message = CompressMessage {
        upload_id: UploadId::new(),
        filename: "holiday.mp4".to_string(),
        duration_sec: 45.0,
        size_bytes: 105_000_000,
        provider: Provider::Gmail,
        email: "user@example.com".to_string(),
        priority: false,
    };

    queue.push(&message).await.expect("Failed to push");
    assert_eq!(queue.len().await.expect("Failed to len"), 1);

    let popped = queue
        .pop(Duration::from_secs(3))
        .await
        .expect("Failed to pop")
        .expect("Queue should not be empty");
    assert_eq!(popped, message);
    assert_eq!(queue.len().await.expect("Failed to len"), 0);
}

/// An empty queue reports None after the blocking timeout.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_empty_pop_times_out() {
    let queue = test_queue(&uuid::Uuid::new_v4().to_string());

    let popped = queue
        .pop(Duration::from_secs(1))
        .await
        .expect("Failed to pop");
    assert!(popped.is_none());
}

/// Garbage payloads are consumed and dropped, never surfaced as errors.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_malformed_payload_is_dropped() {
    use redis::AsyncCommands;

    let key = format!("mailfit:test:{}", uuid::Uuid::new_v4());
    dotenvy::dotenv().ok();
    let mut config = QueueConfig::from_env();
    config.queue_key = key.clone();
    let queue = RedisJobQueue::new(config.clone()).expect("Failed to create queue");

    let client = redis::Client::open(config.redis_url.as_str()).expect("Failed to open");
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .expect("Failed to connect");
    conn.rpush::<_, _, ()>(&key, "{not json")
        .await
        .expect("Failed to rpush");

    let popped = queue
        .pop(Duration::from_secs(3))
        .await
        .expect("Malformed payload must not error");
    assert!(popped.is_none());

    // The payload was consumed, not left behind
    assert_eq!(queue.len().await.expect("Failed to len"), 0);
}
