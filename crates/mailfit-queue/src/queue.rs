//! Job queue over a Redis list.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::QueueResult;
use crate::message::CompressMessage;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// List key jobs are pushed to
    pub queue_key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            queue_key: "mailfit:jobs".to_string(),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            queue_key: std::env::var("QUEUE_KEY").unwrap_or_else(|_| "mailfit:jobs".to_string()),
        }
    }
}

/// Blocking source of compression jobs.
///
/// A popped message is consumed: it is never re-queued, regardless of what
/// happens to the job afterwards. Failure surfaces through the job record,
/// not through redelivery.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Wait up to `timeout` for the next message; `None` when the queue
    /// stayed empty.
    async fn pop(&self, timeout: Duration) -> QueueResult<Option<CompressMessage>>;

    /// Number of waiting jobs.
    async fn len(&self) -> QueueResult<u64>;
}

/// Redis list queue client.
pub struct RedisJobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl RedisJobQueue {
    /// Create a new queue client.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Verify connectivity.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Enqueue a job (producer side).
    pub async fn push(&self, message: &CompressMessage) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(message)?;
        conn.rpush::<_, _, ()>(&self.config.queue_key, payload).await?;
        info!("Enqueued job {}", message.upload_id);
        Ok(())
    }
}

#[async_trait]
impl JobSource for RedisJobQueue {
    async fn pop(&self, timeout: Duration) -> QueueResult<Option<CompressMessage>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let reply: Option<(String, String)> = conn
            .blpop(&self.config.queue_key, timeout.as_secs_f64())
            .await?;

        let Some((_, payload)) = reply else {
            return Ok(None);
        };

        // A payload that does not parse is consumed and dropped; there is
        // nothing to mark errored without an upload id.
        match serde_json::from_str::<CompressMessage>(&payload) {
            Ok(message) => {
                debug!("Popped job {}", message.upload_id);
                Ok(Some(message))
            }
            Err(e) => {
                warn!("Dropping malformed queue payload: {}", e);
                Ok(None)
            }
        }
    }

    async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.llen(&self.config.queue_key).await?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.queue_key, "mailfit:jobs");
    }
}
