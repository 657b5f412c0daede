//! Redis-stream directory queue
//!
//! Appends each message as a JSON payload field onto a stream; the directory
//! consumers read through a consumer group on their side. XADD is retried
//! once on failure, then surfaced to the listener as a recoverable error.

use crate::queue::{DirectoryMessage, DirectoryQueue, QueueError, QueueResult};

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, Client};

/// Directory queue backed by a Redis stream
pub struct RedisDirectoryQueue {
    connection: MultiplexedConnection,
    stream_key: String,
}

impl RedisDirectoryQueue {
    /// Connects to the fleet message queue
    pub async fn new(url: &str, stream_key: impl Into<String>) -> QueueResult<Self> {
        let client = Client::open(url).map_err(|e| QueueError::ConnectionFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            connection,
            stream_key: stream_key.into(),
        })
    }

    async fn xadd(&self, payload: &str) -> redis::RedisResult<String> {
        let mut conn = self.connection.clone();
        redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("*")
            .arg("payload")
            .arg(payload)
            .query_async::<String>(&mut conn)
            .await
    }
}

#[async_trait]
impl DirectoryQueue for RedisDirectoryQueue {
    async fn enqueue(&self, message: DirectoryMessage) -> QueueResult<()> {
        let payload = serde_json::to_string(&message)
            .map_err(|e| QueueError::Serialization(e.to_string()))?;

        match self.xadd(&payload).await {
            Ok(_) => Ok(()),
            Err(first) => {
                tracing::warn!("Directory enqueue failed, retrying once: {}", first);
                self.xadd(&payload)
                    .await
                    .map(|_| ())
                    .map_err(|e| QueueError::Operation(e.to_string()))
            }
        }
    }
}
