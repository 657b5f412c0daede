//! Redis-backed cursor store
//!
//! The cursor, lease, and acceleration flag live under fixed keys in the
//! shared cache cluster. Lease acquisition uses SET NX PX; refresh and
//! release go through get-compare scripts so only the current holder can
//! extend or delete the lease.

use crate::cache::{
    CacheError, CacheResult, CrawlerCache, ACCELERATE_KEY, CURSOR_KEY, LEASE_KEY,
    LEGACY_NUMBER_CURSOR_KEY,
};

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, Script};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

/// Attempts per cache operation before the tick is abandoned
const RETRY_ATTEMPTS: u32 = 3;

/// Base delay between attempts; grows linearly with the attempt number
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Extends the lease TTL iff the stored token matches ARGV[1]
const REFRESH_LEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
  return redis.call("pexpire", KEYS[1], ARGV[2])
else
  return 0
end
"#;

/// Deletes the lease iff the stored token matches ARGV[1]
const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
  return redis.call("del", KEYS[1])
else
  return 0
end
"#;

type AttemptFuture<T> = Pin<Box<dyn Future<Output = redis::RedisResult<T>> + Send>>;

/// Cursor store backed by the shared Redis cache cluster
pub struct RedisCrawlerCache {
    connection: MultiplexedConnection,
}

impl RedisCrawlerCache {
    /// Connects to the cache cluster
    pub async fn new(url: &str) -> CacheResult<Self> {
        let client = Client::open(url).map_err(|e| CacheError::ConnectionFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::ConnectionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { connection })
    }

    /// Runs a cache operation with bounded retries and linear backoff
    async fn with_retry<T, F>(&self, operation: &'static str, mut attempt_fn: F) -> CacheResult<T>
    where
        F: FnMut(MultiplexedConnection) -> AttemptFuture<T>,
    {
        let mut last_error = String::new();

        for attempt in 1..=RETRY_ATTEMPTS {
            match attempt_fn(self.connection.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(
                        "Cache operation '{}' attempt {}/{} failed: {}",
                        operation,
                        attempt,
                        RETRY_ATTEMPTS,
                        e
                    );
                    last_error = e.to_string();

                    if attempt < RETRY_ATTEMPTS {
                        tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                    }
                }
            }
        }

        Err(CacheError::RetriesExhausted {
            operation,
            attempts: RETRY_ATTEMPTS,
            reason: last_error,
        })
    }
}

#[async_trait]
impl CrawlerCache for RedisCrawlerCache {
    async fn get_cursor(&self) -> CacheResult<Option<Uuid>> {
        let raw = self
            .with_retry("get_cursor", |mut conn| {
                Box::pin(async move { conn.get::<_, Option<String>>(CURSOR_KEY).await })
            })
            .await?;

        match raw {
            None => Ok(None),
            Some(value) => Uuid::parse_str(&value)
                .map(Some)
                .map_err(|_| CacheError::MalformedCursor(value)),
        }
    }

    async fn set_cursor(&self, cursor: Uuid) -> CacheResult<()> {
        let value = cursor.to_string();
        self.with_retry("set_cursor", move |mut conn| {
            let value = value.clone();
            Box::pin(async move { conn.set::<_, _, ()>(CURSOR_KEY, value).await })
        })
        .await
    }

    async fn clear_cursor(&self) -> CacheResult<()> {
        self.with_retry("clear_cursor", |mut conn| {
            Box::pin(async move {
                conn.del::<_, ()>(vec![CURSOR_KEY, LEGACY_NUMBER_CURSOR_KEY])
                    .await
            })
        })
        .await
    }

    async fn try_acquire_lease(&self, token: Uuid, ttl: Duration) -> CacheResult<bool> {
        let token = token.to_string();
        let ttl_ms = ttl.as_millis() as u64;

        let reply = self
            .with_retry("try_acquire_lease", move |mut conn| {
                let token = token.clone();
                Box::pin(async move {
                    redis::cmd("SET")
                        .arg(LEASE_KEY)
                        .arg(token)
                        .arg("NX")
                        .arg("PX")
                        .arg(ttl_ms)
                        .query_async::<Option<String>>(&mut conn)
                        .await
                })
            })
            .await?;

        Ok(reply.is_some())
    }

    async fn refresh_lease(&self, token: Uuid, ttl: Duration) -> CacheResult<bool> {
        let token = token.to_string();
        let ttl_ms = ttl.as_millis() as u64;

        let extended = self
            .with_retry("refresh_lease", move |mut conn| {
                let token = token.clone();
                Box::pin(async move {
                    Script::new(REFRESH_LEASE_SCRIPT)
                        .key(LEASE_KEY)
                        .arg(token)
                        .arg(ttl_ms)
                        .invoke_async::<i64>(&mut conn)
                        .await
                })
            })
            .await?;

        Ok(extended == 1)
    }

    async fn release_lease(&self, token: Uuid) -> CacheResult<()> {
        let token = token.to_string();

        self.with_retry("release_lease", move |mut conn| {
            let token = token.clone();
            Box::pin(async move {
                Script::new(RELEASE_LEASE_SCRIPT)
                    .key(LEASE_KEY)
                    .arg(token)
                    .invoke_async::<i64>(&mut conn)
                    .await
                    .map(|_: i64| ())
            })
        })
        .await
    }

    async fn lease_holder(&self) -> CacheResult<Option<String>> {
        self.with_retry("lease_holder", |mut conn| {
            Box::pin(async move { conn.get::<_, Option<String>>(LEASE_KEY).await })
        })
        .await
    }

    async fn is_accelerated(&self) -> CacheResult<bool> {
        let value = self
            .with_retry("is_accelerated", |mut conn| {
                Box::pin(async move { conn.get::<_, Option<String>>(ACCELERATE_KEY).await })
            })
            .await?;

        Ok(value.as_deref() == Some("true"))
    }

    async fn set_accelerated(&self, enabled: bool) -> CacheResult<()> {
        if enabled {
            self.with_retry("set_accelerated", |mut conn| {
                Box::pin(async move { conn.set::<_, _, ()>(ACCELERATE_KEY, "true").await })
            })
            .await
        } else {
            self.with_retry("set_accelerated", |mut conn| {
                Box::pin(async move { conn.del::<_, ()>(ACCELERATE_KEY).await })
            })
            .await
        }
    }
}
