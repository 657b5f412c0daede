//! Cursor store: shared crawler state in the cache cluster
//!
//! This module owns the crawler's cluster-shared state: the sweep cursor,
//! the single-writer lease, and the acceleration flag. The trait is the
//! contract the engine depends on; backends exist for the Redis cache
//! cluster and for in-process testing.

mod memory;
mod redis;

pub use memory::MemoryCrawlerCache;
pub use redis::RedisCrawlerCache;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Cache key holding the last-processed account uuid (the cursor)
pub const CURSOR_KEY: &str = "account_database_crawler_cache::last_uuid";

/// Legacy phone-number cursor key; cleared alongside the uuid cursor
pub const LEGACY_NUMBER_CURSOR_KEY: &str = "account_database_crawler_cache::last_number";

/// Cache key holding the acceleration flag ("true" or absent)
pub const ACCELERATE_KEY: &str = "account_database_crawler_cache::accelerate";

/// Cache key holding the crawl lease token, TTL-bearing
pub const LEASE_KEY: &str = "account_database_crawler_cache::lock";

/// Errors that can occur during cursor store operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to connect to cache at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Cache operation '{operation}' failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        reason: String,
    },

    #[error("Malformed cursor value '{0}'")]
    MalformedCursor(String),
}

/// Result type for cursor store operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Cluster-shared crawler state
///
/// All operations are idempotent. Transient backend failures are retried
/// internally with bounded backoff; an error from any method means the
/// retries were exhausted and the caller should abort the current tick
/// without advancing the cursor.
#[async_trait]
pub trait CrawlerCache: Send + Sync {
    /// Reads the sweep cursor; None means a new sweep starts at the top
    async fn get_cursor(&self) -> CacheResult<Option<Uuid>>;

    /// Writes the sweep cursor
    async fn set_cursor(&self, cursor: Uuid) -> CacheResult<()>;

    /// Clears the cursor so the next tick starts a new sweep
    async fn clear_cursor(&self) -> CacheResult<()>;

    /// Atomically takes the lease iff nobody holds it
    ///
    /// Returns true iff this caller now holds the lease for `ttl`.
    async fn try_acquire_lease(&self, token: Uuid, ttl: Duration) -> CacheResult<bool>;

    /// Extends the lease TTL iff `token` is the current holder
    async fn refresh_lease(&self, token: Uuid, ttl: Duration) -> CacheResult<bool>;

    /// Releases the lease iff `token` is the current holder
    async fn release_lease(&self, token: Uuid) -> CacheResult<()>;

    /// Returns the current lease holder token, if any
    async fn lease_holder(&self) -> CacheResult<Option<String>>;

    /// Reads the acceleration flag
    async fn is_accelerated(&self) -> CacheResult<bool>;

    /// Writes the acceleration flag; takes effect on the next tick
    async fn set_accelerated(&self, enabled: bool) -> CacheResult<()>;
}
