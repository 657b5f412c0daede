//! In-process cursor store for tests
//!
//! Implements the full lease TTL arithmetic so engine tests can exercise
//! acquisition, expiry, and holder-checked refresh without a cache cluster.

use crate::cache::{CacheResult, CrawlerCache};

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug)]
struct Lease {
    holder: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    cursor: Option<Uuid>,
    accelerated: bool,
    lease: Option<Lease>,
}

/// Cursor store held in process memory
#[derive(Debug, Default)]
pub struct MemoryCrawlerCache {
    inner: Mutex<Inner>,
}

impl MemoryCrawlerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the lease regardless of holder, as a TTL expiry would
    ///
    /// Lets tests simulate another replica stealing the lease mid-chunk.
    pub fn evict_lease(&self) {
        self.inner.lock().unwrap().lease = None;
    }
}

#[async_trait]
impl CrawlerCache for MemoryCrawlerCache {
    async fn get_cursor(&self) -> CacheResult<Option<Uuid>> {
        Ok(self.inner.lock().unwrap().cursor)
    }

    async fn set_cursor(&self, cursor: Uuid) -> CacheResult<()> {
        self.inner.lock().unwrap().cursor = Some(cursor);
        Ok(())
    }

    async fn clear_cursor(&self) -> CacheResult<()> {
        self.inner.lock().unwrap().cursor = None;
        Ok(())
    }

    async fn try_acquire_lease(&self, token: Uuid, ttl: Duration) -> CacheResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        let live = inner
            .lease
            .as_ref()
            .map(|l| l.expires_at > now)
            .unwrap_or(false);

        if live {
            return Ok(false);
        }

        inner.lease = Some(Lease {
            holder: token.to_string(),
            expires_at: now + ttl,
        });
        Ok(true)
    }

    async fn refresh_lease(&self, token: Uuid, ttl: Duration) -> CacheResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        match inner.lease.as_mut() {
            Some(lease) if lease.expires_at > now && lease.holder == token.to_string() => {
                lease.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_lease(&self, token: Uuid) -> CacheResult<()> {
        let mut inner = self.inner.lock().unwrap();

        let held_by_caller = inner
            .lease
            .as_ref()
            .map(|l| l.holder == token.to_string())
            .unwrap_or(false);

        if held_by_caller {
            inner.lease = None;
        }
        Ok(())
    }

    async fn lease_holder(&self) -> CacheResult<Option<String>> {
        let inner = self.inner.lock().unwrap();
        let now = Instant::now();

        Ok(inner
            .lease
            .as_ref()
            .filter(|l| l.expires_at > now)
            .map(|l| l.holder.clone()))
    }

    async fn is_accelerated(&self) -> CacheResult<bool> {
        Ok(self.inner.lock().unwrap().accelerated)
    }

    async fn set_accelerated(&self, enabled: bool) -> CacheResult<()> {
        self.inner.lock().unwrap().accelerated = enabled;
        Ok(())
    }
}
