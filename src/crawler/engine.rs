//! Crawler engine: the sweep scheduler
//!
//! One replica-local loop drives the whole fleet's sweep: it takes the
//! distributed lease, pulls one chunk per tick from the account pager, fans
//! the chunk out to the registered listeners in order, advances the shared
//! cursor, and sleeps. Other replicas run the same loop and park on the
//! lease until it expires or is released.

use crate::account::Account;
use crate::cache::CrawlerCache;
use crate::config::CrawlerConfig;
use crate::crawler::listener::{AccountDatabaseCrawlerListener, ListenerError, ListenerResult};
use crate::crawler::metrics::CrawlerMetrics;
use crate::storage::AccountStore;
use crate::SweeperError;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::error::Elapsed;
use uuid::Uuid;

/// Inter-chunk delay while the acceleration flag is set
const ACCELERATED_DELAY: Duration = Duration::from_millis(10);

/// Listener deadline as a multiple of the chunk interval
const LISTENER_DEADLINE_FACTOR: u32 = 3;

/// What a single tick of the engine did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another replica holds the lease
    LeaseUnavailable,

    /// One chunk was dispatched and the cursor advanced
    ChunkProcessed { accounts: usize },

    /// The pager hit END; the sweep closed and the cursor reset
    SweepCompleted,

    /// A listener demanded a restart; the cursor reset mid-sweep
    SweepRestarted,

    /// The lease refresh failed; the chunk's cursor write was dropped
    LeaseLost,
}

/// The account database crawler engine
pub struct AccountDatabaseCrawler {
    store: Arc<Mutex<dyn AccountStore>>,
    cache: Arc<dyn CrawlerCache>,
    listeners: Vec<Arc<dyn AccountDatabaseCrawlerListener>>,
    metrics: Arc<CrawlerMetrics>,
    chunk_size: usize,
    chunk_interval: Duration,
    lease_ttl: Duration,
    listener_deadline: Duration,
    worker_token: Uuid,
    lease_held: bool,
}

impl AccountDatabaseCrawler {
    /// Creates an engine with a fixed, ordered listener chain
    ///
    /// # Arguments
    ///
    /// * `store` - The account pager and persistence backend
    /// * `cache` - The cluster-shared cursor store
    /// * `listeners` - Listener chain, dispatched in this order per chunk
    /// * `config` - Chunk sizing, pacing, and lease TTL
    /// * `metrics` - Shared progress counters
    pub fn new(
        store: Arc<Mutex<dyn AccountStore>>,
        cache: Arc<dyn CrawlerCache>,
        listeners: Vec<Arc<dyn AccountDatabaseCrawlerListener>>,
        config: &CrawlerConfig,
        metrics: Arc<CrawlerMetrics>,
    ) -> Self {
        let chunk_interval = Duration::from_millis(config.chunk_interval_ms);

        Self {
            store,
            cache,
            listeners,
            metrics,
            chunk_size: config.chunk_size,
            chunk_interval,
            lease_ttl: Duration::from_millis(config.lease_ttl_ms),
            listener_deadline: chunk_interval * LISTENER_DEADLINE_FACTOR,
            worker_token: Uuid::new_v4(),
            lease_held: false,
        }
    }

    /// This replica's lease token
    pub fn worker_token(&self) -> Uuid {
        self.worker_token
    }

    /// Runs the engine until `shutdown` flips to true
    ///
    /// The current chunk is drained before exit and the lease is released so
    /// another replica can take over immediately instead of waiting out the
    /// TTL.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Crawler engine starting (worker token {}, chunk size {}, interval {:?})",
            self.worker_token,
            self.chunk_size,
            self.chunk_interval
        );

        while !*shutdown.borrow() {
            let delay = match self.tick().await {
                Ok(outcome) => self.delay_for(outcome).await,
                Err(e) => {
                    tracing::error!("Tick aborted: {}", e);
                    self.metrics.record_transient_error();
                    self.chunk_interval
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone; nothing can signal shutdown anymore
                        tracing::warn!("Shutdown channel closed; stopping engine");
                        break;
                    }
                }
            }
        }

        if self.lease_held {
            if let Err(e) = self.cache.release_lease(self.worker_token).await {
                tracing::warn!("Failed to release lease on shutdown: {}", e);
            }
            self.lease_held = false;
        }

        tracing::info!("Crawler engine stopped");
    }

    /// Executes one scheduler step
    ///
    /// Acquires the lease if this replica does not hold it, then processes at
    /// most one chunk. Errors mean the tick was aborted with no cursor
    /// advance.
    pub async fn tick(&mut self) -> Result<TickOutcome, SweeperError> {
        if !self.lease_held {
            if !self
                .cache
                .try_acquire_lease(self.worker_token, self.lease_ttl)
                .await?
            {
                tracing::debug!("Lease held elsewhere, standing by");
                return Ok(TickOutcome::LeaseUnavailable);
            }

            tracing::info!("Acquired crawl lease");
            self.lease_held = true;
        }

        self.process_chunk().await
    }

    async fn process_chunk(&mut self) -> Result<TickOutcome, SweeperError> {
        let cursor = self.cache.get_cursor().await?;

        // Sweep boundary: the start hooks fire before the first chunk
        if cursor.is_none() {
            if let Some(reason) = self.dispatch_start().await {
                return self.restart_sweep(reason).await;
            }
        }

        let chunk = {
            let store = self.store.lock().unwrap();
            store.get_chunk(cursor, self.chunk_size)?
        };

        if chunk.accounts.is_empty() {
            if let Some(reason) = self.dispatch_end(cursor).await {
                return self.restart_sweep(reason).await;
            }

            self.cache.clear_cursor().await?;

            if !self.refresh_lease().await? {
                return Ok(TickOutcome::LeaseLost);
            }

            self.metrics.record_sweep_completed();
            tracing::info!("Sweep completed: {:?}", self.metrics.snapshot());
            return Ok(TickOutcome::SweepCompleted);
        }

        if let Some(reason) = self.dispatch_chunk(cursor, &chunk.accounts).await {
            return self.restart_sweep(reason).await;
        }

        // Refresh before the cursor write: losing the lease means another
        // replica may already be processing, so this chunk's advance is
        // dropped and the work re-done under at-least-once semantics.
        if !self.refresh_lease().await? {
            return Ok(TickOutcome::LeaseLost);
        }

        if let Some(next_cursor) = chunk.next_cursor {
            self.cache.set_cursor(next_cursor).await?;
        }

        self.metrics.record_chunk(chunk.accounts.len());
        tracing::debug!(
            "Processed chunk of {} accounts (cursor {:?})",
            chunk.accounts.len(),
            chunk.next_cursor
        );

        Ok(TickOutcome::ChunkProcessed {
            accounts: chunk.accounts.len(),
        })
    }

    /// Abandons the current sweep after a listener restart demand
    async fn restart_sweep(&mut self, reason: String) -> Result<TickOutcome, SweeperError> {
        tracing::warn!("Abandoning sweep: {}", reason);

        self.cache.clear_cursor().await?;
        // A restarted sweep should run at normal pace
        self.cache.set_accelerated(false).await?;

        self.metrics.record_sweep_restarted();
        Ok(TickOutcome::SweepRestarted)
    }

    async fn refresh_lease(&mut self) -> Result<bool, SweeperError> {
        if self
            .cache
            .refresh_lease(self.worker_token, self.lease_ttl)
            .await?
        {
            return Ok(true);
        }

        tracing::warn!("Lease lost; dropping cursor write for this chunk");
        self.metrics.record_lease_lost();
        self.lease_held = false;
        Ok(false)
    }

    /// Fires `on_crawl_start` on every listener; returns a restart reason
    async fn dispatch_start(&self) -> Option<String> {
        for listener in &self.listeners {
            let result =
                tokio::time::timeout(self.listener_deadline, listener.on_crawl_start()).await;
            if let Some(reason) = self.assess(listener.name(), "on_crawl_start", result) {
                return Some(reason);
            }
        }
        None
    }

    /// Fires `on_crawl_chunk` on every listener in registration order
    async fn dispatch_chunk(&self, from: Option<Uuid>, accounts: &[Account]) -> Option<String> {
        for listener in &self.listeners {
            let result = tokio::time::timeout(
                self.listener_deadline,
                listener.on_crawl_chunk(from, accounts),
            )
            .await;
            if let Some(reason) = self.assess(listener.name(), "on_crawl_chunk", result) {
                return Some(reason);
            }
        }
        None
    }

    /// Fires `on_crawl_end` on every listener
    async fn dispatch_end(&self, final_cursor: Option<Uuid>) -> Option<String> {
        for listener in &self.listeners {
            let result =
                tokio::time::timeout(self.listener_deadline, listener.on_crawl_end(final_cursor))
                    .await;
            if let Some(reason) = self.assess(listener.name(), "on_crawl_end", result) {
                return Some(reason);
            }
        }
        None
    }

    /// Classifies one listener call result
    ///
    /// Recoverable failures and deadline overruns are logged and skipped so
    /// the rest of the chain still runs; only a restart demand propagates.
    fn assess(
        &self,
        listener: &str,
        phase: &str,
        result: Result<ListenerResult, Elapsed>,
    ) -> Option<String> {
        match result {
            Ok(Ok(())) => None,
            Ok(Err(ListenerError::Recoverable(reason))) => {
                tracing::warn!("Listener '{}' failed in {}: {}", listener, phase, reason);
                self.metrics.record_listener_failure();
                None
            }
            Ok(Err(ListenerError::Restart(reason))) => {
                Some(format!("listener '{}' in {}: {}", listener, phase, reason))
            }
            Err(_) => {
                tracing::warn!(
                    "Listener '{}' exceeded {:?} deadline in {}",
                    listener,
                    self.listener_deadline,
                    phase
                );
                self.metrics.record_listener_failure();
                None
            }
        }
    }

    /// Picks the post-tick delay, honoring the acceleration flag
    async fn delay_for(&self, outcome: TickOutcome) -> Duration {
        if outcome == TickOutcome::LeaseUnavailable {
            return self.chunk_interval;
        }

        match self.cache.is_accelerated().await {
            Ok(true) => ACCELERATED_DELAY,
            Ok(false) => self.chunk_interval,
            Err(e) => {
                tracing::warn!("Failed to read acceleration flag: {}", e);
                self.chunk_interval
            }
        }
    }
}
