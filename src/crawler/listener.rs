//! Listener contract for the account database crawler
//!
//! Listeners are registered with the engine in a fixed order at construction
//! time and invoked once per chunk, plus sweep boundary hooks. Delivery is
//! at-least-once: a chunk may be re-dispatched after a lease handover or a
//! sweep restart, so every listener must be idempotent within a sweep.

use crate::account::Account;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Failure modes a listener can report
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listener's side effects failed for this call; the engine logs
    /// and skips this listener for this chunk, and the rest of the chain
    /// still runs.
    #[error("recoverable failure: {0}")]
    Recoverable(String),

    /// The listener cannot continue from the current position; the engine
    /// abandons the sweep and restarts from the top on the next tick.
    #[error("sweep restart requested: {0}")]
    Restart(String),
}

/// Result type for listener callbacks
pub type ListenerResult = Result<(), ListenerError>;

/// A side-effect processor registered with the crawler engine
#[async_trait]
pub trait AccountDatabaseCrawlerListener: Send + Sync {
    /// Stable name used in logs and metrics
    fn name(&self) -> &str;

    /// Called once before the first chunk of a sweep
    async fn on_crawl_start(&self) -> ListenerResult {
        Ok(())
    }

    /// Called for every chunk, in registration order
    ///
    /// `from` is the cursor the chunk was fetched after; None for the first
    /// chunk of a sweep.
    async fn on_crawl_chunk(&self, from: Option<Uuid>, accounts: &[Account]) -> ListenerResult;

    /// Called once after the sweep has visited the whole corpus
    async fn on_crawl_end(&self, _final_cursor: Option<Uuid>) -> ListenerResult {
        Ok(())
    }
}
