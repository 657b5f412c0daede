//! Active user counter: per-sweep activity tallies
//!
//! Counts enabled accounts whose most recent device activity falls within a
//! set of day windows, split by platform, and reports the totals when the
//! sweep completes. Tallies are process-local and reset at every sweep
//! start; the counter never fails the listener chain.

use crate::account::{Account, Platform};
use crate::crawler::listener::{AccountDatabaseCrawlerListener, ListenerResult};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use uuid::Uuid;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Activity windows, in days
const WINDOWS: [(&str, i64); 5] = [
    ("daily", 1),
    ("weekly", 7),
    ("monthly", 30),
    ("quarterly", 90),
    ("yearly", 365),
];

const PLATFORMS: [Platform; 3] = [Platform::Android, Platform::Ios, Platform::Other];

/// Tallies for one sweep: `counts[platform][window]`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ActiveUserTally {
    counts: [[u64; WINDOWS.len()]; PLATFORMS.len()],
}

impl ActiveUserTally {
    fn record(&mut self, platform: Platform, last_seen: i64, now_ms: i64) {
        let platform_idx = PLATFORMS.iter().position(|p| *p == platform).unwrap_or(2);
        let age = now_ms - last_seen;

        for (window_idx, (_, days)) in WINDOWS.iter().enumerate() {
            if age < days * MS_PER_DAY {
                self.counts[platform_idx][window_idx] += 1;
            }
        }
    }

    /// Count for a given platform and window name; None for unknown windows
    pub fn get(&self, platform: Platform, window: &str) -> Option<u64> {
        let platform_idx = PLATFORMS.iter().position(|p| *p == platform)?;
        let window_idx = WINDOWS.iter().position(|(name, _)| *name == window)?;
        Some(self.counts[platform_idx][window_idx])
    }

    /// Total for a window across platforms
    pub fn total(&self, window: &str) -> Option<u64> {
        let window_idx = WINDOWS.iter().position(|(name, _)| *name == window)?;
        Some(self.counts.iter().map(|row| row[window_idx]).sum())
    }
}

/// Listener tallying active accounts per sweep
#[derive(Debug, Default)]
pub struct ActiveUserCounter {
    tally: Mutex<ActiveUserTally>,
}

impl ActiveUserCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tally (tests and status inspection)
    pub fn tally(&self) -> ActiveUserTally {
        *self.tally.lock().unwrap()
    }
}

#[async_trait]
impl AccountDatabaseCrawlerListener for ActiveUserCounter {
    fn name(&self) -> &str {
        "active-user-counter"
    }

    async fn on_crawl_start(&self) -> ListenerResult {
        *self.tally.lock().unwrap() = ActiveUserTally::default();
        Ok(())
    }

    async fn on_crawl_chunk(&self, _from: Option<Uuid>, accounts: &[Account]) -> ListenerResult {
        let now_ms = Utc::now().timestamp_millis();
        let mut tally = self.tally.lock().unwrap();

        for account in accounts {
            if !account.is_enabled() {
                continue;
            }
            if let Some(last_seen) = account.last_seen() {
                tally.record(account.platform(), last_seen, now_ms);
            }
        }

        Ok(())
    }

    async fn on_crawl_end(&self, _final_cursor: Option<Uuid>) -> ListenerResult {
        let tally = self.tally.lock().unwrap();

        for (window, _) in WINDOWS {
            tracing::info!(
                "Active users ({}): android={} ios={} other={}",
                window,
                tally.get(Platform::Android, window).unwrap_or(0),
                tally.get(Platform::Ios, window).unwrap_or(0),
                tally.get(Platform::Other, window).unwrap_or(0),
            );
        }

        Ok(())
    }
}
