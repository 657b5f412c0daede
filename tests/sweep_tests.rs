//! End-to-end sweep tests
//!
//! These tests run the crawler engine against a seeded SQLite account store
//! with the real listener chain registered, and assert on the resulting
//! account states and directory queue traffic.

use account_sweeper::account::{Account, Device, PRIMARY_DEVICE_ID};
use account_sweeper::cache::{CrawlerCache, MemoryCrawlerCache};
use account_sweeper::config::CrawlerConfig;
use account_sweeper::crawler::{
    AccountCleaner, AccountDatabaseCrawler, AccountDatabaseCrawlerListener, ActiveUserCounter,
    CrawlerMetrics, TickOutcome,
};
use account_sweeper::queue::{DirectoryAction, DirectoryQueue, MemoryDirectoryQueue};
use account_sweeper::storage::{AccountStore, SqliteAccountStore};

use chrono::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
const RETENTION_DAYS: u32 = 366;

fn device(id: u64, last_seen: i64) -> Device {
    Device {
        id,
        last_seen,
        enabled: true,
        gcm_id: Some("gcm-registration".to_string()),
        apn_id: None,
        fetches_messages: true,
    }
}

/// Seeds `total` accounts, the first `expired` of which are past retention
fn seeded_store(total: usize, expired: usize) -> (SqliteAccountStore, Vec<Uuid>) {
    let now_ms = Utc::now().timestamp_millis();
    let mut store = SqliteAccountStore::open_in_memory().unwrap();
    let mut expired_uuids = Vec::new();

    for i in 0..total {
        let last_seen = if i < expired {
            now_ms - 400 * MS_PER_DAY
        } else {
            now_ms - MS_PER_DAY
        };

        let account = Account::new(
            Uuid::new_v4(),
            format!("+1415{:07}", i),
            vec![device(PRIMARY_DEVICE_ID, last_seen)],
        );
        if i < expired {
            expired_uuids.push(account.uuid);
        }
        store.insert(&account).unwrap();
    }

    (store, expired_uuids)
}

fn test_config(chunk_size: usize) -> CrawlerConfig {
    CrawlerConfig {
        chunk_size,
        chunk_interval_ms: 10,
        lease_ttl_ms: 30_000,
    }
}

struct Fixture {
    engine: AccountDatabaseCrawler,
    store: Arc<Mutex<dyn AccountStore>>,
    cache: Arc<MemoryCrawlerCache>,
    queue: Arc<MemoryDirectoryQueue>,
    metrics: Arc<CrawlerMetrics>,
}

fn fixture(total: usize, expired: usize, chunk_size: usize) -> (Fixture, Vec<Uuid>) {
    let (store, expired_uuids) = seeded_store(total, expired);
    let store: Arc<Mutex<dyn AccountStore>> = Arc::new(Mutex::new(store));
    let cache = Arc::new(MemoryCrawlerCache::new());
    let queue = Arc::new(MemoryDirectoryQueue::new());
    let metrics = Arc::new(CrawlerMetrics::new());

    let listeners: Vec<Arc<dyn AccountDatabaseCrawlerListener>> = vec![
        Arc::new(ActiveUserCounter::new()),
        Arc::new(AccountCleaner::new(
            Arc::clone(&store),
            Arc::clone(&queue) as Arc<dyn DirectoryQueue>,
            RETENTION_DAYS,
            40,
        )),
    ];

    let engine = AccountDatabaseCrawler::new(
        Arc::clone(&store),
        Arc::clone(&cache) as Arc<dyn CrawlerCache>,
        listeners,
        &test_config(chunk_size),
        Arc::clone(&metrics),
    );

    (
        Fixture {
            engine,
            store,
            cache,
            queue,
            metrics,
        },
        expired_uuids,
    )
}

/// Ticks until the current sweep completes
async fn run_sweep(engine: &mut AccountDatabaseCrawler) {
    loop {
        match engine.tick().await.unwrap() {
            TickOutcome::SweepCompleted => break,
            TickOutcome::ChunkProcessed { .. } => continue,
            other => panic!("unexpected tick outcome: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_full_sweep_cleans_expired_accounts() {
    let (mut fx, expired_uuids) = fixture(120, 25, 50);

    run_sweep(&mut fx.engine).await;

    // Every expired account was deregistered exactly once this sweep
    let messages = fx.queue.messages();
    assert_eq!(messages.len(), 25);
    assert!(messages.iter().all(|m| m.action == DirectoryAction::Delete));

    let mut deregistered: Vec<String> = messages.iter().map(|m| m.uuid.clone()).collect();
    deregistered.sort();
    let mut expected: Vec<String> = expired_uuids.iter().map(|u| u.to_string()).collect();
    expected.sort();
    assert_eq!(deregistered, expected);

    // Push credentials cleared and persisted for every expired account
    {
        let store = fx.store.lock().unwrap();
        let mut cursor = None;
        let mut cleared = 0;
        loop {
            let chunk = store.get_chunk(cursor, 50).unwrap();
            if chunk.accounts.is_empty() {
                break;
            }
            for account in &chunk.accounts {
                let master = account.master_device().unwrap();
                if expired_uuids.contains(&account.uuid) {
                    assert_eq!(master.gcm_id, None);
                    assert!(!master.fetches_messages);
                    cleared += 1;
                } else {
                    assert_eq!(master.gcm_id.as_deref(), Some("gcm-registration"));
                }
            }
            cursor = chunk.next_cursor;
        }
        assert_eq!(cleared, 25);
    }

    // The sweep closed: cursor back to absent, counters advanced
    assert_eq!(fx.cache.get_cursor().await.unwrap(), None);
    let snapshot = fx.metrics.snapshot();
    assert_eq!(snapshot.sweeps_completed, 1);
    assert_eq!(snapshot.accounts_seen, 120);
    assert_eq!(snapshot.chunks_processed, 3);
}

#[tokio::test]
async fn test_second_sweep_is_idempotent() {
    let (mut fx, _) = fixture(60, 10, 25);

    run_sweep(&mut fx.engine).await;
    let first_sweep_messages = fx.queue.len();
    assert_eq!(first_sweep_messages, 10);

    // Snapshot the corpus, then sweep again
    let before: Vec<Account> = {
        let store = fx.store.lock().unwrap();
        store.get_chunk(None, 100).unwrap().accounts
    };

    run_sweep(&mut fx.engine).await;

    let after: Vec<Account> = {
        let store = fx.store.lock().unwrap();
        store.get_chunk(None, 100).unwrap().accounts
    };

    // Account states identical; the queue saw each deregistration again
    // (at-least-once, consumers are idempotent on number)
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.uuid, a.uuid);
        let bm = b.master_device().unwrap();
        let am = a.master_device().unwrap();
        assert_eq!(bm.gcm_id, am.gcm_id);
        assert_eq!(bm.fetches_messages, am.fetches_messages);
    }
    assert_eq!(fx.queue.len(), 2 * first_sweep_messages);
}

#[tokio::test]
async fn test_sweep_completeness_every_account_visited() {
    let (mut fx, _) = fixture(73, 0, 10);

    run_sweep(&mut fx.engine).await;

    let snapshot = fx.metrics.snapshot();
    assert_eq!(snapshot.accounts_seen, 73);
    // 73 accounts at chunk size 10: 8 chunks
    assert_eq!(snapshot.chunks_processed, 8);
}

#[tokio::test]
async fn test_lease_handover_resumes_from_cursor() {
    let (mut fx, _) = fixture(40, 0, 10);

    // Replica A processes one chunk, then dies without releasing
    fx.engine.tick().await.unwrap();
    let cursor = fx.cache.get_cursor().await.unwrap();
    assert!(cursor.is_some());
    fx.cache.evict_lease();

    // Replica B picks up from the persisted cursor
    let listeners: Vec<Arc<dyn AccountDatabaseCrawlerListener>> = vec![];
    let mut replica_b = AccountDatabaseCrawler::new(
        Arc::clone(&fx.store),
        Arc::clone(&fx.cache) as Arc<dyn CrawlerCache>,
        listeners,
        &test_config(10),
        Arc::new(CrawlerMetrics::new()),
    );

    assert_eq!(
        replica_b.tick().await.unwrap(),
        TickOutcome::ChunkProcessed { accounts: 10 }
    );

    // The cursor moved forward, not back
    let new_cursor = fx.cache.get_cursor().await.unwrap().unwrap();
    assert!(new_cursor.to_string() > cursor.unwrap().to_string());
}

#[tokio::test]
async fn test_reset_cursor_restarts_sweep() {
    let (mut fx, _) = fixture(40, 0, 10);

    fx.engine.tick().await.unwrap();
    fx.engine.tick().await.unwrap();
    assert!(fx.cache.get_cursor().await.unwrap().is_some());

    // Operator lever: reset-cursor clears the cursor but not the lease
    fx.cache.clear_cursor().await.unwrap();
    assert!(fx.cache.lease_holder().await.unwrap().is_some());

    // Next tick starts over from the top of the table
    assert_eq!(
        fx.engine.tick().await.unwrap(),
        TickOutcome::ChunkProcessed { accounts: 10 }
    );
}

#[tokio::test]
async fn test_mutual_exclusion_between_replicas() {
    let (mut fx, _) = fixture(40, 0, 10);

    let mut other = AccountDatabaseCrawler::new(
        Arc::clone(&fx.store),
        Arc::clone(&fx.cache) as Arc<dyn CrawlerCache>,
        vec![],
        &test_config(10),
        Arc::new(CrawlerMetrics::new()),
    );

    // First replica wins the lease; the other stands by
    assert_eq!(
        fx.engine.tick().await.unwrap(),
        TickOutcome::ChunkProcessed { accounts: 10 }
    );
    assert_eq!(other.tick().await.unwrap(), TickOutcome::LeaseUnavailable);
    assert_eq!(other.tick().await.unwrap(), TickOutcome::LeaseUnavailable);
}
