//! Account cleaner: aging-based account expiry
//!
//! An account expires when none of its devices has been seen within the
//! retention window. Expired accounts lose their push delivery paths and are
//! deregistered from the contact-discovery directory. Updates against the
//! account store are capped per chunk; directory enqueues are not (the cap
//! bounds the expensive mutation burst, the queue drain is cheap).

use crate::account::Account;
use crate::crawler::listener::{AccountDatabaseCrawlerListener, ListenerError, ListenerResult};
use crate::queue::{DirectoryMessage, DirectoryQueue};
use crate::storage::AccountStore;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Returns true iff the account snapshot is expired at `now_ms`
///
/// The reprieve is the *most recent* activity across all devices: a single
/// device seen within the retention window keeps the whole account alive,
/// whether or not that device is enabled. An account without a primary
/// device is a partial state and never expires here.
pub fn is_account_expired(account: &Account, retention_ms: i64, now_ms: i64) -> bool {
    if account.master_device().is_none() {
        return false;
    }

    match account.last_seen() {
        Some(last_seen) => now_ms - last_seen >= retention_ms,
        None => false,
    }
}

/// Listener that expires and deregisters aged-out accounts
pub struct AccountCleaner {
    store: Arc<Mutex<dyn AccountStore>>,
    queue: Arc<dyn DirectoryQueue>,
    retention_ms: i64,
    max_updates_per_chunk: usize,
}

impl AccountCleaner {
    /// Creates a cleaner with the given policy knobs
    ///
    /// # Arguments
    ///
    /// * `store` - The accounts manager used to persist cleaned accounts
    /// * `queue` - The directory queue receiving deregistration events
    /// * `retention_days` - Inactivity window before an account expires
    /// * `max_updates_per_chunk` - Cap on store mutations per chunk
    pub fn new(
        store: Arc<Mutex<dyn AccountStore>>,
        queue: Arc<dyn DirectoryQueue>,
        retention_days: u32,
        max_updates_per_chunk: usize,
    ) -> Self {
        Self {
            store,
            queue,
            retention_ms: i64::from(retention_days) * MS_PER_DAY,
            max_updates_per_chunk,
        }
    }

    /// Clears the primary device's push paths and persists the account
    fn clean_account(&self, account: &Account) -> ListenerResult {
        let mut cleaned = account.clone();
        if let Some(master) = cleaned.master_device_mut() {
            master.clear_push_credentials();
        }

        let mut store = self.store.lock().unwrap();
        store
            .update(&cleaned)
            .map_err(|e| ListenerError::Recoverable(format!("account update failed: {}", e)))
    }
}

#[async_trait]
impl AccountDatabaseCrawlerListener for AccountCleaner {
    fn name(&self) -> &str {
        "account-cleaner"
    }

    async fn on_crawl_chunk(&self, _from: Option<Uuid>, accounts: &[Account]) -> ListenerResult {
        let now_ms = Utc::now().timestamp_millis();

        let mut expired = 0usize;
        let mut updated = 0usize;
        let mut enabled = 0usize;

        for account in accounts {
            if is_account_expired(account, self.retention_ms, now_ms) {
                expired += 1;

                if updated < self.max_updates_per_chunk {
                    self.clean_account(account)?;
                    updated += 1;
                }

                // The directory must forget the number even when the update
                // cap has been hit; the next sweep retries the mutation.
                self.queue
                    .enqueue(DirectoryMessage::delete(account))
                    .await
                    .map_err(|e| {
                        ListenerError::Recoverable(format!("directory enqueue failed: {}", e))
                    })?;
            } else if account.is_enabled() {
                enabled += 1;
            }
        }

        if expired > 0 {
            tracing::info!(
                "Expired {} accounts in chunk of {} ({} updated, {} enabled)",
                expired,
                accounts.len(),
                updated,
                enabled
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Device, PRIMARY_DEVICE_ID};
    use crate::queue::{DirectoryAction, MemoryDirectoryQueue};
    use crate::storage::MemoryAccountStore;

    const RETENTION_DAYS: u32 = 366;
    const RETENTION_MS: i64 = 366 * MS_PER_DAY;

    fn device(id: u64, last_seen: i64, enabled: bool) -> Device {
        Device {
            id,
            last_seen,
            enabled,
            gcm_id: Some("gcm-registration".to_string()),
            apn_id: None,
            fetches_messages: true,
        }
    }

    fn days_ago(now_ms: i64, days: i64) -> i64 {
        now_ms - days * MS_PER_DAY
    }

    fn account(number: &str, devices: Vec<Device>) -> Account {
        Account::new(Uuid::new_v4(), number, devices)
    }

    #[test]
    fn test_is_account_expired_matrix() {
        let now_ms = Utc::now().timestamp_millis();

        // Recent primary and secondary
        let recent = account(
            "+14152222222",
            vec![
                device(PRIMARY_DEVICE_ID, days_ago(now_ms, 1), true),
                device(2, days_ago(now_ms, 1), true),
            ],
        );
        assert!(!is_account_expired(&recent, RETENTION_MS, now_ms));

        // Recent primary, aging secondary
        let aging_secondary = account(
            "+14152222222",
            vec![
                device(PRIMARY_DEVICE_ID, days_ago(now_ms, 1), true),
                device(2, days_ago(now_ms, 31), false),
            ],
        );
        assert!(!is_account_expired(&aging_secondary, RETENTION_MS, now_ms));

        // Old primary, aging secondary: the 31-day secondary reprieves the
        // account even though it is disabled
        let aging_primary = account(
            "+14152222222",
            vec![
                device(PRIMARY_DEVICE_ID, days_ago(now_ms, 366), true),
                device(2, days_ago(now_ms, 31), false),
            ],
        );
        assert!(!is_account_expired(&aging_primary, RETENTION_MS, now_ms));

        // Both devices at the threshold
        let old = account(
            "+14152222222",
            vec![
                device(PRIMARY_DEVICE_ID, days_ago(now_ms, 366), true),
                device(2, days_ago(now_ms, 366), false),
            ],
        );
        assert!(is_account_expired(&old, RETENTION_MS, now_ms));
    }

    #[test]
    fn test_is_account_expired_threshold_is_inclusive() {
        let now_ms = Utc::now().timestamp_millis();
        let at_threshold = account(
            "+14152222222",
            vec![device(PRIMARY_DEVICE_ID, now_ms - RETENTION_MS, true)],
        );
        let just_inside = account(
            "+14152222222",
            vec![device(PRIMARY_DEVICE_ID, now_ms - RETENTION_MS + 1, true)],
        );

        assert!(is_account_expired(&at_threshold, RETENTION_MS, now_ms));
        assert!(!is_account_expired(&just_inside, RETENTION_MS, now_ms));
    }

    #[test]
    fn test_is_account_expired_partial_states() {
        let now_ms = Utc::now().timestamp_millis();

        // No primary device: partial state, never expired
        let no_master = account(
            "+14152222222",
            vec![device(2, days_ago(now_ms, 400), true)],
        );
        assert!(!is_account_expired(&no_master, RETENTION_MS, now_ms));

        // No devices at all
        let empty = account("+14152222222", vec![]);
        assert!(!is_account_expired(&empty, RETENTION_MS, now_ms));
    }

    fn setup(
        accounts: Vec<Account>,
        max_updates: usize,
    ) -> (
        AccountCleaner,
        Arc<Mutex<dyn AccountStore>>,
        Arc<MemoryDirectoryQueue>,
    ) {
        let mut store = MemoryAccountStore::new();
        for account in accounts {
            store.insert(account);
        }
        let store: Arc<Mutex<dyn AccountStore>> = Arc::new(Mutex::new(store));
        let queue = Arc::new(MemoryDirectoryQueue::new());
        let cleaner = AccountCleaner::new(
            Arc::clone(&store),
            Arc::clone(&queue) as Arc<dyn DirectoryQueue>,
            RETENTION_DAYS,
            max_updates,
        );
        (cleaner, store, queue)
    }

    #[tokio::test]
    async fn test_unexpired_accounts_untouched() {
        let now_ms = Utc::now().timestamp_millis();
        let accounts = vec![
            account(
                "+14151111111",
                vec![device(PRIMARY_DEVICE_ID, days_ago(now_ms, 1), true)],
            ),
            account(
                "+14152222222",
                vec![
                    device(PRIMARY_DEVICE_ID, days_ago(now_ms, 1), true),
                    device(2, days_ago(now_ms, 366), false),
                ],
            ),
        ];
        let (cleaner, store, queue) = setup(accounts.clone(), 40);

        cleaner.on_crawl_start().await.unwrap();
        cleaner.on_crawl_chunk(None, &accounts).await.unwrap();
        cleaner.on_crawl_end(None).await.unwrap();

        // No mutations, no enqueues
        assert!(queue.is_empty());
        let store = store.lock().unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_expired_account_cleaned_and_deregistered() {
        let now_ms = Utc::now().timestamp_millis();
        let expired = account(
            "+14152222222",
            vec![
                device(PRIMARY_DEVICE_ID, days_ago(now_ms, 366), true),
                device(2, days_ago(now_ms, 366), false),
            ],
        );
        let uuid = expired.uuid;
        let (cleaner, store, queue) = setup(vec![expired.clone()], 40);

        cleaner.on_crawl_chunk(None, &[expired]).await.unwrap();

        let messages = queue.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].action, DirectoryAction::Delete);
        assert_eq!(messages[0].number, "+14152222222");
        assert_eq!(messages[0].uuid, uuid.to_string());

        // Push credentials cleared and persisted
        let store = store.lock().unwrap();
        let chunk = store.get_chunk(None, 10).unwrap();
        let master = chunk.accounts[0].master_device().unwrap();
        assert_eq!(master.gcm_id, None);
        assert_eq!(master.apn_id, None);
        assert!(!master.fetches_messages);
    }

    #[tokio::test]
    async fn test_update_cap_does_not_cap_enqueues() {
        let now_ms = Utc::now().timestamp_millis();
        let accounts: Vec<Account> = (0..50)
            .map(|i| {
                account(
                    &format!("+1415000{:04}", i),
                    vec![device(PRIMARY_DEVICE_ID, days_ago(now_ms, 400), true)],
                )
            })
            .collect();
        let (cleaner, store, queue) = setup(accounts.clone(), 40);

        cleaner.on_crawl_chunk(None, &accounts).await.unwrap();

        // Exactly the cap's worth of store updates, but every expired
        // account reaches the directory queue
        assert_eq!(queue.len(), 50);
        let store = store.lock().unwrap();
        let updated: usize = store
            .get_chunk(None, 100)
            .unwrap()
            .accounts
            .iter()
            .filter(|a| a.master_device().unwrap().gcm_id.is_none())
            .count();
        assert_eq!(updated, 40);
    }

    #[tokio::test]
    async fn test_cleaning_is_idempotent() {
        let now_ms = Utc::now().timestamp_millis();
        let expired = account(
            "+14152222222",
            vec![device(PRIMARY_DEVICE_ID, days_ago(now_ms, 400), true)],
        );
        let (cleaner, store, queue) = setup(vec![expired.clone()], 40);

        cleaner.on_crawl_chunk(None, &[expired.clone()]).await.unwrap();
        let after_first = {
            let store = store.lock().unwrap();
            store.get_chunk(None, 10).unwrap().accounts[0].clone()
        };

        // Re-dispatch of the same chunk (at-least-once delivery)
        cleaner.on_crawl_chunk(None, &[after_first.clone()]).await.unwrap();

        let after_second = {
            let store = store.lock().unwrap();
            store.get_chunk(None, 10).unwrap().accounts[0].clone()
        };
        let first_master = after_first.master_device().unwrap();
        let second_master = after_second.master_device().unwrap();
        assert_eq!(first_master.gcm_id, second_master.gcm_id);
        assert_eq!(first_master.fetches_messages, second_master.fetches_messages);

        // The queue saw the deregistration at least once
        assert!(queue.len() >= 1);
    }

    #[tokio::test]
    async fn test_queue_failure_is_recoverable() {
        let now_ms = Utc::now().timestamp_millis();
        let expired = account(
            "+14152222222",
            vec![device(PRIMARY_DEVICE_ID, days_ago(now_ms, 400), true)],
        );
        let (cleaner, _store, queue) = setup(vec![expired.clone()], 40);
        *queue.fail_with.lock().unwrap() = Some("queue offline".to_string());

        let result = cleaner.on_crawl_chunk(None, &[expired]).await;
        assert!(matches!(result, Err(ListenerError::Recoverable(_))));
    }
}
