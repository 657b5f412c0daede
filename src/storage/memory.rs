//! In-memory account store for tests
//!
//! Keeps the corpus in a `BTreeMap` keyed by uuid string so the pager
//! ordering matches the SQLite backend exactly, and records every `update`
//! call for assertions.

use crate::account::Account;
use crate::storage::{AccountChunk, AccountStore, StorageError, StorageResult};

use std::collections::BTreeMap;
use uuid::Uuid;

/// Account store held in process memory
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: BTreeMap<String, Account>,

    /// Uuids passed to `update`, in call order
    pub updates: Vec<Uuid>,

    /// When set, every operation fails with this message
    pub fail_with: Option<String>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account to the corpus
    pub fn insert(&mut self, account: Account) {
        self.accounts.insert(account.uuid.to_string(), account);
    }

    /// Fetches an account by uuid
    pub fn get(&self, uuid: Uuid) -> Option<&Account> {
        self.accounts.get(&uuid.to_string())
    }

    fn check_failure(&self) -> StorageResult<()> {
        match &self.fail_with {
            Some(reason) => Err(StorageError::Database(reason.clone())),
            None => Ok(()),
        }
    }
}

impl AccountStore for MemoryAccountStore {
    fn get_chunk(&self, after: Option<Uuid>, limit: usize) -> StorageResult<AccountChunk> {
        self.check_failure()?;

        let after = after.map(|u| u.to_string()).unwrap_or_default();

        let accounts: Vec<Account> = self
            .accounts
            .range::<String, _>((
                std::ops::Bound::Excluded(&after),
                std::ops::Bound::Unbounded,
            ))
            .take(limit)
            .map(|(_, a)| a.clone())
            .collect();

        let next_cursor = accounts.last().map(|a| a.uuid);
        Ok(AccountChunk {
            accounts,
            next_cursor,
        })
    }

    fn update(&mut self, account: &Account) -> StorageResult<()> {
        self.check_failure()?;

        let key = account.uuid.to_string();
        if !self.accounts.contains_key(&key) {
            return Err(StorageError::AccountNotFound(account.uuid));
        }

        self.accounts.insert(key, account.clone());
        self.updates.push(account.uuid);
        Ok(())
    }

    fn count(&self) -> StorageResult<u64> {
        self.check_failure()?;
        Ok(self.accounts.len() as u64)
    }
}
