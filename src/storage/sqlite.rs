//! SQLite-backed account store
//!
//! Accounts live in a single table keyed by the hyphenated lowercase uuid
//! string; the device set is a JSON column. Keying by the uuid string makes
//! `ORDER BY uuid` the pager's deterministic total order.

use crate::account::Account;
use crate::storage::{AccountChunk, AccountStore, StorageError, StorageResult};

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    uuid    TEXT PRIMARY KEY,
    number  TEXT NOT NULL,
    devices TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_accounts_number ON accounts(number);
";

/// Account store backed by a SQLite database file
pub struct SqliteAccountStore {
    conn: Connection,
}

impl SqliteAccountStore {
    /// Opens or creates the account database at the given path
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory database (tests)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Inserts a new account or replaces an existing one
    pub fn insert(&mut self, account: &Account) -> StorageResult<()> {
        let devices = serde_json::to_string(&account.devices)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn.execute(
            "INSERT OR REPLACE INTO accounts (uuid, number, devices) VALUES (?1, ?2, ?3)",
            params![account.uuid.to_string(), account.number, devices],
        )?;
        Ok(())
    }

    /// Fetches a single account by uuid
    pub fn get(&self, uuid: Uuid) -> StorageResult<Account> {
        let row = self
            .conn
            .query_row(
                "SELECT uuid, number, devices FROM accounts WHERE uuid = ?1",
                params![uuid.to_string()],
                row_to_account,
            )
            .optional()?;

        row.ok_or(StorageError::AccountNotFound(uuid))?
    }
}

/// Maps a result row to an account, deferring JSON errors to the caller
fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<StorageResult<Account>> {
    let uuid: String = row.get(0)?;
    let number: String = row.get(1)?;
    let devices: String = row.get(2)?;

    Ok((|| {
        let uuid = Uuid::parse_str(&uuid)
            .map_err(|e| StorageError::Serialization(format!("bad uuid '{}': {}", uuid, e)))?;
        let devices = serde_json::from_str(&devices)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Account {
            uuid,
            number,
            devices,
        })
    })())
}

impl AccountStore for SqliteAccountStore {
    fn get_chunk(&self, after: Option<Uuid>, limit: usize) -> StorageResult<AccountChunk> {
        let after = after.map(|u| u.to_string()).unwrap_or_default();

        let mut stmt = self.conn.prepare(
            "SELECT uuid, number, devices FROM accounts WHERE uuid > ?1 ORDER BY uuid LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![after, limit as i64], row_to_account)?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row??);
        }

        let next_cursor = accounts.last().map(|a| a.uuid);
        Ok(AccountChunk {
            accounts,
            next_cursor,
        })
    }

    fn update(&mut self, account: &Account) -> StorageResult<()> {
        let devices = serde_json::to_string(&account.devices)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let changed = self.conn.execute(
            "UPDATE accounts SET number = ?2, devices = ?3 WHERE uuid = ?1",
            params![account.uuid.to_string(), account.number, devices],
        )?;

        if changed == 0 {
            return Err(StorageError::AccountNotFound(account.uuid));
        }
        Ok(())
    }

    fn count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
