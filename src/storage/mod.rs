//! Account store: the paging contract the crawler sweeps over
//!
//! The crawler depends only on the `AccountStore` trait: an ordered paging
//! read (`get_chunk`) and the accounts-manager persistence surface
//! (`update`). The SQLite backend makes the service runnable end-to-end;
//! the memory backend drives listener and engine tests.

mod memory;
mod sqlite;

pub use memory::MemoryAccountStore;
pub use sqlite::SqliteAccountStore;

use crate::account::Account;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during account store operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for account store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One page of the account corpus
///
/// `next_cursor == None` is the end-of-table sentinel; a chunk may be short
/// but is empty only together with `next_cursor == None`.
#[derive(Debug, Clone)]
pub struct AccountChunk {
    /// Accounts in cursor order
    pub accounts: Vec<Account>,

    /// Cursor to thread back into the next `get_chunk` call, or None at END
    pub next_cursor: Option<Uuid>,
}

/// Paging and persistence contract over the account corpus
///
/// Implementations guarantee a dense, total, deterministic ordering of
/// accounts (the lexicographic order of hyphenated lowercase uuid strings)
/// and no duplicates within a sweep when the caller threads `next_cursor`
/// back unchanged.
pub trait AccountStore: Send {
    /// Returns the next ordered chunk of accounts strictly after `after`
    ///
    /// # Arguments
    ///
    /// * `after` - The cursor from the previous chunk, or None to start at
    ///   the top of the table
    /// * `limit` - Maximum number of accounts to return
    fn get_chunk(&self, after: Option<Uuid>, limit: usize) -> StorageResult<AccountChunk>;

    /// Persists an updated account record
    fn update(&mut self, account: &Account) -> StorageResult<()>;

    /// Returns the total number of accounts
    fn count(&self) -> StorageResult<u64>;
}
