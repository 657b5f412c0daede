//! Account-Sweeper: the account database crawler of a secure-messaging backend
//!
//! This crate implements a chunked sweep over the account corpus with a
//! cluster-shared cursor, a distributed single-writer lease, and a pluggable
//! listener pipeline (account expiry, directory reconciliation, active-user
//! accounting).

pub mod account;
pub mod cache;
pub mod config;
pub mod crawler;
pub mod directory;
pub mod queue;
pub mod storage;

use thiserror::Error;

/// Main error type for Account-Sweeper operations
#[derive(Debug, Error)]
pub enum SweeperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Directory queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("Directory reconciliation error: {0}")]
    Reconciliation(#[from] directory::ReconciliationError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Account-Sweeper operations
pub type Result<T> = std::result::Result<T, SweeperError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use account::{Account, Device, PRIMARY_DEVICE_ID};
pub use cache::CrawlerCache;
pub use config::Config;
pub use crawler::{AccountDatabaseCrawler, AccountDatabaseCrawlerListener};
pub use storage::{AccountChunk, AccountStore};
