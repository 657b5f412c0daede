//! Directory queue: at-least-once account events for the contact-discovery
//! directory
//!
//! Messages are JSON documents `{action, number, uuid}` appended to the
//! fleet message queue. Consumers are idempotent on `number`, so enqueueing
//! the same event twice is harmless.

mod memory;
mod redis;

pub use memory::MemoryDirectoryQueue;
pub use redis::RedisDirectoryQueue;

use crate::account::Account;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during directory queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Failed to connect to queue at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Queue operation failed: {0}")]
    Operation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for directory queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Direction of a directory change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryAction {
    Add,
    Delete,
}

/// A single directory change event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMessage {
    pub action: DirectoryAction,

    /// E.164 phone number the directory is keyed by
    pub number: String,

    pub uuid: String,
}

impl DirectoryMessage {
    /// Builds a registration event for an account
    pub fn add(account: &Account) -> Self {
        Self {
            action: DirectoryAction::Add,
            number: account.number.clone(),
            uuid: account.uuid.to_string(),
        }
    }

    /// Builds a deregistration event for an account
    pub fn delete(account: &Account) -> Self {
        Self {
            action: DirectoryAction::Delete,
            number: account.number.clone(),
            uuid: account.uuid.to_string(),
        }
    }
}

/// Shared sink of directory change events, delivered at least once
#[async_trait]
pub trait DirectoryQueue: Send + Sync {
    /// Appends a message to the queue
    async fn enqueue(&self, message: DirectoryMessage) -> QueueResult<()>;
}
