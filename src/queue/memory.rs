//! In-memory directory queue for tests

use crate::queue::{DirectoryMessage, DirectoryQueue, QueueError, QueueResult};

use async_trait::async_trait;
use std::sync::Mutex;

/// Directory queue capturing messages in process memory
#[derive(Debug, Default)]
pub struct MemoryDirectoryQueue {
    messages: Mutex<Vec<DirectoryMessage>>,

    /// When set, every enqueue fails with this message
    pub fail_with: Mutex<Option<String>>,
}

impl MemoryDirectoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything enqueued so far
    pub fn messages(&self) -> Vec<DirectoryMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Number of messages enqueued so far
    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DirectoryQueue for MemoryDirectoryQueue {
    async fn enqueue(&self, message: DirectoryMessage) -> QueueResult<()> {
        if let Some(reason) = self.fail_with.lock().unwrap().clone() {
            return Err(QueueError::Operation(reason));
        }

        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}
