//! Directory reconciler: re-feeds a directory server every sweep
//!
//! Each chunk's visible accounts are sent to the directory server together
//! with the chunk's starting cursor, so the server can diff them against its
//! own table segment. At sweep end an empty chunk closes the pass. A server
//! that answers "missing" has lost the preceding boundary and needs the
//! sweep restarted from the top.

use crate::account::Account;
use crate::crawler::listener::{AccountDatabaseCrawlerListener, ListenerError, ListenerResult};
use crate::directory::{
    DirectoryReconciliationClient, ReconciliationEntry, ReconciliationRequest,
    ReconciliationStatus,
};

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Listener feeding one directory server
pub struct DirectoryReconciler {
    name: String,
    replication_name: String,
    client: Arc<dyn DirectoryReconciliationClient>,
}

impl DirectoryReconciler {
    /// Creates a reconciler for the named directory server
    pub fn new(
        replication_name: impl Into<String>,
        client: Arc<dyn DirectoryReconciliationClient>,
    ) -> Self {
        let replication_name = replication_name.into();
        Self {
            name: format!("directory-reconciler-{}", replication_name),
            replication_name,
            client,
        }
    }

    async fn send(&self, request: ReconciliationRequest) -> ListenerResult {
        let sent = request.accounts.len();

        match self.client.send_chunk(request).await {
            Ok(ReconciliationStatus::Ok) => {
                tracing::debug!(
                    "Reconciled {} accounts against '{}'",
                    sent,
                    self.replication_name
                );
                Ok(())
            }
            Ok(ReconciliationStatus::Missing) => Err(ListenerError::Restart(format!(
                "directory '{}' lost the chunk boundary",
                self.replication_name
            ))),
            Err(e) => Err(ListenerError::Recoverable(format!(
                "directory '{}' unreachable: {}",
                self.replication_name, e
            ))),
        }
    }
}

#[async_trait]
impl AccountDatabaseCrawlerListener for DirectoryReconciler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_crawl_chunk(&self, from: Option<Uuid>, accounts: &[Account]) -> ListenerResult {
        let entries: Vec<ReconciliationEntry> = accounts
            .iter()
            .filter(|a| a.is_enabled())
            .map(|a| ReconciliationEntry {
                uuid: a.uuid,
                number: a.number.clone(),
            })
            .collect();

        self.send(ReconciliationRequest {
            from_uuid: from,
            accounts: entries,
        })
        .await
    }

    async fn on_crawl_end(&self, final_cursor: Option<Uuid>) -> ListenerResult {
        // Empty chunk closes the sweep on the server side
        self.send(ReconciliationRequest {
            from_uuid: final_cursor,
            accounts: Vec::new(),
        })
        .await
    }
}
