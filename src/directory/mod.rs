//! Directory reconciliation client
//!
//! Each sweep re-feeds the contact-discovery directory servers with the
//! visible accounts, chunk by chunk. The client contract is a single
//! `send_chunk` call; the HTTP implementation speaks JSON to the directory
//! server's reconcile endpoint.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Request timeout for a single reconcile call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur talking to a directory server
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Failed to build reconciliation client: {0}")]
    ClientBuild(String),

    #[error("Reconciliation request failed: {0}")]
    Request(String),

    #[error("Directory server returned HTTP {0}")]
    UnexpectedStatus(u16),
}

/// Result type for reconciliation operations
pub type ReconciliationResult<T> = Result<T, ReconciliationError>;

/// One account entry in a reconciliation chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub uuid: Uuid,
    pub number: String,
}

/// Body of a reconcile call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRequest {
    /// Cursor of the chunk being fed; None for the first chunk of a sweep
    #[serde(rename = "fromUuid")]
    pub from_uuid: Option<Uuid>,

    /// Visible accounts of this chunk, in sweep order; empty closes the sweep
    pub accounts: Vec<ReconciliationEntry>,
}

/// Directory server verdict on a reconcile call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationStatus {
    /// Chunk accepted
    Ok,

    /// The server has no record of the previous chunk boundary; the sweep
    /// must restart from the top to rebuild its state
    Missing,
}

#[derive(Debug, Deserialize)]
struct ReconciliationResponse {
    status: String,
}

/// Contract for feeding one directory server
#[async_trait]
pub trait DirectoryReconciliationClient: Send + Sync {
    async fn send_chunk(
        &self,
        request: ReconciliationRequest,
    ) -> ReconciliationResult<ReconciliationStatus>;
}

/// HTTP client for a directory server's reconcile endpoint
pub struct HttpReconciliationClient {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl HttpReconciliationClient {
    /// Builds a client for the given directory server base URL
    pub fn new(base_url: &str, access_token: Option<String>) -> ReconciliationResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ReconciliationError::ClientBuild(e.to_string()))?;

        let endpoint = format!(
            "{}/v2/directory/reconcile",
            base_url.trim_end_matches('/')
        );

        Ok(Self {
            client,
            endpoint,
            access_token,
        })
    }
}

#[async_trait]
impl DirectoryReconciliationClient for HttpReconciliationClient {
    async fn send_chunk(
        &self,
        request: ReconciliationRequest,
    ) -> ReconciliationResult<ReconciliationStatus> {
        let mut builder = self.client.put(&self.endpoint).json(&request);

        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ReconciliationError::Request(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: ReconciliationResponse = response
                    .json()
                    .await
                    .map_err(|e| ReconciliationError::Request(e.to_string()))?;

                if body.status == "missing" {
                    Ok(ReconciliationStatus::Missing)
                } else {
                    Ok(ReconciliationStatus::Ok)
                }
            }
            StatusCode::NOT_FOUND => Ok(ReconciliationStatus::Missing),
            status => Err(ReconciliationError::UnexpectedStatus(status.as_u16())),
        }
    }
}
