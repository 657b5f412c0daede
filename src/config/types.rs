use serde::Deserialize;

/// Main configuration structure for Account-Sweeper
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub cleaner: CleanerConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub directory: DirectoryConfig,
}

/// Crawler engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of accounts fetched and dispatched per chunk
    #[serde(rename = "chunk-size", default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Delay between chunks (milliseconds); acceleration overrides this
    #[serde(rename = "chunk-interval-ms", default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: u64,

    /// Lease TTL (milliseconds); must comfortably outlast chunk processing
    #[serde(rename = "lease-ttl-ms", default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: u64,
}

/// Account expiry policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CleanerConfig {
    /// Days of inactivity across all devices before an account expires
    #[serde(rename = "retention-days", default = "default_retention_days")]
    pub retention_days: u32,

    /// Cap on account mutations per chunk (directory enqueues are uncapped)
    #[serde(
        rename = "max-account-updates-per-chunk",
        default = "default_max_account_updates"
    )]
    pub max_account_updates_per_chunk: usize,
}

/// Shared cache cluster configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Redis URL of the cache cluster holding cursor, lease, and flags
    pub url: String,
}

/// Account store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite account database
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Directory queue and reconciliation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Redis URL of the fleet message queue
    #[serde(rename = "queue-url")]
    pub queue_url: String,

    /// Stream key the directory messages are appended to
    #[serde(rename = "stream-key", default = "default_stream_key")]
    pub stream_key: String,

    /// Directory servers to reconcile against (one listener per entry)
    #[serde(default)]
    pub reconcile: Vec<ReconcileEntry>,
}

/// A single directory server to feed during each sweep
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileEntry {
    /// Replication name, used in logs and metrics
    pub name: String,

    /// Base URL of the directory server
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Bearer token for the reconciliation endpoint
    #[serde(rename = "access-token")]
    pub access_token: Option<String>,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_interval_ms() -> u64 {
    8000
}

fn default_lease_ttl_ms() -> u64 {
    60_000
}

fn default_retention_days() -> u32 {
    366
}

fn default_max_account_updates() -> usize {
    40
}

fn default_stream_key() -> String {
    "directory::queue".to_string()
}
