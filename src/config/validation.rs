use crate::config::types::{CacheConfig, CleanerConfig, Config, CrawlerConfig, DirectoryConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_cleaner_config(&config.cleaner)?;
    validate_cache_config(&config.cache)?;
    validate_storage_config(&config.storage)?;
    validate_directory_config(&config.directory)?;
    Ok(())
}

/// Validates crawler engine configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.chunk_size < 1 || config.chunk_size > 10_000 {
        return Err(ConfigError::Validation(format!(
            "chunk_size must be between 1 and 10000, got {}",
            config.chunk_size
        )));
    }

    if config.chunk_interval_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "chunk_interval_ms must be >= 10ms, got {}ms",
            config.chunk_interval_ms
        )));
    }

    // Lease flapping guard: the lease must outlast several chunk cycles
    if config.lease_ttl_ms < 3 * config.chunk_interval_ms {
        return Err(ConfigError::Validation(format!(
            "lease_ttl_ms must be >= 3 * chunk_interval_ms ({}ms), got {}ms",
            3 * config.chunk_interval_ms,
            config.lease_ttl_ms
        )));
    }

    Ok(())
}

/// Validates cleaner policy configuration
fn validate_cleaner_config(config: &CleanerConfig) -> Result<(), ConfigError> {
    if config.retention_days < 30 {
        return Err(ConfigError::Validation(format!(
            "retention_days must be >= 30, got {}",
            config.retention_days
        )));
    }

    if config.max_account_updates_per_chunk < 1 {
        return Err(ConfigError::Validation(format!(
            "max_account_updates_per_chunk must be >= 1, got {}",
            config.max_account_updates_per_chunk
        )));
    }

    Ok(())
}

/// Validates cache cluster configuration
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    validate_redis_url("cache.url", &config.url)
}

/// Validates account store configuration
fn validate_storage_config(
    config: &crate::config::types::StorageConfig,
) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates directory queue and reconciliation configuration
fn validate_directory_config(config: &DirectoryConfig) -> Result<(), ConfigError> {
    validate_redis_url("directory.queue-url", &config.queue_url)?;

    if config.stream_key.is_empty() {
        return Err(ConfigError::Validation(
            "directory.stream-key cannot be empty".to_string(),
        ));
    }

    for entry in &config.reconcile {
        if entry.name.is_empty() {
            return Err(ConfigError::Validation(
                "directory.reconcile entries must have a non-empty name".to_string(),
            ));
        }

        if !entry.base_url.starts_with("http://") && !entry.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(format!(
                "directory.reconcile '{}' base-url must be an http(s) URL, got '{}'",
                entry.name, entry.base_url
            )));
        }
    }

    Ok(())
}

/// Validates that a URL names a redis endpoint
fn validate_redis_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", key)));
    }

    if !url.starts_with("redis://") && !url.starts_with("rediss://") {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must be a redis:// URL, got '{}'",
            key, url
        )));
    }

    Ok(())
}
