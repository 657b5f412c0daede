//! Configuration loading and validation
//!
//! This module handles parsing the TOML configuration file, applying
//! defaults, validating value ranges, and hashing the file content so a
//! replica can report which configuration it runs.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{
    CacheConfig, CleanerConfig, Config, CrawlerConfig, DirectoryConfig, ReconcileEntry,
    StorageConfig,
};
pub use validation::validate;
