//! Account-Sweeper main entry point
//!
//! Runs the account database crawler on this replica, or performs one of the
//! operator tasks against the shared cache (acceleration toggle, cursor
//! reset, status).

use account_sweeper::cache::{CrawlerCache, RedisCrawlerCache};
use account_sweeper::config::{load_config_with_hash, Config};
use account_sweeper::crawler::{
    AccountCleaner, AccountDatabaseCrawler, AccountDatabaseCrawlerListener, ActiveUserCounter,
    CrawlerMetrics, DirectoryReconciler,
};
use account_sweeper::directory::HttpReconciliationClient;
use account_sweeper::queue::RedisDirectoryQueue;
use account_sweeper::storage::{AccountStore, SqliteAccountStore};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Account-Sweeper: account database crawler
///
/// Sweeps the account corpus chunk by chunk under a distributed lease,
/// expiring aged-out accounts and reconciling the contact-discovery
/// directory.
#[derive(Parser, Debug)]
#[command(name = "account-sweeper")]
#[command(version = "1.0.0")]
#[command(about = "Account database crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the crawler loop on this replica
    Run,

    /// Toggle accelerated sweeping fleet-wide (takes effect next tick)
    Accelerate {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Clear the shared cursor so the next tick starts a fresh sweep
    ResetCursor,

    /// Show the shared crawler state
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) =
        load_config_with_hash(&cli.config).context("failed to load configuration")?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    match cli.command {
        Command::Run => handle_run(config).await,
        Command::Accelerate { state } => {
            handle_accelerate(&config, matches!(state, Toggle::On)).await
        }
        Command::ResetCursor => handle_reset_cursor(&config).await,
        Command::Status => handle_status(&config).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("account_sweeper=info,warn"),
            1 => EnvFilter::new("account_sweeper=debug,info"),
            2 => EnvFilter::new("account_sweeper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the run subcommand: the crawler loop
async fn handle_run(config: Config) -> anyhow::Result<()> {
    let cache = Arc::new(
        RedisCrawlerCache::new(&config.cache.url)
            .await
            .context("failed to connect to the cache cluster")?,
    );

    let store = SqliteAccountStore::new(Path::new(&config.storage.database_path))
        .context("failed to open the account database")?;
    let store: Arc<Mutex<dyn AccountStore>> = Arc::new(Mutex::new(store));

    let queue = Arc::new(
        RedisDirectoryQueue::new(&config.directory.queue_url, &config.directory.stream_key)
            .await
            .context("failed to connect to the directory queue")?,
    );

    // Listener chain; registration order is dispatch order
    let mut listeners: Vec<Arc<dyn AccountDatabaseCrawlerListener>> =
        vec![Arc::new(ActiveUserCounter::new())];

    for entry in &config.directory.reconcile {
        let client = HttpReconciliationClient::new(&entry.base_url, entry.access_token.clone())
            .with_context(|| format!("failed to build reconciliation client '{}'", entry.name))?;
        listeners.push(Arc::new(DirectoryReconciler::new(
            entry.name.clone(),
            Arc::new(client),
        )));
    }

    listeners.push(Arc::new(AccountCleaner::new(
        Arc::clone(&store),
        queue,
        config.cleaner.retention_days,
        config.cleaner.max_account_updates_per_chunk,
    )));

    tracing::info!(
        "Registered {} listeners ({} directory servers)",
        listeners.len(),
        config.directory.reconcile.len()
    );

    let metrics = Arc::new(CrawlerMetrics::new());
    let mut engine = AccountDatabaseCrawler::new(
        store,
        cache,
        listeners,
        &config.crawler,
        metrics,
    );

    // Drain the current chunk and release the lease on ctrl-c
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    engine.run(shutdown_rx).await;
    Ok(())
}

/// Handles the accelerate subcommand
async fn handle_accelerate(config: &Config, enabled: bool) -> anyhow::Result<()> {
    let cache = RedisCrawlerCache::new(&config.cache.url)
        .await
        .context("failed to connect to the cache cluster")?;

    cache.set_accelerated(enabled).await?;

    println!(
        "Crawler acceleration {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// Handles the reset-cursor subcommand
async fn handle_reset_cursor(config: &Config) -> anyhow::Result<()> {
    let cache = RedisCrawlerCache::new(&config.cache.url)
        .await
        .context("failed to connect to the cache cluster")?;

    cache.clear_cursor().await?;

    println!("Cursor cleared; the next tick starts a new sweep");
    Ok(())
}

/// Handles the status subcommand
async fn handle_status(config: &Config) -> anyhow::Result<()> {
    let cache = RedisCrawlerCache::new(&config.cache.url)
        .await
        .context("failed to connect to the cache cluster")?;

    let cursor = cache.get_cursor().await?;
    let accelerated = cache.is_accelerated().await?;
    let lease_holder = cache.lease_holder().await?;

    println!("=== Account-Sweeper Status ===\n");
    println!(
        "Cursor:       {}",
        cursor
            .map(|c| c.to_string())
            .unwrap_or_else(|| "(sweep start)".to_string())
    );
    println!("Accelerated:  {}", accelerated);
    println!(
        "Lease holder: {}",
        lease_holder.unwrap_or_else(|| "(none)".to_string())
    );

    match SqliteAccountStore::new(Path::new(&config.storage.database_path)) {
        Ok(store) => println!("Accounts:     {}", store.count()?),
        Err(e) => println!("Accounts:     unavailable ({})", e),
    }

    Ok(())
}
