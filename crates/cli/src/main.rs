//! deepwave CLI - research cache maintenance
//!
//! This binary inspects and maintains the persistent query cache shared by
//! research runs, and prints the effective configuration.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use deepwave::{format_cache_report, format_config, format_eviction};
use deepwave_cache::CacheManager;
use deepwave_core::Config;
use dialoguer::Confirm;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "deepwave")]
#[command(about = "Multi-wave research orchestrator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and maintain the query cache
    #[command(subcommand)]
    Cache(CacheCommands),
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache statistics
    Stats,
    /// Remove expired, stale and over-capacity entries
    Evict,
    /// Delete every cache entry
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    match cli.command {
        Some(Commands::Cache(cache_cmd)) => {
            handle_cache_command(cache_cmd, cli.config.as_deref()).await
        }
        Some(Commands::Config(ConfigCommands::Show)) => {
            let config = load_config(cli.config.as_deref())?;
            println!("{}", format_config(&config)?);
            Ok(())
        }
        None => {
            println!("Run 'deepwave cache stats' to inspect the query cache, or --help for more options");
            Ok(())
        }
    }
}

/// Initialize logging system
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "deepwave={level},deepwave_core={level},deepwave_cache={level}"
        ))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;

    Ok(())
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    config.validate()?;
    debug!("Loaded configuration: {config:?}");
    Ok(config)
}

/// Ask before deleting everything
///
/// Returns true if user confirms, false if cancelled
fn confirm_clear() -> Result<bool> {
    Confirm::new()
        .with_prompt("Delete every cached research result?")
        .default(false)
        .interact()
        .map_err(|e| anyhow!("Failed to read confirmation: {e}"))
}

async fn handle_cache_command(command: CacheCommands, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    if !config.cache.enabled {
        println!("The query cache is disabled in the configuration.");
        return Ok(());
    }

    let cache = CacheManager::open(&config.cache)
        .await
        .context("Failed to open query cache")?;
    if !cache.is_persistent() {
        return Err(anyhow!(
            "Persistent cache store is unavailable; see the log above for the cause"
        ));
    }

    match command {
        CacheCommands::Stats => {
            print!("{}", format_cache_report(&cache.report().await));
        }
        CacheCommands::Evict => {
            // Opening the cache already ran one pass; report both
            let opening = cache.stats();
            let report = cache.evict().await;
            let mut total = report;
            total.expired += opening.expired_evictions;
            total.stale += opening.stale_evictions;
            total.capacity += opening.capacity_evictions;
            println!("{}", format_eviction(&total));
        }
        CacheCommands::Clear { yes } => {
            if !yes && !confirm_clear()? {
                println!("Cancelled.");
                return Ok(());
            }
            info!("Clearing query cache");
            let removed = cache.clear().await;
            println!("Done! Removed {removed} entries.");
        }
    }

    Ok(())
}
