//! patchmon agent
//!
//! Collects the host's package inventory (installed packages and pending
//! upgrades) and prints it as a report

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use eyre::{WrapErr, eyre};
use patchmon_exec::{Executor, LocalExecutor};
use patchmon_pkg::PackageInventory;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod report;

use config::{AgentConfig, Config, LogFormat};
use report::PackageReport;

/// patchmon package inventory agent
#[derive(Parser, Debug)]
#[command(name = "patchmon-agent", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect and print installed packages and available upgrades
    Packages {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Only list packages with an upgrade available
        #[arg(long)]
        only_updates: bool,
    },
    /// Show the package sources that would be collected
    Sources,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();

    let config_path = Config::locate(cli.config.as_deref());
    let mut config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(level) = cli.log_level {
        config.agent.log_level = level;
        config.validate()?;
    }

    init_tracing(&config.agent)?;

    match &config_path {
        Some(path) => debug!(path = %path.display(), "loaded configuration"),
        None => warn!("no config file found, using defaults"),
    }

    match cli.command {
        Commands::Packages { json, only_updates } => {
            let report = collect(&config).await?;
            let report = if only_updates {
                report.only_updates()
            } else {
                report
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.to_table());
            }
        }
        Commands::Sources => {
            let inventory = build_inventory(&config)?;
            for source in inventory.sources() {
                println!("{}\t{}", source.kind(), source.tool());
            }
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// Install the global subscriber; `RUST_LOG` overrides the configured level
fn init_tracing(agent: &AgentConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&agent.log_level)
            .wrap_err_with(|| format!("invalid log level '{}'", agent.log_level))?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    match agent.log_format {
        LogFormat::Text => registry.with(fmt_layer).init(),
        LogFormat::Json => registry.with(fmt_layer.json()).init(),
    }

    Ok(())
}

fn build_inventory(config: &Config) -> Result<PackageInventory> {
    let executor: Arc<dyn Executor> = Arc::new(LocalExecutor::new());
    let options = config.inventory_options()?;

    PackageInventory::detect(executor, &options).wrap_err("failed to set up package sources")
}

/// Run one collection, bounded by the configured timeout
async fn collect(config: &Config) -> Result<PackageReport> {
    let inventory = build_inventory(config)?;
    let collection = inventory.get_packages();

    let packages = match config.collection_timeout() {
        Some(limit) => tokio::time::timeout(limit, collection)
            .await
            .map_err(|_| eyre!("package collection timed out after {}s", limit.as_secs()))?,
        None => collection.await,
    }
    .wrap_err("failed to collect packages")?;

    Ok(PackageReport::new(packages, chrono::Utc::now()))
}
