//! ==============================================================================
//! main.rs - sensor hub entry point
//! ==============================================================================
//!
//! purpose:
//!     wires the pieces of the hub together behind a small cli.
//!
//! commands:
//!     serve      ensure schema, serve http (ingest, api, dashboard), and run
//!                the generator in-process when `generator.enabled`
//!     generate   run only the synthetic producer (direct or push)
//!     dashboard  poll the log and print the latest values to the terminal
//!     window     print one query window as json and exit
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                     sensor-hub (this file)                   │
//!     │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//!     │  │ generator   │  │ web server  │  │ terminal dashboard  │  │
//!     │  │ (2s cycle)  │  │ (port 8080) │  │ (3s poll)           │  │
//!     │  └──────┬──────┘  └──────┬──────┘  └──────────┬──────────┘  │
//!     │         │ receive        │ receive / window   │ window      │
//!     │         ▼                ▼                    ▼             │
//!     │   IngestGateway ───> LogStore <─── QueryService             │
//!     └──────────────────────────┼──────────────────────────────────┘
//!                                ▼
//!                        sensores.db (sqlite)
//!
//! lifecycle:
//!     every long-running loop watches the same ctrl-c signal and finishes the
//!     write it is in before exiting.
//!
//! ==============================================================================

use sensor_hub::config::{GeneratorMode, HostConfig};
use sensor_hub::generator::{self, Generator, Sink};
use sensor_hub::ingest::IngestGateway;
use sensor_hub::query::QueryService;
use sensor_hub::server;
use sensor_hub::store::LogStore;
use sensor_hub::{dashboard, shutdown};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Sensor hub - ingest readings into a sqlite log and watch them live
#[derive(Debug, Parser)]
#[command(name = "sensor-hub")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to hub.toml (defaults to ./config/hub.toml or ../config/hub.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the ingestion server and dashboard
    Serve,

    /// Run the synthetic reading generator
    Generate,

    /// Poll the log and print the latest readings
    Dashboard,

    /// Print one query window as json
    Window {
        /// Rows per sensor
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // step 1: load configuration (before logging, it picks the level)
    let config_path = cli.config.clone().or_else(HostConfig::default_path);
    let config = match &config_path {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };

    // step 2: logging
    init_logging(&config.logging.level);
    match &config_path {
        Some(path) => tracing::info!("[CONFIG] Loaded from {}", path.display()),
        None => tracing::warn!("[CONFIG] No config file found - using defaults"),
    }
    config.print_summary();

    // step 3: storage handles
    let offset = config.display_offset()?;
    let store = LogStore::new(
        &config.storage.path,
        Duration::from_millis(config.storage.busy_timeout_ms),
    );
    let gateway = IngestGateway::new(store.clone(), config.ingest.strict_validation);
    let query = QueryService::new(store.clone(), config.over_fetch_factor(), offset);

    let result = match cli.command {
        Command::Serve => {
            server::run_hub(config, store, gateway, query, offset, shutdown::on_ctrl_c()).await
        }
        Command::Generate => generate(config, store, gateway).await,
        Command::Dashboard => {
            dashboard::run_terminal(query, config, offset, shutdown::on_ctrl_c()).await;
            Ok(())
        }
        Command::Window { limit } => {
            let window = query.window(limit);
            println!("{}", serde_json::to_string_pretty(&window)?);
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!("[ERROR] Fatal: {:#}", e);
    }
    result
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn generate(config: HostConfig, store: LogStore, gateway: IngestGateway) -> Result<()> {
    if config.generator.mode == GeneratorMode::Direct {
        store.ensure_schema()?;
        tracing::info!("[STARTUP] ✓ Database '{}' ready", store.path().display());
    } else {
        tracing::info!("[STARTUP] Pushing readings to {}", config.generator.hub_url);
    }

    generator::run(
        Generator::from_config(&config),
        Sink::from_config(&config.generator, gateway),
        Duration::from_secs(config.generator.interval_seconds.max(1)),
        config.logging.show_sensor_data,
        shutdown::on_ctrl_c(),
    )
    .await;
    Ok(())
}
