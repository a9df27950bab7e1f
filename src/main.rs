//! CLI Entry Point for pico_sync
//!
//! Provides command-line access to the reconciliation core without a browser:
//! - Replaying a recorded snapshot log through the poller and printing progress
//! - Listing the dashboard's field bindings
//! - Validating configuration
//!
//! # Usage
//!
//! ```bash
//! pico_sync replay session.jsonl --interval-ms 100
//! pico_sync replay session.jsonl --focus capture-folder-name --json
//! pico_sync bindings
//! pico_sync check-config --config config/pico_sync.toml
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use pico_sync::config::{DashboardConfig, DEFAULT_CONFIG_PATH};
use pico_sync::controller::{DashboardController, TickOutcome, UiEvent};
use pico_sync::fields::{default_bindings, FieldId, WriteRequest};
use pico_sync::logging;
use pico_sync::poller::{self, DashboardSink};
use pico_sync::replay::ReplaySource;
use pico_sync::SyncResult;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "pico_sync")]
#[command(about = "Digitizer dashboard state reconciliation", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines snapshot log and print progress per tick
    Replay {
        /// Path to the snapshot log
        log: PathBuf,

        /// Override the configured poll interval
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Fields to focus when the replay starts
        #[arg(long)]
        focus: Vec<String>,

        /// Print each tick as JSON instead of a status line
        #[arg(long)]
        json: bool,
    },

    /// List dashboard fields and their tree paths
    Bindings,

    /// Load and validate configuration, then print it
    CheckConfig,
}

struct StdoutSink {
    json: bool,
    config: DashboardConfig,
}

#[async_trait]
impl DashboardSink for StdoutSink {
    async fn render(&mut self, outcome: &TickOutcome) {
        if self.json {
            match serde_json::to_string(outcome) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to encode tick"),
            }
        } else {
            println!("{:<48} {}", outcome.progress.label, outcome.progress);
        }
    }

    async fn blurred(&mut self, fields: &[FieldId]) {
        for field in fields {
            tracing::info!(%field, "idle timeout, field blurred");
        }
    }

    async fn write(&mut self, request: WriteRequest) -> SyncResult<()> {
        println!("PUT {} {}", self.config.adapter_url(&request.path), request.body());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DashboardConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    logging::init_from_config(&config)?;

    match cli.command {
        Commands::Replay {
            log,
            interval_ms,
            focus,
            json,
        } => {
            let source = ReplaySource::from_file(&log)
                .with_context(|| format!("reading snapshot log {}", log.display()))?;
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.poll_interval());

            let mut controller = DashboardController::with_default_bindings(&config);
            let now = Instant::now();
            for field in focus {
                controller.on_event(UiEvent::Focus(FieldId::new(field)), now)?;
            }

            let sink = StdoutSink {
                json,
                config: config.clone(),
            };
            let handle = poller::spawn(controller, source, sink, interval);
            handle.join().await?;
        }
        Commands::Bindings => {
            for (field, path) in default_bindings() {
                println!("{field:<28} {path}");
            }
        }
        Commands::CheckConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
