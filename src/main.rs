//! CLI entry point for trace_daq
//!
//! # Usage
//!
//! Poll the controller until Ctrl+C or SIGTERM:
//! ```bash
//! trace_daq run --config trace_daq.toml
//! ```
//!
//! Inspect a raw block dump:
//! ```bash
//! trace_daq decode db90.bin --json
//! ```
//!
//! Check which image directory a given instant would match:
//! ```bash
//! trace_daq correlate --root ftp_incoming --at "2026-02-10 11:06:39.123400"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use trace_daq::config::{TraceConfig, DEFAULT_CONFIG_FILE};
use trace_daq::correlation::MatchPolicy;
use trace_daq::data::ledger::format_timestamp;
use trace_daq::hardware::S7TransportBuilder;
use trace_daq::logging::{self, OutputFormat, TracingConfig};
use trace_daq::measurement::decode_slice;
use trace_daq::scheduler::{PollScheduler, ShutdownFlag};

#[derive(Parser)]
#[command(name = "trace_daq")]
#[command(about = "Controller telemetry acquisition with image correlation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the controller and record every new unit
    Run {
        /// Configuration file, created with defaults if missing
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },

    /// Decode a raw data block dump
    Decode {
        /// File holding exactly one block
        file: PathBuf,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one correlation against an image root
    Correlate {
        /// Directory the image listener writes into
        #[arg(long)]
        root: PathBuf,

        /// Target instant, e.g. "2026-02-10 11:06:39.123400"
        #[arg(long)]
        at: String,

        #[arg(long, default_value = "nearest")]
        policy: MatchPolicy,

        /// Reject nearest matches further away than this many seconds
        #[arg(long)]
        max_delta: Option<f64>,
    },

    /// Write the default configuration file
    InitConfig {
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::Decode { file, json } => {
            init_cli_logging()?;
            decode(&file, json)
        }
        Commands::Correlate {
            root,
            at,
            policy,
            max_delta,
        } => {
            init_cli_logging()?;
            correlate(&root, &at, policy, max_delta)
        }
        Commands::InitConfig { path } => init_config(&path),
    }
}

fn init_cli_logging() -> Result<()> {
    logging::init(
        TracingConfig::new(Level::WARN)
            .with_format(OutputFormat::Compact)
            .with_ansi(false),
    )
    .map_err(anyhow::Error::msg)
}

async fn run(config_path: &Path) -> Result<()> {
    let created = TraceConfig::write_default(config_path)
        .with_context(|| format!("Failed to create {}", config_path.display()))?;
    let config = TraceConfig::load_from(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    config.validate()?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    if created {
        info!(path = %config_path.display(), "Created default configuration file");
    }

    if !config.storage.base_dir.is_dir() {
        bail!(
            "Output directory {} does not exist",
            config.storage.base_dir.display()
        );
    }
    if !config.images.source_dir.is_dir() {
        bail!(
            "Image source directory {} does not exist",
            config.images.source_dir.display()
        );
    }

    let controller = &config.controller;
    let transport = S7TransportBuilder::new(controller.address.clone())
        .with_port(controller.port)
        .with_rack_slot(controller.rack, controller.slot)
        .with_timeout(controller.timeout())
        .connect()
        .await
        .with_context(|| format!("Cannot connect to controller at {}", controller.address))?;

    let shutdown = ShutdownFlag::new();
    shutdown
        .trigger_on_signals()
        .context("Cannot install shutdown signal handlers")?;

    let mut scheduler = PollScheduler::from_config(Box::new(transport), &config);
    scheduler.run(&shutdown).await;
    Ok(())
}

fn decode(file: &Path, json: bool) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let record = decode_slice(&bytes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("id:           {}", record.id);
    println!("presence:     {}", record.presence);
    println!("result_total: {}", record.result_total);
    println!("identifier:   {:?}", record.identifier);
    for (index, position) in record.positions.iter().enumerate() {
        let timestamp = format_timestamp(position.timestamp);
        println!(
            "pos{}:         result={} timestamp={}",
            index + 1,
            position.result,
            if timestamp.is_empty() { "-" } else { &timestamp }
        );
    }
    println!("measurements: {:?}", record.measurements);
    Ok(())
}

fn parse_instant(raw: &str) -> Result<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .with_context(|| format!("Cannot parse '{raw}', expected YYYY-MM-DD HH:MM:SS[.ffffff]"))
}

fn correlate(root: &Path, at: &str, policy: MatchPolicy, max_delta: Option<f64>) -> Result<()> {
    let target = parse_instant(at)?;
    let result = policy.correlator(max_delta).find_match(target, root)?;

    match (&result.path, result.delta_secs) {
        (Some(path), Some(delta)) => println!("{} (delta {delta:.6} s)", path.display()),
        (Some(path), None) => println!("{}", path.display()),
        (None, _) => println!("no match"),
    }
    println!(
        "policy={} scanned={} parsed={}",
        result.policy, result.scanned, result.parsed
    );
    Ok(())
}

fn init_config(path: &Path) -> Result<()> {
    if TraceConfig::write_default(path)? {
        println!("Wrote {}", path.display());
    } else {
        println!("{} already exists, left unchanged", path.display());
    }
    Ok(())
}
