//! Sensor special agent (agent_sensors)
//!
//! Queries a sensor cloud API for one organization and prints the
//! `sensor_devices` and `sensor_readings` sections on stdout.
//!
//! # Failure Handling
//! - Devices whose readings cannot be decoded are logged and skipped
//! - Any other failure is logged and ends the process with exit code 1
//! - `--debug` additionally prints the full error chain

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use cmk_agent::{write_sections, HttpPageSource, PageLimits, SensorApi};
use tracing::{debug, error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "agent_sensors")]
#[command(version)]
#[command(about = "Special agent for cloud managed environmental sensors")]
#[command(long_about = "Special agent for cloud managed environmental sensors

Fetches the devices and the latest readings of one organization and writes
them as Checkmk agent sections. With --piggyback every device is written as
its own piggyback host.

ENVIRONMENT VARIABLES:
    RUST_LOG=debug         Override the log filter")]
struct Args {
    /// Name of the host the agent runs for
    hostname: String,

    /// Base URL of the API
    #[arg(long, default_value = "https://api.meraki.com/api/v1")]
    api_url: String,

    /// API key sent as bearer token
    #[arg(long, env = "SENSOR_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Organization to query
    #[arg(long)]
    org_id: String,

    /// Items requested per page
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..=1000))]
    page_size: u64,

    /// Stop paginating after this many pages
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    max_pages: u64,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 20)]
    timeout: u64,

    /// Write each device as a piggyback host
    #[arg(long)]
    piggyback: bool,

    /// Do not verify TLS certificates
    #[arg(long)]
    no_cert_check: bool,

    /// Print the full error chain on failure
    #[arg(long)]
    debug: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging(args: &Args) {
    let default_level = if args.verbose || args.debug { "debug" } else { "warn" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());

    // stdout carries the agent output
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(io::stderr)
        .with_env_filter(&filter)
        .init();
}

// ============================================================================
// Agent
// ============================================================================

fn run(args: &Args) -> anyhow::Result<()> {
    let limits = PageLimits::new(args.page_size as usize, args.max_pages as usize)?;
    let source = HttpPageSource::new(
        &args.api_url,
        &args.api_key,
        Duration::from_secs(args.timeout),
        !args.no_cert_check,
    )?;
    let api = SensorApi::new(source, &args.org_id, limits);

    let devices = api
        .devices()
        .with_context(|| format!("fetching devices of organization {}", args.org_id))?;
    let readings = api
        .latest_readings()
        .with_context(|| format!("fetching readings of organization {}", args.org_id))?;
    info!(
        "{}: {} devices, {} devices with readings",
        args.hostname,
        devices.len(),
        readings.len()
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_sections(&mut out, &devices, &readings, args.piggyback)
        .context("writing agent sections")?;
    out.flush().context("flushing agent output")?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);
    debug!("agent_sensors {} for host {}", VERSION, args.hostname);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            if args.debug {
                eprintln!("Error: {:?}", e);
            }
            ExitCode::FAILURE
        }
    }
}
