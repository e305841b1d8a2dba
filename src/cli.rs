/*
 * This file is part of cmk-levels.
 *
 * Copyright (C) 2025 cmk-levels contributors
 *
 * cmk-levels is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * cmk-levels is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with cmk-levels. If not, see <https://www.gnu.org/licenses/>.
 */

//! Command Line Interface

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cmk_core::{
    format_plugin_output, worst_state, DeviceLevelsHandling, Levels, LevelsSpec, PLUGIN_NAMES,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{load_config, load_params_file, load_saved_config, SavedConfig};
use crate::logger;
use crate::runner::{run_check_persistent, run_discovery, run_evaluate, CheckRequest, EvaluateRequest};

#[derive(Parser, Debug)]
#[command(name = "cmk-check")]
#[command(version)]
#[command(about = "Run monitoring check plugins against agent output")]
#[command(long_about = "Run monitoring check plugins against agent output

Parses agent output, runs a check plugin for one item and prints the
plugin output. The exit code is the monitoring state: 0 OK, 1 WARN,
2 CRIT, 3 UNKNOWN.

EXAMPLES:
    cmk-check check sensor_temperature --host office --item Rack --agent-output out.txt
    agent_sensors office --org-id 42 | cmk-check discover sensor_temperature
    cmk-check evaluate 23 --levels 23,30 --policy usrdefault

ENVIRONMENT VARIABLES:
    CMK_CHECK_CONFIG       Path of the config file
    RUST_LOG=debug         Enable debug logging

FILES:
    ~/.config/cmk-check/config.json    Store directory, default params, corrections")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Append JSON events to the event log
    #[arg(long)]
    pub logging: bool,

    /// Event log location
    #[arg(long, requires = "logging")]
    pub log_file: Option<PathBuf>,

    /// Config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check one service
    Check(CheckArgs),

    /// List the services a plugin finds
    Discover(SourceArgs),

    /// Judge a single value against user and device levels
    Evaluate(EvaluateArgs),

    /// Validate params for a plugin
    ValidateParams {
        /// Plugin name
        plugin: String,
        /// JSON params file
        params: PathBuf,
    },

    /// List the built-in plugins
    Plugins,
}

#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Plugin name
    pub plugin: String,

    /// File with agent output; stdin when omitted or `-`
    #[arg(long)]
    pub agent_output: Option<PathBuf>,

    /// Read the sections of this piggyback host
    #[arg(long)]
    pub piggyback: Option<String>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Host the service belongs to
    #[arg(long)]
    pub host: String,

    /// Service item; omit for item-less plugins
    #[arg(long)]
    pub item: Option<String>,

    /// JSON params file, applied over the configured params
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Value store directory instead of the configured one
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Evaluate at this time (seconds since the epoch) instead of now
    #[arg(long)]
    pub now: Option<f64>,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// The reading
    #[arg(allow_negative_numbers = true)]
    pub value: f64,

    /// User upper levels as WARN,CRIT
    #[arg(long, value_parser = parse_levels)]
    pub levels: Option<Levels>,

    /// User lower levels as WARN,CRIT
    #[arg(long, value_parser = parse_levels)]
    pub levels_lower: Option<Levels>,

    /// Device upper levels as WARN,CRIT
    #[arg(long, value_parser = parse_levels)]
    pub device_levels: Option<Levels>,

    /// Device lower levels as WARN,CRIT
    #[arg(long, value_parser = parse_levels)]
    pub device_levels_lower: Option<Levels>,

    /// usrdefault, usr, dev, devdefault, worst or best
    #[arg(long, default_value = "usrdefault")]
    pub policy: DeviceLevelsHandling,

    #[arg(long, default_value = "Value")]
    pub label: String,

    /// Unit appended to rendered numbers
    #[arg(long, default_value = "")]
    pub unit: String,
}

/// Parse `WARN,CRIT` (or `WARN/CRIT`)
pub fn parse_levels(s: &str) -> Result<Levels, String> {
    let (warn, crit) = s
        .split_once(',')
        .or_else(|| s.split_once('/'))
        .ok_or_else(|| format!("expected WARN,CRIT, got '{}'", s))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid level '{}': {}", v.trim(), e))
    };
    Ok(Levels::new(parse(warn)?, parse(crit)?))
}

fn read_agent_output(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("reading agent output from {}", path.display())),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("reading agent output from stdin")?;
            Ok(text)
        }
    }
}

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn load_cli_config(cli: &Cli) -> anyhow::Result<SavedConfig> {
    let cfg = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_saved_config()?,
    };
    Ok(cfg)
}

/// Run the selected command; returns the process exit code
pub fn run_cli(cli: &Cli) -> anyhow::Result<u8> {
    let cfg = load_cli_config(cli)?;

    match &cli.command {
        Commands::Check(args) => {
            let registry = cfg.registry()?;
            let agent_output = read_agent_output(args.source.agent_output.as_deref())?;
            let overrides = match &args.params {
                Some(path) => load_params_file(path)?,
                None => Value::Null,
            };
            let params = cfg.params_for(&args.source.plugin, &overrides);
            let store_dir = args.store_dir.clone().unwrap_or_else(|| cfg.store_dir());
            debug!("Value stores in {}", store_dir.display());

            let request = CheckRequest {
                plugin: &args.source.plugin,
                host: &args.host,
                item: args.item.as_deref(),
                agent_output: &agent_output,
                params: &params,
                piggyback: args.source.piggyback.as_deref(),
            };
            let now = args.now.unwrap_or_else(now_seconds);
            let report = run_check_persistent(&registry, &store_dir, now, &request)?;

            logger::log_event(
                "check",
                json!({
                    "plugin": args.source.plugin,
                    "host": args.host,
                    "item": args.item,
                    "state": report.state,
                    "pending": report.pending,
                }),
            );
            println!("{}", report.output());
            Ok(report.exit_code())
        }
        Commands::Discover(args) => {
            let registry = cfg.registry()?;
            let agent_output = read_agent_output(args.agent_output.as_deref())?;
            let services = run_discovery(
                &registry,
                &args.plugin,
                &agent_output,
                args.piggyback.as_deref(),
            )?;
            logger::log_event(
                "discover",
                json!({"plugin": args.plugin, "services": services.len()}),
            );
            for service in &services {
                match &service.item {
                    Some(item) => println!("{}", item),
                    None => println!("({})", args.plugin),
                }
            }
            Ok(0)
        }
        Commands::Evaluate(args) => {
            let results = run_evaluate(&EvaluateRequest {
                value: args.value,
                user: LevelsSpec::new(args.levels, args.levels_lower),
                device: LevelsSpec::new(args.device_levels, args.device_levels_lower),
                policy: args.policy,
                label: args.label.clone(),
                unit: args.unit.clone(),
            })?;
            println!("{}", format_plugin_output(&results));
            Ok(worst_state(&results).code())
        }
        Commands::ValidateParams { plugin, params } => {
            let params = load_params_file(params)?;
            cfg.registry()?.validate_params(plugin, &params)?;
            println!("{}: params are valid", plugin);
            Ok(0)
        }
        Commands::Plugins => {
            for name in PLUGIN_NAMES {
                println!("{}", name);
            }
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!(parse_levels("23,30").unwrap(), Levels::new(23.0, 30.0));
        assert_eq!(parse_levels("1.5/-15").unwrap(), Levels::new(1.5, -15.0));
        assert_eq!(parse_levels(" 5 , 10 ").unwrap(), Levels::new(5.0, 10.0));
        assert!(parse_levels("23").is_err());
        assert!(parse_levels("a,b").is_err());
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from([
            "cmk-check",
            "evaluate",
            "-20",
            "--device-levels-lower",
            "1,-15",
            "--policy",
            "devdefault",
        ])
        .unwrap();
        match cli.command {
            Commands::Evaluate(args) => {
                assert_eq!(args.value, -20.0);
                assert_eq!(args.device_levels_lower, Some(Levels::new(1.0, -15.0)));
                assert_eq!(args.policy, DeviceLevelsHandling::PreferDevice);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from([
            "cmk-check",
            "check",
            "sensor_temperature",
            "--host",
            "office",
            "--item",
            "Rack",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Check(_)));

        assert!(Cli::try_parse_from(["cmk-check", "evaluate", "1", "--policy", "sometimes"]).is_err());
    }
}
