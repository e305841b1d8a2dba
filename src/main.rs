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

use std::process::ExitCode;

use clap::Parser;
use serde_json::json;
use tracing::error;

use cmk_check::cli::{run_cli, Cli};
use cmk_check::logger;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| if cli.verbose { "debug" } else { "warn" }.to_string());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(&filter)
        .init();

    // Optional event log
    if cli.logging {
        if logger::init_logging(cli.log_file.as_deref()).is_none() {
            eprintln!("Warning: could not open an event log file");
        }
        logger::log_event("startup", json!({ "args": std::env::args().collect::<Vec<_>>() }));
    }

    match run_cli(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{:#}", err);
            logger::log_event("fatal_error", json!({ "error": err.to_string() }));
            // Same as UNKNOWN
            ExitCode::from(3)
        }
    }
}
