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

//! Optional JSON event log, one object per line

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use serde_json::{json, Value};

const DEFAULT_LOG_PATH: &str = "/var/log/cmk-check/events.json";
const FALLBACK_LOG_NAME: &str = "cmk_check_events.json";

lazy_static! {
    static ref LOG_FILE: Mutex<Option<File>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn fallback_path() -> PathBuf {
    std::env::temp_dir().join(FALLBACK_LOG_NAME)
}

fn open_append(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Start logging events to `path`, or to the default location
///
/// Falls back to the temp dir when the file cannot be opened. Returns the
/// path in use, or `None` if no log file could be opened at all.
pub fn init_logging(path: Option<&Path>) -> Option<PathBuf> {
    let wanted = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH));

    let (file, used) = match open_append(&wanted) {
        Some(f) => (f, wanted),
        None => {
            let fallback = fallback_path();
            (open_append(&fallback)?, fallback)
        }
    };
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }
    Some(used)
}

pub fn is_enabled() -> bool {
    LOG_FILE.lock().map(|g| g.is_some()).unwrap_or(false)
}

/// Append one event; a no-op until [`init_logging`] succeeded
pub fn log_event(event: &str, data: Value) {
    let line = json!({
        "ts_ms": now_millis(),
        "event": event,
        "data": data,
    })
    .to_string();

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(f) = guard.as_mut() {
            let _ = writeln!(f, "{}", line);
        }
    }
}
