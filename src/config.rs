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

//! Configuration of the `cmk-check` command

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cmk_core::value_store::default_store_dir;
use cmk_core::{CheckmkError, CorrectionTable, PluginRegistry, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const CONFIG_ENV: &str = "CMK_CHECK_CONFIG";
const CONFIG_DIR: &str = "cmk-check";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SavedConfig {
    /// Directory of the per-service value stores
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    /// Correction table replacing the built-in entity sensor defaults
    #[serde(default)]
    pub corrections: Option<PathBuf>,
    /// Default params per plugin name; params given on the command line
    /// override them key by key
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl SavedConfig {
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(default_store_dir)
    }

    /// Plugin registry honoring the configured correction table
    pub fn registry(&self) -> Result<PluginRegistry> {
        match &self.corrections {
            Some(path) => Ok(PluginRegistry::with_corrections(CorrectionTable::load(path)?)),
            None => Ok(PluginRegistry::new()),
        }
    }

    /// Configured params of `plugin` with `overrides` applied on top
    pub fn params_for(&self, plugin: &str, overrides: &Value) -> Value {
        let base = self.params.get(plugin).cloned().unwrap_or(Value::Null);
        merge_params(base, overrides)
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join(CONFIG_DIR).join(CONFIG_FILE);
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home)
            .join(".config")
            .join(CONFIG_DIR)
            .join(CONFIG_FILE);
    }
    Path::new("/etc").join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Load and validate the config at `path`
pub fn load_config(path: &Path) -> Result<SavedConfig> {
    let data = fs::read_to_string(path).map_err(|e| CheckmkError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let cfg: SavedConfig = serde_json::from_str(&data)
        .map_err(|e| CheckmkError::config(format!("{}: {}", path.display(), e)))?;
    validate_saved_config(&cfg)?;
    debug!("Loaded config from {}", path.display());
    Ok(cfg)
}

/// Load the config at [`config_path`]; a missing file yields the defaults
pub fn load_saved_config() -> Result<SavedConfig> {
    let path = config_path();
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(SavedConfig::default());
    }
    load_config(&path)
}

pub fn validate_saved_config(cfg: &SavedConfig) -> Result<()> {
    if let Some(dir) = &cfg.store_dir {
        if dir.as_os_str().is_empty() {
            return Err(CheckmkError::config("store_dir must not be empty"));
        }
    }
    let registry = PluginRegistry::new();
    for (plugin, params) in &cfg.params {
        registry.validate_params(plugin, params)?;
    }
    Ok(())
}

/// Read a JSON params document
pub fn load_params_file(path: &Path) -> Result<Value> {
    let data = fs::read_to_string(path).map_err(|e| CheckmkError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&data)?)
}

/// Overlay the top-level keys of `overrides` onto `base`
///
/// A non-object override replaces the base entirely; `null` keeps it.
pub fn merge_params(base: Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (base, Value::Null) => base,
        (Value::Object(mut map), Value::Object(extra)) => {
            for (key, value) in extra {
                map.insert(key.clone(), value.clone());
            }
            Value::Object(map)
        }
        (_, other) => other.clone(),
    }
}
