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

//! Running plugins against agent output
//!
//! Glue between the agent protocol parser, the plugin registry and the
//! persisted value stores.

use std::path::Path;

use cmk_core::{
    format_plugin_output, reconcile, worst_state, CheckContext, CheckResult, CheckmkError,
    DeviceLevelsHandling, JsonFileValueStore, LevelsSpec, Metric, Outcome, PluginRegistry, Result,
    Service, State, StringTable, ValueStore,
};
use cmk_protocol::{parse_agent_output, sanitize_piggyback_host, section_tables};
use serde_json::Value;
use tracing::{debug, info};

/// Summary of a check whose item is absent from the agent output
pub const ITEM_NOT_FOUND: &str = "Item not found in monitoring data";

/// One check invocation
#[derive(Debug, Clone, Copy)]
pub struct CheckRequest<'a> {
    pub plugin: &'a str,
    pub host: &'a str,
    pub item: Option<&'a str>,
    pub agent_output: &'a str,
    pub params: &'a Value,
    /// Read the sections of this piggyback host instead of the source host
    pub piggyback: Option<&'a str>,
}

impl CheckRequest<'_> {
    /// Service description used to scope the value store
    pub fn service_name(&self) -> String {
        match self.item {
            Some(item) => format!("{} {}", self.plugin, item),
            None => self.plugin.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub state: State,
    pub results: Vec<CheckResult>,
    /// Set when the check asked to ignore this cycle, e.g. while counters
    /// initialize
    pub pending: Option<String>,
}

impl CheckReport {
    pub fn output(&self) -> String {
        match &self.pending {
            Some(reason) => format!("PENDING - {}", reason),
            None => format_plugin_output(&self.results),
        }
    }

    /// Process exit code: the state code; pending checks exit 0
    pub fn exit_code(&self) -> u8 {
        self.state.code()
    }
}

/// String tables of the sections `plugin` consumes
///
/// `piggyback` is matched the way the agent writes host names, so
/// `Server Room` finds the block `<<<<Server_Room>>>>`.
pub fn tables_for(
    registry: &PluginRegistry,
    plugin: &str,
    agent_output: &str,
    piggyback: Option<&str>,
) -> Result<Vec<StringTable>> {
    let names = registry.sections(plugin)?;
    let piggyback = piggyback.map(sanitize_piggyback_host).transpose()?;
    let sections = parse_agent_output(agent_output);
    debug!("Agent output has {} sections", sections.len());
    Ok(section_tables(&sections, names, piggyback.as_deref()))
}

/// Run one check with the given value store
pub fn run_check(
    registry: &PluginRegistry,
    store: &mut dyn ValueStore,
    now: f64,
    request: &CheckRequest<'_>,
) -> Result<CheckReport> {
    let tables = tables_for(registry, request.plugin, request.agent_output, request.piggyback)?;
    let mut ctx = CheckContext::at(store, now);

    match registry.check(request.plugin, &tables, request.item, request.params, &mut ctx) {
        Ok(results) if results.is_empty() => Ok(CheckReport {
            state: State::Unknown,
            results: vec![Outcome::summary(State::Unknown, ITEM_NOT_FOUND).into()],
            pending: None,
        }),
        Ok(results) => Ok(CheckReport {
            state: worst_state(&results),
            results,
            pending: None,
        }),
        Err(e) if e.is_ignorable() => {
            info!("{}: {}", request.service_name(), e);
            Ok(CheckReport {
                state: State::Ok,
                results: Vec::new(),
                pending: Some(e.to_string()),
            })
        }
        Err(e) => Err(e),
    }
}

/// Run one check with the service's value store below `store_dir`
///
/// The store is written back only when the check changed it.
pub fn run_check_persistent(
    registry: &PluginRegistry,
    store_dir: &Path,
    now: f64,
    request: &CheckRequest<'_>,
) -> Result<CheckReport> {
    let mut store =
        JsonFileValueStore::for_service(store_dir, request.host, &request.service_name())?;
    let report = run_check(registry, &mut store, now, request)?;
    if store.is_dirty() {
        store.save()?;
    }
    Ok(report)
}

/// Services `plugin` finds in the agent output
pub fn run_discovery(
    registry: &PluginRegistry,
    plugin: &str,
    agent_output: &str,
    piggyback: Option<&str>,
) -> Result<Vec<Service>> {
    let tables = tables_for(registry, plugin, agent_output, piggyback)?;
    registry.discover(plugin, &tables)
}

/// A bare reading judged against user and device levels
#[derive(Debug, Clone)]
pub struct EvaluateRequest {
    pub value: f64,
    pub user: LevelsSpec,
    pub device: LevelsSpec,
    pub policy: DeviceLevelsHandling,
    pub label: String,
    pub unit: String,
}

pub fn run_evaluate(request: &EvaluateRequest) -> Result<Vec<CheckResult>> {
    if !request.value.is_finite() {
        return Err(CheckmkError::invalid_params("value", "must be a finite number"));
    }
    request.user.validate("levels", "levels_lower")?;

    let unit = request.unit.clone();
    let render = move |v: f64| {
        if unit.is_empty() {
            format!("{:.2}", v)
        } else {
            format!("{:.2} {}", v, unit)
        }
    };
    let rec = reconcile(
        request.value,
        &request.user,
        &request.device,
        request.policy,
        &render,
        &request.label,
    );
    Ok(vec![
        Outcome::summary(rec.state, rec.summary.clone()).into(),
        Metric::new("value", request.value)
            .with_levels(rec.metric_levels())
            .into(),
        Outcome::notice(State::Ok, format!("Configuration: {}", rec.explanation)).into(),
    ])
}
