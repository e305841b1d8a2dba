//! Check plugin contract
//!
//! A host calls `parse` with the raw string tables of the sections a plugin
//! subscribes to, then `discover` to find services, then `check` once per
//! service and cycle. [`PluginRegistry`] dispatches by plugin name for
//! callers that only know names and JSON params.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::data::correction::CorrectionTable;
use crate::data::entity_sensor::{EntitySensorDom, EntitySensorTemperature};
use crate::data::sensor_readings::{SensorHumidity, SensorTemperature};
use crate::error::{CheckmkError, Result};
use crate::results::{CheckResult, Service};
use crate::value_store::ValueStore;

/// Rows of one section, each row a list of columns
pub type StringTable = Vec<Vec<String>>;

/// Per-invocation state handed to check functions
pub struct CheckContext<'a> {
    pub value_store: &'a mut dyn ValueStore,
    /// Current time in seconds since the epoch
    pub now: f64,
}

impl<'a> CheckContext<'a> {
    /// Context at the current wall clock time
    pub fn new(value_store: &'a mut dyn ValueStore) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self { value_store, now }
    }

    /// Context at a fixed time
    pub fn at(value_store: &'a mut dyn ValueStore, now: f64) -> Self {
        Self { value_store, now }
    }
}

/// A parse/discover/check triple
pub trait CheckPlugin {
    type Section;
    type Params: DeserializeOwned + Default;

    fn name(&self) -> &'static str;

    /// Names of the sections passed to `parse`, in order
    fn sections(&self) -> &'static [&'static str];

    /// Build the section; malformed rows are dropped
    fn parse(&self, tables: &[StringTable]) -> Self::Section;

    fn discover(&self, section: &Self::Section) -> Vec<Service>;

    /// Evaluate one service; an unknown item yields no results
    fn check(
        &self,
        item: Option<&str>,
        params: &Self::Params,
        section: &Self::Section,
        ctx: &mut CheckContext<'_>,
    ) -> Result<Vec<CheckResult>>;

    fn validate_params(&self, _params: &Self::Params) -> Result<()> {
        Ok(())
    }
}

/// Names of all built-in plugins
pub const PLUGIN_NAMES: &[&str] = &[
    EntitySensorTemperature::NAME,
    EntitySensorDom::NAME,
    SensorTemperature::NAME,
    SensorHumidity::NAME,
];

/// Decode params for `plugin`; `null` means defaults
pub fn decode_params<P: CheckPlugin>(plugin: &P, params: &Value) -> Result<P::Params> {
    let decoded = if params.is_null() {
        P::Params::default()
    } else {
        serde_json::from_value(params.clone())
            .map_err(|e| CheckmkError::invalid_params(plugin.name(), e.to_string()))?
    };
    plugin.validate_params(&decoded)?;
    Ok(decoded)
}

fn check_with<P: CheckPlugin>(
    plugin: &P,
    tables: &[StringTable],
    item: Option<&str>,
    params: &Value,
    ctx: &mut CheckContext<'_>,
) -> Result<Vec<CheckResult>> {
    let params = decode_params(plugin, params)?;
    let section = plugin.parse(tables);
    let results = plugin.check(item, &params, &section, ctx)?;
    debug!(
        "{} produced {} results for item {:?}",
        plugin.name(),
        results.len(),
        item
    );
    Ok(results)
}

fn discover_with<P: CheckPlugin>(plugin: &P, tables: &[StringTable]) -> Vec<Service> {
    plugin.discover(&plugin.parse(tables))
}

fn unknown_plugin(name: &str) -> CheckmkError {
    CheckmkError::invalid_params(
        "plugin",
        format!("unknown plugin '{}', expected one of: {}", name, PLUGIN_NAMES.join(", ")),
    )
}

/// The built-in plugins, addressed by name
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    entity_temperature: EntitySensorTemperature,
    entity_dom: EntitySensorDom,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `corrections` instead of the built-in entity sensor defaults
    pub fn with_corrections(corrections: CorrectionTable) -> Self {
        Self {
            entity_temperature: EntitySensorTemperature::new(corrections.clone()),
            entity_dom: EntitySensorDom::new(corrections),
        }
    }

    /// Section names the plugin `name` consumes
    pub fn sections(&self, name: &str) -> Result<&'static [&'static str]> {
        match name {
            EntitySensorTemperature::NAME => Ok(self.entity_temperature.sections()),
            EntitySensorDom::NAME => Ok(self.entity_dom.sections()),
            SensorTemperature::NAME => Ok(SensorTemperature.sections()),
            SensorHumidity::NAME => Ok(SensorHumidity.sections()),
            other => Err(unknown_plugin(other)),
        }
    }

    /// Parse `tables` and check `item` with the plugin called `name`
    pub fn check(
        &self,
        name: &str,
        tables: &[StringTable],
        item: Option<&str>,
        params: &Value,
        ctx: &mut CheckContext<'_>,
    ) -> Result<Vec<CheckResult>> {
        match name {
            EntitySensorTemperature::NAME => {
                check_with(&self.entity_temperature, tables, item, params, ctx)
            }
            EntitySensorDom::NAME => check_with(&self.entity_dom, tables, item, params, ctx),
            SensorTemperature::NAME => check_with(&SensorTemperature, tables, item, params, ctx),
            SensorHumidity::NAME => check_with(&SensorHumidity, tables, item, params, ctx),
            other => Err(unknown_plugin(other)),
        }
    }

    /// Parse `tables` and discover services with the plugin called `name`
    pub fn discover(&self, name: &str, tables: &[StringTable]) -> Result<Vec<Service>> {
        match name {
            EntitySensorTemperature::NAME => Ok(discover_with(&self.entity_temperature, tables)),
            EntitySensorDom::NAME => Ok(discover_with(&self.entity_dom, tables)),
            SensorTemperature::NAME => Ok(discover_with(&SensorTemperature, tables)),
            SensorHumidity::NAME => Ok(discover_with(&SensorHumidity, tables)),
            other => Err(unknown_plugin(other)),
        }
    }

    /// Validate JSON params against the plugin called `name`
    pub fn validate_params(&self, name: &str, params: &Value) -> Result<()> {
        match name {
            EntitySensorTemperature::NAME => {
                decode_params(&self.entity_temperature, params).map(drop)
            }
            EntitySensorDom::NAME => decode_params(&self.entity_dom, params).map(drop),
            SensorTemperature::NAME => decode_params(&SensorTemperature, params).map(drop),
            SensorHumidity::NAME => decode_params(&SensorHumidity, params).map(drop),
            other => Err(unknown_plugin(other)),
        }
    }
}
