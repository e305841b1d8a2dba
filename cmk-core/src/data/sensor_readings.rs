//! Sensor readings section
//!
//! JSON lines written by the `agent_sensors` special agent, one reading per
//! line. Each (device, metric) pair becomes one service; temperature and
//! humidity have their own plugins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::reconcile::{reconcile, DeviceLevelsHandling};
use crate::engine::temperature::{check_temperature, DeviceTemp, TempParams};
use crate::error::Result;
use crate::levels::{Levels, LevelsSpec};
use crate::plugin::{CheckContext, CheckPlugin, StringTable};
use crate::render::render_percent;
use crate::results::{CheckResult, Metric, Outcome, Service};
use crate::state::State;
use crate::units::TempUnit;

pub const SECTION_NAME: &str = "sensor_readings";
pub const METRIC_TEMPERATURE: &str = "temperature";
pub const METRIC_HUMIDITY: &str = "humidity";

/// One reading as emitted by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub serial: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    pub metric: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    /// ISO 8601 timestamp of the measurement
    #[serde(default)]
    pub ts: Option<String>,
}

impl SensorReading {
    /// Service item: the device name, or its serial if unnamed
    pub fn item(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.serial,
        }
    }
}

/// Readings keyed by metric, then by item
pub type SensorReadingsSection = BTreeMap<String, BTreeMap<String, SensorReading>>;

/// Parse agent lines; lines that are not a valid reading are skipped
///
/// When a device reports the same metric twice the newer timestamp wins.
/// Devices sharing a name are told apart by their serial: in serial order
/// the first keeps the name, later ones get `"<name> <serial>"`.
pub fn parse_sensor_readings(tables: &[StringTable]) -> SensorReadingsSection {
    let mut section = SensorReadingsSection::new();
    let Some(rows) = tables.first() else {
        return section;
    };

    // metric -> serial -> newest reading
    let mut latest: BTreeMap<String, BTreeMap<String, SensorReading>> = BTreeMap::new();
    for row in rows {
        let line = row.join(" ");
        let reading: SensorReading = match serde_json::from_str(line.trim()) {
            Ok(reading) => reading,
            Err(e) => {
                debug!("Skipping malformed sensor line: {}", e);
                continue;
            }
        };
        if !reading.value.is_finite() {
            continue;
        }

        let by_serial = latest.entry(reading.metric.clone()).or_default();
        let newer = match by_serial.get(&reading.serial) {
            Some(existing) => reading.ts >= existing.ts,
            None => true,
        };
        if newer {
            by_serial.insert(reading.serial.clone(), reading);
        }
    }

    for (metric, by_serial) in latest {
        let by_item = section.entry(metric).or_default();
        for (serial, reading) in by_serial {
            let name = reading.item();
            let item = if by_item.contains_key(name) {
                debug!("Sensor name '{}' is taken, using serial {}", name, serial);
                format!("{} {}", name, serial)
            } else {
                name.to_string()
            };
            by_item.insert(item, reading);
        }
    }
    section
}

fn discover_metric(section: &SensorReadingsSection, metric: &str) -> Vec<Service> {
    section
        .get(metric)
        .map(|readings| readings.keys().map(Service::new).collect())
        .unwrap_or_default()
}

fn lookup<'a>(
    section: &'a SensorReadingsSection,
    metric: &str,
    item: Option<&str>,
) -> Option<&'a SensorReading> {
    section.get(metric)?.get(item?)
}

/// Temperature services of agent sensors
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorTemperature;

impl SensorTemperature {
    pub const NAME: &'static str = "sensor_temperature";
}

impl CheckPlugin for SensorTemperature {
    type Section = SensorReadingsSection;
    type Params = TempParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn sections(&self) -> &'static [&'static str] {
        &[SECTION_NAME]
    }

    fn parse(&self, tables: &[StringTable]) -> Self::Section {
        parse_sensor_readings(tables)
    }

    fn discover(&self, section: &Self::Section) -> Vec<Service> {
        discover_metric(section, METRIC_TEMPERATURE)
    }

    fn check(
        &self,
        item: Option<&str>,
        params: &Self::Params,
        section: &Self::Section,
        ctx: &mut CheckContext<'_>,
    ) -> Result<Vec<CheckResult>> {
        let Some(reading) = lookup(section, METRIC_TEMPERATURE, item) else {
            return Ok(Vec::new());
        };

        let dev_unit = match reading.unit.as_deref() {
            None => TempUnit::Celsius,
            Some(unit) => match unit.parse::<TempUnit>() {
                Ok(unit) => unit,
                Err(e) => return Ok(vec![Outcome::summary(State::Unknown, e.to_string()).into()]),
            },
        };
        let device = DeviceTemp {
            dev_unit,
            ..DeviceTemp::default()
        };
        let unique_name = format!("sensor_{}", reading.serial);
        check_temperature(reading.value, params, Some(&unique_name), &device, ctx)
    }

    fn validate_params(&self, params: &Self::Params) -> Result<()> {
        params.validate()
    }
}

/// User parameters of the humidity check, in percent
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HumidityParams {
    pub levels: Option<Levels>,
    pub levels_lower: Option<Levels>,
}

/// Humidity services of agent sensors
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorHumidity;

impl SensorHumidity {
    pub const NAME: &'static str = "sensor_humidity";
}

impl CheckPlugin for SensorHumidity {
    type Section = SensorReadingsSection;
    type Params = HumidityParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn sections(&self) -> &'static [&'static str] {
        &[SECTION_NAME]
    }

    fn parse(&self, tables: &[StringTable]) -> Self::Section {
        parse_sensor_readings(tables)
    }

    fn discover(&self, section: &Self::Section) -> Vec<Service> {
        discover_metric(section, METRIC_HUMIDITY)
    }

    fn check(
        &self,
        item: Option<&str>,
        params: &Self::Params,
        section: &Self::Section,
        _ctx: &mut CheckContext<'_>,
    ) -> Result<Vec<CheckResult>> {
        let Some(reading) = lookup(section, METRIC_HUMIDITY, item) else {
            return Ok(Vec::new());
        };

        let rec = reconcile(
            reading.value,
            &LevelsSpec::new(params.levels, params.levels_lower),
            &LevelsSpec::none(),
            DeviceLevelsHandling::UserOnly,
            &render_percent,
            "Humidity",
        );
        Ok(vec![
            Outcome::summary(rec.state, rec.summary.clone()).into(),
            Metric::new(METRIC_HUMIDITY, reading.value)
                .with_levels(rec.metric_levels())
                .with_boundaries(Some((0.0, 100.0)))
                .into(),
        ])
    }

    fn validate_params(&self, params: &Self::Params) -> Result<()> {
        LevelsSpec::new(params.levels, params.levels_lower).validate("levels", "levels_lower")
    }
}
