//! Entity sensor section
//!
//! Sensors described by the entity-sensor MIB: one table of names, one of
//! typed and scaled values with an operational status, and one of
//! thresholds with a severity and a relation. Temperature sensors become
//! temperature services, dBm sensors become optical signal power (DOM)
//! services.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::entity_sensor::{
    SEVERITY_MAJOR, SEVERITY_MINOR, SEVERITY_OTHER, TYPE_CELSIUS, TYPE_DBM,
};
use crate::data::correction::{CorrectionTable, SensorScale};
use crate::engine::reconcile::{reconcile, DeviceLevelsHandling};
use crate::engine::temperature::{check_temperature, DeviceStatus, DeviceTemp, TempParams};
use crate::error::Result;
use crate::levels::{Levels, LevelsSpec};
use crate::plugin::{CheckContext, CheckPlugin, StringTable};
use crate::render::render_dbm;
use crate::results::{CheckResult, Metric, Outcome, Service};
use crate::state::State;
use crate::units::TempUnit;

/// Physical quantity of a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SensorType {
    Celsius,
    Dbm,
    Other(u8),
}

impl SensorType {
    pub fn from_code(code: u8) -> Self {
        match code {
            TYPE_CELSIUS => SensorType::Celsius,
            TYPE_DBM => SensorType::Dbm,
            other => SensorType::Other(other),
        }
    }
}

/// A parsed sensor with its device levels
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySensor {
    pub name: String,
    pub sensor_type: SensorType,
    pub reading: Option<f64>,
    pub status: DeviceStatus,
    pub levels_upper: Option<Levels>,
    pub levels_lower: Option<Levels>,
}

impl EntitySensor {
    pub fn device_levels(&self) -> LevelsSpec {
        LevelsSpec::new(self.levels_upper, self.levels_lower)
    }

    fn is_discoverable(&self) -> bool {
        self.status.state == State::Ok && self.reading.is_some()
    }
}

/// Sensors keyed by type, then by name
pub type EntitySensorSection = BTreeMap<SensorType, BTreeMap<String, EntitySensor>>;

fn sensor_status(code: &str) -> Option<DeviceStatus> {
    match code.trim() {
        "1" => Some(DeviceStatus::new(State::Ok, "OK")),
        "2" => Some(DeviceStatus::new(State::Unknown, "unavailable")),
        "3" => Some(DeviceStatus::new(State::Crit, "non-operational")),
        _ => None,
    }
}

/// `(severity, relation, value)` of one threshold row
type Threshold = (u8, u8, f64);

fn parse_thresholds(table: &[Vec<String>]) -> HashMap<String, Vec<Threshold>> {
    let mut thresholds: HashMap<String, Vec<Threshold>> = HashMap::new();
    for row in table {
        let [oid, severity, relation, value, ..] = row.as_slice() else {
            continue;
        };
        let Some((oid_end, _index)) = oid.rsplit_once('.') else {
            continue;
        };
        let (Ok(severity), Ok(relation), Ok(value)) = (
            severity.trim().parse::<u8>(),
            relation.trim().parse::<u8>(),
            value.trim().parse::<f64>(),
        ) else {
            continue;
        };
        thresholds
            .entry(oid_end.to_string())
            .or_default()
            .push((severity, relation, value));
    }
    thresholds
}

fn pair(warn: Option<f64>, crit: Option<f64>) -> Option<Levels> {
    match (warn, crit) {
        (Some(w), Some(c)) => Some(Levels::new(w, c)),
        (Some(x), None) | (None, Some(x)) => Some(Levels::new(x, x)),
        (None, None) => None,
    }
}

/// Turn raw thresholds into (upper, lower) levels
///
/// Minor is warn and major is crit; relations `<`/`<=` make lower levels,
/// `>`/`>=` upper ones. Thresholds of severity "other" are only used when
/// `sort_other` is set and nothing else is known: two values are upper
/// levels, four values are lower crit, lower warn, upper warn, upper crit.
fn device_levels(thresholds: &[Threshold], sort_other: bool) -> (Option<Levels>, Option<Levels>) {
    let (mut warn_upper, mut crit_upper, mut warn_lower, mut crit_lower) = (None, None, None, None);
    let mut other = Vec::new();

    for &(severity, relation, value) in thresholds {
        let upper = matches!(relation, 3 | 4);
        let lower = matches!(relation, 1 | 2);
        match severity {
            SEVERITY_MINOR if upper => warn_upper = Some(value),
            SEVERITY_MAJOR if upper => crit_upper = Some(value),
            SEVERITY_MINOR if lower => warn_lower = Some(value),
            SEVERITY_MAJOR if lower => crit_lower = Some(value),
            SEVERITY_OTHER => other.push(value),
            _ => {}
        }
    }

    let mut upper = pair(warn_upper, crit_upper);
    let mut lower = pair(warn_lower, crit_lower);

    if sort_other && upper.is_none() && lower.is_none() {
        other.sort_by(|a, b| a.total_cmp(b));
        match other.as_slice() {
            [warn, crit] => upper = Some(Levels::new(*warn, *crit)),
            [crit_low, warn_low, warn_up, crit_up] => {
                lower = Some(Levels::new(*warn_low, *crit_low));
                upper = Some(Levels::new(*warn_up, *crit_up));
            }
            _ => {}
        }
    }

    (
        upper.map(Levels::normalize_upper),
        lower.map(Levels::normalize_lower),
    )
}

/// Build the section from description, value and threshold tables
///
/// Rows with missing columns, unknown status codes or invalid scale codes are
/// dropped. Duplicate names get their index appended.
pub fn parse_entity_sensors(tables: &[StringTable], corrections: &CorrectionTable) -> EntitySensorSection {
    let empty = Vec::new();
    let descriptions = tables.first().unwrap_or(&empty);
    let values = tables.get(1).unwrap_or(&empty);
    let thresholds = parse_thresholds(tables.get(2).unwrap_or(&empty));

    let names: HashMap<&str, &str> = descriptions
        .iter()
        .filter_map(|row| match row.as_slice() {
            [oid_end, name, ..] if !name.trim().is_empty() => Some((oid_end.as_str(), name.trim())),
            _ => None,
        })
        .collect();

    let mut section = EntitySensorSection::new();
    for row in values {
        let [oid_end, type_code, scale, precision, value, status, ..] = row.as_slice() else {
            continue;
        };
        let Some(name) = names.get(oid_end.as_str()) else {
            continue;
        };
        let Ok(type_code) = type_code.trim().parse::<u8>() else {
            continue;
        };
        let (Ok(scale), Ok(precision)) = (scale.trim().parse::<i32>(), precision.trim().parse::<i32>()) else {
            continue;
        };
        let Some(scale) = SensorScale::new(scale, precision) else {
            debug!("Skipping sensor {} with scale {} precision {}", name, scale, precision);
            continue;
        };
        let Some(status) = sensor_status(status) else {
            continue;
        };

        let correct = |raw: f64| corrections.correct_value(name, scale.apply(raw));
        let reading = value.trim().parse::<f64>().ok().map(correct);

        let raw: Vec<Threshold> = thresholds
            .get(oid_end.as_str())
            .map(|ts| {
                ts.iter()
                    .map(|&(severity, relation, value)| (severity, relation, correct(value)))
                    .collect()
            })
            .unwrap_or_default();
        let (levels_upper, levels_lower) = device_levels(&raw, corrections.sorts_unclassified(name));

        let sensor_type = SensorType::from_code(type_code);
        let by_name = section.entry(sensor_type).or_default();
        let key = if by_name.contains_key(*name) {
            format!("{} {}", name, oid_end)
        } else {
            name.to_string()
        };
        by_name.insert(
            key.clone(),
            EntitySensor {
                name: key,
                sensor_type,
                reading,
                status,
                levels_upper,
                levels_lower,
            },
        );
    }
    section
}

fn discover_type(section: &EntitySensorSection, sensor_type: SensorType) -> Vec<Service> {
    section
        .get(&sensor_type)
        .map(|sensors| {
            sensors
                .values()
                .filter(|s| s.is_discoverable())
                .map(|s| Service::new(s.name.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn lookup<'a>(
    section: &'a EntitySensorSection,
    sensor_type: SensorType,
    item: Option<&str>,
) -> Option<&'a EntitySensor> {
    section.get(&sensor_type)?.get(item?)
}

fn status_result(sensor: &EntitySensor) -> Option<CheckResult> {
    if sensor.status.state == State::Ok {
        return None;
    }
    Some(Outcome::summary(sensor.status.state, format!("Status: {}", sensor.status.name)).into())
}

/// Temperature services of entity sensors
#[derive(Debug, Clone)]
pub struct EntitySensorTemperature {
    corrections: CorrectionTable,
}

impl EntitySensorTemperature {
    pub const NAME: &'static str = "entity_sensor_temperature";

    pub fn new(corrections: CorrectionTable) -> Self {
        Self { corrections }
    }
}

impl Default for EntitySensorTemperature {
    fn default() -> Self {
        Self::new(CorrectionTable::entity_sensor_defaults())
    }
}

/// Sections consumed by both entity sensor plugins
pub const ENTITY_SENSOR_SECTIONS: &[&str] = &[
    "entity_sensor_descr",
    "entity_sensor_values",
    "entity_sensor_thresholds",
];

impl CheckPlugin for EntitySensorTemperature {
    type Section = EntitySensorSection;
    type Params = TempParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn sections(&self) -> &'static [&'static str] {
        ENTITY_SENSOR_SECTIONS
    }

    fn parse(&self, tables: &[StringTable]) -> Self::Section {
        parse_entity_sensors(tables, &self.corrections)
    }

    fn discover(&self, section: &Self::Section) -> Vec<Service> {
        discover_type(section, SensorType::Celsius)
    }

    fn check(
        &self,
        item: Option<&str>,
        params: &Self::Params,
        section: &Self::Section,
        ctx: &mut CheckContext<'_>,
    ) -> Result<Vec<CheckResult>> {
        let Some(sensor) = lookup(section, SensorType::Celsius, item) else {
            return Ok(Vec::new());
        };
        if let Some(status) = status_result(sensor) {
            return Ok(vec![status]);
        }
        let Some(reading) = sensor.reading else {
            return Ok(Vec::new());
        };

        let device = DeviceTemp {
            dev_unit: TempUnit::Celsius,
            dev_levels: sensor.levels_upper,
            dev_levels_lower: sensor.levels_lower,
            dev_status: Some(sensor.status.clone()),
        };
        let unique_name = format!("entity_sensor_{}", sensor.name);
        check_temperature(reading, params, Some(&unique_name), &device, ctx)
    }

    fn validate_params(&self, params: &Self::Params) -> Result<()> {
        params.validate()
    }
}

/// User parameters of the signal power check
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DomParams {
    /// Upper levels in dBm
    pub levels_upper: Option<Levels>,
    /// Lower levels in dBm
    pub levels_lower: Option<Levels>,
    pub device_levels_handling: DeviceLevelsHandling,
}

impl DomParams {
    pub fn validate(&self) -> Result<()> {
        LevelsSpec::new(self.levels_upper, self.levels_lower).validate("levels_upper", "levels_lower")
    }
}

fn dom_metric_name(sensor_name: &str) -> &'static str {
    let lowered = sensor_name.to_ascii_lowercase();
    if lowered.contains("receive") {
        "input_signal_power_dbm"
    } else if lowered.contains("transmit") {
        "output_signal_power_dbm"
    } else {
        "signal_power_dbm"
    }
}

/// Optical signal power (DOM) services of entity sensors
#[derive(Debug, Clone)]
pub struct EntitySensorDom {
    corrections: CorrectionTable,
}

impl EntitySensorDom {
    pub const NAME: &'static str = "entity_sensor_dom";

    pub fn new(corrections: CorrectionTable) -> Self {
        Self { corrections }
    }
}

impl Default for EntitySensorDom {
    fn default() -> Self {
        Self::new(CorrectionTable::entity_sensor_defaults())
    }
}

impl CheckPlugin for EntitySensorDom {
    type Section = EntitySensorSection;
    type Params = DomParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn sections(&self) -> &'static [&'static str] {
        ENTITY_SENSOR_SECTIONS
    }

    fn parse(&self, tables: &[StringTable]) -> Self::Section {
        parse_entity_sensors(tables, &self.corrections)
    }

    fn discover(&self, section: &Self::Section) -> Vec<Service> {
        discover_type(section, SensorType::Dbm)
    }

    fn check(
        &self,
        item: Option<&str>,
        params: &Self::Params,
        section: &Self::Section,
        _ctx: &mut CheckContext<'_>,
    ) -> Result<Vec<CheckResult>> {
        let Some(sensor) = lookup(section, SensorType::Dbm, item) else {
            return Ok(Vec::new());
        };
        if let Some(status) = status_result(sensor) {
            return Ok(vec![status]);
        }
        let Some(reading) = sensor.reading else {
            return Ok(Vec::new());
        };

        let rec = reconcile(
            reading,
            &LevelsSpec::new(params.levels_upper, params.levels_lower),
            &sensor.device_levels(),
            params.device_levels_handling,
            &render_dbm,
            "Signal power",
        );
        Ok(vec![
            Outcome::summary(State::Ok, "Status: OK").into(),
            Outcome::summary(rec.state, rec.summary.clone()).into(),
            Metric::new(dom_metric_name(&sensor.name), reading)
                .with_levels(rec.metric_levels())
                .into(),
        ])
    }

    fn validate_params(&self, params: &Self::Params) -> Result<()> {
        params.validate()
    }
}
