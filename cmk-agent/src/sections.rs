//! Agent output of the sensor special agent
//!
//! Two `sep(0)` sections carry one JSON object per line:
//! `sensor_devices` with the device inventory and `sensor_readings` with
//! one flat record per (device, metric).

use std::collections::HashMap;
use std::io::Write;

use cmk_error::Result;
use cmk_protocol::{PiggybackWriter, SectionHeader, SectionWriter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{Device, DeviceReadings, RawReading};

pub const DEVICES_SECTION: &str = "sensor_devices";
pub const READINGS_SECTION: &str = "sensor_readings";

/// One line of the readings section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingLine {
    pub serial: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub metric: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

// Field holding the value inside the metric object, and the unit it is in
fn value_field(metric: &str) -> Option<(&'static str, &'static str)> {
    match metric {
        "temperature" => Some(("celsius", "celsius")),
        "humidity" => Some(("relativePercentage", "percent")),
        "tvoc" => Some(("concentration", "ppb")),
        "pm25" => Some(("concentration", "ug/m3")),
        "noise" => Some(("ambient", "dBA")),
        "battery" => Some(("percentage", "percent")),
        _ => None,
    }
}

// `None` for metrics without a numeric value, e.g. door open/closed
fn reading_value(reading: &RawReading) -> Option<(f64, Option<&'static str>)> {
    let object = reading.fields.get(&reading.metric);
    let (value, unit) = match (object, value_field(&reading.metric)) {
        (Some(Value::Object(map)), Some((field, unit))) => {
            let value = match map.get(field) {
                // Noise nests one level deeper: {"ambient": {"level": 42}}
                Some(Value::Object(inner)) => inner.get("level").and_then(Value::as_f64),
                Some(other) => other.as_f64(),
                None => None,
            };
            (value, Some(unit))
        }
        (Some(Value::Object(map)), None) => {
            (map.values().find_map(Value::as_f64), None)
        }
        (Some(other), _) => (other.as_f64(), None),
        (None, _) => (None, None),
    };
    value.filter(|v| v.is_finite()).map(|v| (v, unit))
}

/// Flatten the readings of one device
///
/// Readings without a usable numeric value are logged and left out.
pub fn flatten_readings(readings: &DeviceReadings, device: Option<&Device>) -> Vec<ReadingLine> {
    let name = device.and_then(|d| d.name.clone());
    let network = readings
        .network
        .as_ref()
        .map(|n| n.name.clone().unwrap_or_else(|| n.id.clone()))
        .or_else(|| device.and_then(|d| d.network_id.clone()));

    readings
        .readings
        .iter()
        .filter_map(|reading| {
            let Some((value, unit)) = reading_value(reading) else {
                debug!(
                    "{}: no numeric value for metric '{}', skipping",
                    readings.serial, reading.metric
                );
                return None;
            };
            Some(ReadingLine {
                serial: readings.serial.clone(),
                name: name.clone(),
                network: network.clone(),
                metric: reading.metric.clone(),
                value,
                unit: unit.map(str::to_string),
                ts: reading.ts.clone(),
            })
        })
        .collect()
}

/// Readings per serial
pub fn collect_lines(
    devices: &[Device],
    readings: &[DeviceReadings],
) -> HashMap<String, Vec<ReadingLine>> {
    let by_serial: HashMap<&str, &Device> =
        devices.iter().map(|d| (d.serial.as_str(), d)).collect();

    let mut lines = HashMap::new();
    for device_readings in readings {
        let device = by_serial.get(device_readings.serial.as_str()).copied();
        let flat = flatten_readings(device_readings, device);
        if flat.len() < device_readings.readings.len() {
            warn!(
                "{}: {} of {} readings have no numeric value",
                device_readings.serial,
                device_readings.readings.len() - flat.len(),
                device_readings.readings.len()
            );
        }
        debug!("{}: {} readings", device_readings.serial, flat.len());
        lines.insert(device_readings.serial.clone(), flat);
    }
    lines
}

fn write_device_sections<W: Write>(
    out: W,
    devices: &[&Device],
    lines: &[&ReadingLine],
) -> Result<W> {
    let mut section = SectionWriter::new(out, SectionHeader::json_lines(DEVICES_SECTION)?)?;
    for device in devices {
        section.append_json(device)?;
    }
    let mut section =
        SectionWriter::new(section.into_inner(), SectionHeader::json_lines(READINGS_SECTION)?)?;
    for line in lines {
        section.append_json(line)?;
    }
    Ok(section.into_inner())
}

/// Write the agent output for `devices`
///
/// With `piggyback` every device gets its own block named after the device;
/// otherwise all devices land in the sections of the queried host. Devices
/// are written in the order given; readings of unknown serials go to the
/// queried host.
pub fn write_sections<W: Write>(
    out: &mut W,
    devices: &[Device],
    readings: &[DeviceReadings],
    piggyback: bool,
) -> Result<()> {
    let lines = collect_lines(devices, readings);

    if !piggyback {
        let all_devices: Vec<&Device> = devices.iter().collect();
        let mut all_lines: Vec<&ReadingLine> = Vec::new();
        for device_readings in readings {
            if let Some(flat) = lines.get(&device_readings.serial) {
                all_lines.extend(flat);
            }
        }
        write_device_sections(out, &all_devices, &all_lines)?;
        return Ok(());
    }

    for device in devices {
        let device_lines: Vec<&ReadingLine> = lines
            .get(&device.serial)
            .map(|flat| flat.iter().collect())
            .unwrap_or_default();
        let mut block = match PiggybackWriter::new(&mut *out, device.host_name()) {
            Ok(block) => block,
            Err(e) => {
                warn!("Skipping device {}: {}", device.serial, e);
                continue;
            }
        };
        write_device_sections(&mut block, &[device], &device_lines)?;
        block.finish()?;
    }

    let orphans: Vec<&ReadingLine> = readings
        .iter()
        .filter(|r| !devices.iter().any(|d| d.serial == r.serial))
        .filter_map(|r| lines.get(&r.serial))
        .flatten()
        .collect();
    if !orphans.is_empty() {
        write_device_sections(out, &[], &orphans)?;
    }
    Ok(())
}
