//! Per-device correction tables
//!
//! Some devices report values or thresholds that need fixing before they can
//! be evaluated: readings in the wrong decimal scale, or thresholds without a
//! usable severity. These fixes belong to the device family, not to the level
//! evaluator, so they live in tables that can be loaded from JSON.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::entity_sensor::{
    PRECISION_MAX, PRECISION_MIN, SCALE_MAX, SCALE_MIN, SCALE_UNITS,
};
use crate::error::{CheckmkError, Result};

/// SI prefix and precision of a raw sensor value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorScale {
    /// SI prefix code, 9 = units
    pub scale: i32,
    /// Number of decimal places in the raw value
    pub precision: i32,
}

impl SensorScale {
    pub const UNITS: SensorScale = SensorScale {
        scale: SCALE_UNITS,
        precision: 0,
    };

    /// Returns `None` for codes outside the valid ranges
    pub fn new(scale: i32, precision: i32) -> Option<Self> {
        if !(SCALE_MIN..=SCALE_MAX).contains(&scale)
            || !(PRECISION_MIN..=PRECISION_MAX).contains(&precision)
        {
            return None;
        }
        Some(Self { scale, precision })
    }

    /// Multiplier turning a raw value into the base unit
    pub fn factor(&self) -> f64 {
        10f64.powi(3 * (self.scale - SCALE_UNITS)) / 10f64.powi(self.precision)
    }

    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.factor()
    }
}

/// One correction entry as written in a table file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdCorrection {
    /// Regex matched against the sensor name
    pub sensor: String,
    /// Extra factor for readings and thresholds, e.g. 0.1 for firmware reporting tenths
    pub value_factor: Option<f64>,
    /// Sort thresholds of unknown severity into levels
    pub sort_unclassified_thresholds: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CorrectionFile {
    #[serde(default)]
    corrections: Vec<ThresholdCorrection>,
}

/// Compiled set of corrections; the first matching entry wins
#[derive(Debug, Clone, Default)]
pub struct CorrectionTable {
    entries: Vec<(Regex, ThresholdCorrection)>,
}

impl CorrectionTable {
    pub fn new(corrections: Vec<ThresholdCorrection>) -> Result<Self> {
        let entries = corrections
            .into_iter()
            .map(|c| {
                let re = Regex::new(&format!("^(?:{})$", c.sensor)).map_err(|e| {
                    CheckmkError::invalid_params("corrections.sensor", e.to_string())
                })?;
                if let Some(factor) = c.value_factor {
                    if !factor.is_finite() || factor == 0.0 {
                        return Err(CheckmkError::invalid_params(
                            "corrections.value_factor",
                            format!("{} is not a usable factor", factor),
                        ));
                    }
                }
                Ok((re, c))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Defaults for entity sensor devices: thresholds of severity "other"
    /// are sorted into levels
    pub fn entity_sensor_defaults() -> Self {
        // ".*" always compiles
        Self::new(vec![ThresholdCorrection {
            sensor: ".*".to_string(),
            value_factor: None,
            sort_unclassified_thresholds: true,
        }])
        .unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: CorrectionFile = serde_json::from_str(json)?;
        Self::new(file.corrections)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CheckmkError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let table = Self::from_json(&content)?;
        debug!("Loaded {} corrections from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, sensor: &str) -> Option<&ThresholdCorrection> {
        self.entries
            .iter()
            .find(|(re, _)| re.is_match(sensor))
            .map(|(_, c)| c)
    }

    /// Apply the value factor configured for `sensor`, if any
    pub fn correct_value(&self, sensor: &str, value: f64) -> f64 {
        match self.lookup(sensor).and_then(|c| c.value_factor) {
            Some(factor) => value * factor,
            None => value,
        }
    }

    pub fn sorts_unclassified(&self, sensor: &str) -> bool {
        self.lookup(sensor)
            .map(|c| c.sort_unclassified_thresholds)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_scale() {
        assert_eq!(SensorScale::UNITS.apply(42.0), 42.0);
        let milli = SensorScale::new(8, 0).unwrap();
        assert!((milli.apply(3270.0) - 3.27).abs() < 1e-9);
        let tenths = SensorScale::new(9, 1).unwrap();
        assert!((tenths.apply(-327.0) + 32.7).abs() < 1e-9);
        let kilo = SensorScale::new(10, 2).unwrap();
        assert!((kilo.apply(150.0) - 1500.0).abs() < 1e-9);
        assert!(SensorScale::new(0, 0).is_none());
        assert!(SensorScale::new(9, 10).is_none());
    }

    #[test]
    fn test_table_from_json() {
        let table = CorrectionTable::from_json(
            r#"{"corrections": [
                {"sensor": "PSU.*", "value_factor": 0.1},
                {"sensor": ".*", "sort_unclassified_thresholds": true}
            ]}"#,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.correct_value("PSU 1", 450.0), 45.0);
        assert_eq!(table.correct_value("CPU", 45.0), 45.0);
        assert!(!table.sorts_unclassified("PSU 1"));
        assert!(table.sorts_unclassified("CPU"));
    }

    #[test]
    fn test_pattern_must_match_whole_name() {
        let table = CorrectionTable::new(vec![ThresholdCorrection {
            sensor: "CPU".into(),
            value_factor: Some(2.0),
            ..ThresholdCorrection::default()
        }])
        .unwrap();
        assert_eq!(table.correct_value("CPU", 1.0), 2.0);
        assert_eq!(table.correct_value("CPU 2", 1.0), 1.0);
    }

    #[test]
    fn test_invalid_entries() {
        assert!(CorrectionTable::from_json(r#"{"corrections": [{"sensor": "("}]}"#).is_err());
        assert!(CorrectionTable::from_json(
            r#"{"corrections": [{"sensor": "x", "value_factor": 0.0}]}"#
        )
        .is_err());
        assert!(CorrectionTable::from_json(r#"{"fixes": []}"#).is_err());
    }

    #[test]
    fn test_defaults() {
        assert!(CorrectionTable::default().is_empty());
        assert!(CorrectionTable::entity_sensor_defaults().sorts_unclassified("anything"));
    }
}
