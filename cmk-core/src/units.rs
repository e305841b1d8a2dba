//! Temperature units and conversions
//!
//! Everything inside the engine is in °C. Units only matter at the edges:
//! converting device readings in and rendering values out.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CheckmkError;

/// Temperature unit as used in params and device sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TempUnit {
    #[default]
    #[serde(rename = "c")]
    Celsius,
    #[serde(rename = "f")]
    Fahrenheit,
    #[serde(rename = "k")]
    Kelvin,
}

impl TempUnit {
    /// Convert an absolute temperature in this unit to °C
    pub fn to_celsius(self, value: f64) -> f64 {
        match self {
            TempUnit::Celsius => value,
            TempUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            TempUnit::Kelvin => value - 273.15,
        }
    }

    /// Convert an absolute temperature in °C to this unit
    pub fn from_celsius(self, celsius: f64) -> f64 {
        match self {
            TempUnit::Celsius => celsius,
            TempUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
            TempUnit::Kelvin => celsius + 273.15,
        }
    }

    /// Convert a temperature difference in °C to this unit (no offset)
    pub fn delta_from_celsius(self, delta: f64) -> f64 {
        match self {
            TempUnit::Fahrenheit => delta * 9.0 / 5.0,
            TempUnit::Celsius | TempUnit::Kelvin => delta,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TempUnit::Celsius => "°C",
            TempUnit::Fahrenheit => "°F",
            TempUnit::Kelvin => "K",
        }
    }

    /// Short code as it appears in params files
    pub fn code(self) -> &'static str {
        match self {
            TempUnit::Celsius => "c",
            TempUnit::Fahrenheit => "f",
            TempUnit::Kelvin => "k",
        }
    }
}

impl fmt::Display for TempUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for TempUnit {
    type Err = CheckmkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" => Ok(TempUnit::Celsius),
            "f" | "fahrenheit" => Ok(TempUnit::Fahrenheit),
            "k" | "kelvin" => Ok(TempUnit::Kelvin),
            other => Err(CheckmkError::UnknownUnit(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fahrenheit_conversion() {
        assert!((TempUnit::Fahrenheit.to_celsius(50.0) - 10.0).abs() < 1e-9);
        assert!((TempUnit::Fahrenheit.from_celsius(10.0) - 50.0).abs() < 1e-9);
        assert!((TempUnit::Fahrenheit.delta_from_celsius(10.0) - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_kelvin_conversion() {
        assert!((TempUnit::Kelvin.to_celsius(273.15)).abs() < 1e-9);
        assert!((TempUnit::Kelvin.delta_from_celsius(5.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse() {
        assert_eq!("C".parse::<TempUnit>().unwrap(), TempUnit::Celsius);
        assert_eq!("fahrenheit".parse::<TempUnit>().unwrap(), TempUnit::Fahrenheit);
        assert!(matches!(
            "x".parse::<TempUnit>(),
            Err(CheckmkError::UnknownUnit(ref u)) if u == "x"
        ));
    }

    #[test]
    fn test_serde_codes() {
        let unit: TempUnit = serde_json::from_str("\"f\"").unwrap();
        assert_eq!(unit, TempUnit::Fahrenheit);
        assert_eq!(serde_json::to_string(&TempUnit::Kelvin).unwrap(), "\"k\"");
    }
}
