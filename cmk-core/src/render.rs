//! Rendering helpers for check output
//!
//! Centralized functions for turning values into the human readable strings
//! used in summaries: temperatures, trends, timespans, signal power, percent.

use crate::constants::time;
use crate::units::TempUnit;

/// Format a temperature in °C with one decimal place
pub fn render_temp(celsius: f64) -> String {
    render_temp_with_unit(celsius, TempUnit::Celsius)
}

/// Format a temperature given in °C in the requested output unit
pub fn render_temp_with_unit(celsius: f64, unit: TempUnit) -> String {
    format!("{:.1} {}", unit.from_celsius(celsius), unit.symbol())
}

/// Format a signed temperature difference given in °C
pub fn render_temp_delta(delta_celsius: f64, unit: TempUnit) -> String {
    format!("{:+.1} {}", unit.delta_from_celsius(delta_celsius), unit.symbol())
}

/// Format a temperature change per period, e.g. `+12.0 °C per 2 min`
pub fn render_trend(delta_celsius: f64, unit: TempUnit, period_minutes: u32) -> String {
    format!("{} per {} min", render_temp_delta(delta_celsius, unit), period_minutes)
}

fn plural(count: u64, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

/// Format a duration in seconds using its two most significant units
pub fn render_timespan(seconds: f64) -> String {
    let total = seconds.max(0.0).round();
    let secs = total as u64;

    if total < time::SECONDS_PER_MINUTE {
        plural(secs, "second")
    } else if total < time::SECONDS_PER_HOUR {
        format!("{} {}", plural(secs / 60, "minute"), plural(secs % 60, "second"))
    } else if total < time::SECONDS_PER_DAY {
        format!(
            "{} {}",
            plural(secs / 3600, "hour"),
            plural((secs % 3600) / 60, "minute")
        )
    } else if total < time::SECONDS_PER_YEAR {
        format!(
            "{} {}",
            plural(secs / 86400, "day"),
            plural((secs % 86400) / 3600, "hour")
        )
    } else {
        format!(
            "{} {}",
            plural(secs / 31_536_000, "year"),
            plural((secs % 31_536_000) / 86400, "day")
        )
    }
}

/// Format a signal power value, e.g. `-3.27 dBm`
pub fn render_dbm(value: f64) -> String {
    format!("{:.2} dBm", value)
}

/// Format a percentage with two decimals, e.g. `40.00%`
pub fn render_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_temp() {
        assert_eq!(render_temp(23.0), "23.0 °C");
        assert_eq!(render_temp_with_unit(10.0, TempUnit::Fahrenheit), "50.0 °F");
        assert_eq!(render_temp_with_unit(10.0, TempUnit::Kelvin), "283.1 K");
    }

    #[test]
    fn test_render_trend() {
        assert_eq!(render_trend(12.0, TempUnit::Celsius, 2), "+12.0 °C per 2 min");
        assert_eq!(render_trend(-1.5, TempUnit::Celsius, 30), "-1.5 °C per 30 min");
        assert_eq!(render_trend(10.0, TempUnit::Fahrenheit, 30), "+18.0 °F per 30 min");
    }

    #[test]
    fn test_render_timespan() {
        assert_eq!(render_timespan(0.0), "0 seconds");
        assert_eq!(render_timespan(-5.0), "0 seconds");
        assert_eq!(render_timespan(1.0), "1 second");
        assert_eq!(render_timespan(360.0), "6 minutes 0 seconds");
        assert_eq!(render_timespan(61.0), "1 minute 1 second");
        assert_eq!(render_timespan(7200.0), "2 hours 0 minutes");
        assert_eq!(render_timespan(90000.0), "1 day 1 hour");
        assert_eq!(render_timespan(31_536_000.0 * 2.0), "2 years 0 days");
    }

    #[test]
    fn test_render_dbm_and_percent() {
        assert_eq!(render_dbm(-3.27), "-3.27 dBm");
        assert_eq!(render_percent(40.0), "40.00%");
    }
}
