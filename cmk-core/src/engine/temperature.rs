//! Temperature check
//!
//! Converts a device reading to °C, reconciles device and user levels,
//! reports the device status separately and optionally adds the trend.
//!
//! # Output order
//!
//! 1. Metric `temp` (°C, with the upper levels used)
//! 2. `Temperature: ...`
//! 3. `State on device: ...` if the device reported a status
//! 4. Trend results if configured
//! 5. `Configuration: ...` notice explaining the level choice

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::reconcile::{reconcile, DeviceLevelsHandling, Reconciliation};
use crate::engine::trend::{check_trend, TrendParams};
use crate::error::Result;
use crate::levels::{Levels, LevelsSpec};
use crate::plugin::CheckContext;
use crate::render::render_temp_with_unit;
use crate::results::{CheckResult, Metric, Outcome};
use crate::state::State;
use crate::units::TempUnit;

/// User parameters of a temperature check
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TempParams {
    /// Upper levels in °C
    pub levels: Option<Levels>,
    /// Lower levels in °C
    pub levels_lower: Option<Levels>,
    /// Unit used for rendering only
    pub output_unit: TempUnit,
    /// Unit of the raw reading, defaults to the device unit
    pub input_unit: Option<TempUnit>,
    pub device_levels_handling: DeviceLevelsHandling,
    pub trend_compute: Option<TrendParams>,
}

impl TempParams {
    /// Reject user levels in reverse order and broken trend settings
    pub fn validate(&self) -> Result<()> {
        LevelsSpec::new(self.levels, self.levels_lower).validate("levels", "levels_lower")?;
        if let Some(trend) = &self.trend_compute {
            trend.validate()?;
        }
        Ok(())
    }

    pub fn user_levels(&self) -> LevelsSpec {
        LevelsSpec::new(self.levels, self.levels_lower)
    }
}

/// Status reported by the device, independent of the reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub state: State,
    pub name: String,
}

impl DeviceStatus {
    pub fn new(state: State, name: impl Into<String>) -> Self {
        Self {
            state,
            name: name.into(),
        }
    }
}

/// What the device knows about its own sensor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceTemp {
    /// Unit of the reading and of `dev_levels*`
    pub dev_unit: TempUnit,
    pub dev_levels: Option<Levels>,
    pub dev_levels_lower: Option<Levels>,
    pub dev_status: Option<DeviceStatus>,
}

impl DeviceTemp {
    /// Device levels converted to °C
    fn levels_celsius(&self) -> LevelsSpec {
        let unit = self.dev_unit;
        LevelsSpec::new(self.dev_levels, self.dev_levels_lower).map(move |v| unit.to_celsius(v))
    }
}

struct Evaluated {
    celsius: f64,
    reconciliation: Reconciliation,
}

fn evaluate(reading: f64, params: &TempParams, device: &DeviceTemp) -> Evaluated {
    let input_unit = params.input_unit.unwrap_or(device.dev_unit);
    let celsius = input_unit.to_celsius(reading);
    let output_unit = params.output_unit;
    let render = move |v: f64| render_temp_with_unit(v, output_unit);

    let reconciliation = reconcile(
        celsius,
        &params.user_levels(),
        &device.levels_celsius(),
        params.device_levels_handling,
        &render,
        "Temperature",
    );
    Evaluated {
        celsius,
        reconciliation,
    }
}

/// Evaluate a single temperature reading
///
/// `unique_name` scopes the trend counters in the value store; without it no
/// trend is computed. While the trend counter initializes the whole check
/// fails with an `IgnoreResults` error so the host skips the cycle.
pub fn check_temperature(
    reading: f64,
    params: &TempParams,
    unique_name: Option<&str>,
    device: &DeviceTemp,
    ctx: &mut CheckContext<'_>,
) -> Result<Vec<CheckResult>> {
    let Evaluated {
        celsius,
        reconciliation,
    } = evaluate(reading, params, device);

    debug!(
        "Temperature {:.2} °C is {} ({})",
        celsius, reconciliation.state, reconciliation.explanation
    );

    let mut results = vec![
        CheckResult::from(Metric::new("temp", celsius).with_levels(reconciliation.metric_levels())),
        Outcome::summary(reconciliation.state, reconciliation.summary.clone()).into(),
    ];

    if let Some(status) = &device.dev_status {
        results.push(Outcome::notice(status.state, format!("State on device: {}", status.name)).into());
    }

    if let (Some(trend), Some(name)) = (&params.trend_compute, unique_name) {
        results.extend(check_trend(
            celsius,
            trend,
            &reconciliation.levels,
            params.output_unit,
            name,
            ctx,
        )?);
    }

    results.push(
        Outcome::notice(
            State::Ok,
            format!("Configuration: {}", reconciliation.explanation),
        )
        .into(),
    );
    Ok(results)
}

/// One sensor of a multi-sensor temperature summary
#[derive(Debug, Clone, PartialEq)]
pub struct TempSensor {
    pub name: String,
    pub reading: f64,
    pub device: DeviceTemp,
}

/// Summarize many sensors in one service
///
/// Reports the number of sensors, highest, average and lowest temperature,
/// and the worst per-sensor state with the names of the sensors in it. Trends
/// are not computed for lists.
pub fn check_temperature_list(sensors: &[TempSensor], params: &TempParams) -> Vec<CheckResult> {
    if sensors.is_empty() {
        return Vec::new();
    }

    let evaluated: Vec<(&TempSensor, f64, State)> = sensors
        .iter()
        .map(|sensor| {
            let eval = evaluate(sensor.reading, params, &sensor.device);
            let state = match &sensor.device.dev_status {
                Some(status) => eval.reconciliation.state.worst(status.state),
                None => eval.reconciliation.state,
            };
            (sensor, eval.celsius, state)
        })
        .collect();

    let temps = evaluated.iter().map(|(_, t, _)| *t);
    let highest = temps.clone().fold(f64::NEG_INFINITY, f64::max);
    let lowest = temps.clone().fold(f64::INFINITY, f64::min);
    let average = temps.sum::<f64>() / evaluated.len() as f64;

    let unit = params.output_unit;
    let mut results = vec![
        CheckResult::from(Outcome::summary(State::Ok, format!("Sensors: {}", sensors.len()))),
        Metric::new("temp", highest).into(),
        Outcome::summary(
            State::Ok,
            format!("Highest temperature: {}", render_temp_with_unit(highest, unit)),
        )
        .into(),
        Outcome::summary(
            State::Ok,
            format!("Average temperature: {}", render_temp_with_unit(average, unit)),
        )
        .into(),
        Outcome::summary(
            State::Ok,
            format!("Lowest temperature: {}", render_temp_with_unit(lowest, unit)),
        )
        .into(),
    ];

    let worst = State::worst_of(evaluated.iter().map(|(_, _, s)| *s));
    if worst != State::Ok {
        let names: Vec<&str> = evaluated
            .iter()
            .filter(|(_, _, s)| *s == worst)
            .map(|(sensor, _, _)| sensor.name.as_str())
            .collect();
        results.push(
            Outcome::summary(worst, format!("Sensors in state {}: {}", worst, names.join(", ")))
                .into(),
        );
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_store::MemoryValueStore;

    fn outcomes(results: &[CheckResult]) -> Vec<&Outcome> {
        results.iter().filter_map(CheckResult::as_outcome).collect()
    }

    fn run(reading: f64, params: &TempParams, device: &DeviceTemp) -> Vec<CheckResult> {
        let mut store = MemoryValueStore::new();
        let mut ctx = CheckContext::at(&mut store, 0.0);
        check_temperature(reading, params, None, device, &mut ctx).unwrap()
    }

    #[test]
    fn test_user_levels_warn() {
        let params = TempParams {
            levels: Some(Levels::new(23.0, 30.0)),
            ..TempParams::default()
        };
        let results = run(23.0, &params, &DeviceTemp::default());
        assert_eq!(
            results,
            vec![
                CheckResult::from(Metric::new("temp", 23.0).with_levels(Some((23.0, 30.0)))),
                Outcome::summary(State::Warn, "Temperature: 23.0 °C (warn/crit at 23.0 °C/30.0 °C)").into(),
                Outcome::notice(
                    State::Ok,
                    "Configuration: prefer user levels over device levels (used user levels)"
                )
                .into(),
            ]
        );
    }

    #[test]
    fn test_device_lower_levels_preferred() {
        let params = TempParams {
            device_levels_handling: DeviceLevelsHandling::PreferDevice,
            ..TempParams::default()
        };
        let device = DeviceTemp {
            dev_levels_lower: Some(Levels::new(1.0, -15.0)),
            ..DeviceTemp::default()
        };
        let results = run(-20.0, &params, &device);
        let texts = outcomes(&results);
        assert_eq!(texts[0].state, State::Crit);
        assert_eq!(texts[0].text(), "Temperature: -20.0 °C (warn/crit below 1.0 °C/-15.0 °C)");
        assert_eq!(
            texts[1].text(),
            "Configuration: prefer device levels over user levels (used device levels)"
        );
        assert_eq!(results[0].as_metric().unwrap().levels, None);
    }

    #[test]
    fn test_output_unit_only_affects_rendering() {
        let params = TempParams {
            output_unit: TempUnit::Fahrenheit,
            ..TempParams::default()
        };
        let results = run(10.0, &params, &DeviceTemp::default());
        assert_eq!(results[0].as_metric().unwrap().value, 10.0);
        assert_eq!(results[1].as_outcome().unwrap().text(), "Temperature: 50.0 °F");
    }

    #[test]
    fn test_input_unit_converts_reading() {
        let params = TempParams {
            input_unit: Some(TempUnit::Fahrenheit),
            ..TempParams::default()
        };
        let results = run(50.0, &params, &DeviceTemp::default());
        assert!((results[0].as_metric().unwrap().value - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_device_unit_applies_to_device_levels() {
        let device = DeviceTemp {
            dev_unit: TempUnit::Fahrenheit,
            dev_levels: Some(Levels::new(86.0, 104.0)),
            ..DeviceTemp::default()
        };
        let results = run(95.0, &TempParams::default(), &device);
        let metric = results[0].as_metric().unwrap();
        assert!((metric.value - 35.0).abs() < 1e-9);
        let (warn, crit) = metric.levels.unwrap();
        assert!((warn - 30.0).abs() < 1e-9 && (crit - 40.0).abs() < 1e-9);
        assert_eq!(results[1].state(), State::Warn);
    }

    #[test]
    fn test_device_status_is_separate_result() {
        let device = DeviceTemp {
            dev_status: Some(DeviceStatus::new(State::Crit, "sensor defect")),
            ..DeviceTemp::default()
        };
        let results = run(20.0, &TempParams::default(), &device);
        let texts = outcomes(&results);
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0].state, State::Ok);
        assert_eq!(texts[1].state, State::Crit);
        assert_eq!(texts[1].summary.as_deref(), Some("State on device: sensor defect"));

        let device = DeviceTemp {
            dev_status: Some(DeviceStatus::new(State::Ok, "ok")),
            ..DeviceTemp::default()
        };
        let results = run(20.0, &TempParams::default(), &device);
        assert_eq!(outcomes(&results)[1].notice.as_deref(), Some("State on device: ok"));
    }

    #[test]
    fn test_trend_sequence() {
        let params = TempParams {
            trend_compute: Some(TrendParams::default()),
            ..TempParams::default()
        };
        let device = DeviceTemp::default();
        let mut store = MemoryValueStore::new();

        let first = check_temperature(0.0, &params, Some("CPU"), &device, &mut CheckContext::at(&mut store, 0.0));
        assert!(first.unwrap_err().is_ignorable());

        for (now, reading) in [(900.0, 10.0), (1800.0, 20.0)] {
            let results =
                check_temperature(reading, &params, Some("CPU"), &device, &mut CheckContext::at(&mut store, now))
                    .unwrap();
            let texts = outcomes(&results);
            assert_eq!(texts.len(), 3);
            assert_eq!(texts[1].text(), "Temperature trend: +20.0 °C per 30 min");
            assert!(texts[2].text().starts_with("Configuration: "));
        }
    }

    #[test]
    fn test_validate_rejects_reversed_user_levels() {
        let params = TempParams {
            levels: Some(Levels::new(30.0, 20.0)),
            ..TempParams::default()
        };
        assert!(params.validate().is_err());
        assert!(TempParams::default().validate().is_ok());
    }

    #[test]
    fn test_params_from_json() {
        let params: TempParams = serde_json::from_str(
            r#"{"levels": [35.0, 40.0], "device_levels_handling": "worst", "output_unit": "f",
                "trend_compute": {"period": 15, "trend_levels": [5.0, 10.0]}}"#,
        )
        .unwrap();
        assert_eq!(params.levels, Some(Levels::new(35.0, 40.0)));
        assert_eq!(params.device_levels_handling, DeviceLevelsHandling::Worst);
        assert_eq!(params.output_unit, TempUnit::Fahrenheit);
        assert_eq!(params.trend_compute.as_ref().map(|t| t.period), Some(15));

        assert!(serde_json::from_str::<TempParams>(r#"{"levelz": [1, 2]}"#).is_err());
    }

    #[test]
    fn test_list_summary() {
        let params = TempParams {
            levels: Some(Levels::new(40.0, 50.0)),
            ..TempParams::default()
        };
        let sensors = vec![
            TempSensor { name: "CPU".into(), reading: 45.0, device: DeviceTemp::default() },
            TempSensor { name: "Board".into(), reading: 30.0, device: DeviceTemp::default() },
            TempSensor { name: "PSU".into(), reading: 42.0, device: DeviceTemp::default() },
        ];
        let results = check_temperature_list(&sensors, &params);
        let texts: Vec<String> = outcomes(&results).iter().map(|o| o.text().to_string()).collect();
        assert_eq!(
            texts,
            vec![
                "Sensors: 3",
                "Highest temperature: 45.0 °C",
                "Average temperature: 39.0 °C",
                "Lowest temperature: 30.0 °C",
                "Sensors in state WARN: CPU, PSU",
            ]
        );
        assert_eq!(crate::results::worst_state(&results), State::Warn);
        assert!(check_temperature_list(&[], &params).is_empty());
    }
}
