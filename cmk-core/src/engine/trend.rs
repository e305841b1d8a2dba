//! Temperature trend and time-left projection
//!
//! The rate of change is averaged over the configured period and extrapolated
//! to "degrees per period". If the trend points towards a crit level, the
//! time until that level is reached is projected from the averaged rate.

use serde::{Deserialize, Serialize};

use crate::constants::store::{temp_key, DELTA_SUFFIX, TREND_SUFFIX};
use crate::constants::temperature::DEFAULT_TREND_PERIOD_MINUTES;
use crate::constants::time::SECONDS_PER_MINUTE;
use crate::engine::counters::{get_average, get_rate};
use crate::error::{CheckmkError, Result};
use crate::levels::{check_levels, Levels, LevelsSpec};
use crate::plugin::CheckContext;
use crate::render::{render_timespan, render_trend};
use crate::results::{CheckResult, Outcome};
use crate::units::TempUnit;

/// Trend computation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrendParams {
    /// Observation period in minutes
    pub period: u32,
    /// Upper levels for the temperature change per period, in °C
    pub trend_levels: Option<Levels>,
    /// Levels for falling temperatures, given as magnitudes
    pub trend_levels_lower: Option<Levels>,
    /// Lower levels for the time left until a crit level is hit, in minutes
    pub trend_timeleft: Option<Levels>,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            period: DEFAULT_TREND_PERIOD_MINUTES,
            trend_levels: None,
            trend_levels_lower: None,
            trend_timeleft: None,
        }
    }
}

impl TrendParams {
    pub fn validate(&self) -> Result<()> {
        if self.period == 0 {
            return Err(CheckmkError::invalid_params(
                "trend_compute.period",
                "period must be at least one minute",
            ));
        }
        if let Some(levels) = &self.trend_levels {
            levels.validate_upper("trend_compute.trend_levels")?;
        }
        if let Some(levels) = &self.trend_levels_lower {
            Levels::new(levels.warn.abs(), levels.crit.abs())
                .validate_upper("trend_compute.trend_levels_lower")?;
        }
        if let Some(levels) = &self.trend_timeleft {
            levels.validate_lower("trend_compute.trend_timeleft")?;
        }
        Ok(())
    }

    /// Trend levels as evaluated: falling levels become negative
    pub fn levels(&self) -> LevelsSpec {
        LevelsSpec::new(
            self.trend_levels,
            self.trend_levels_lower
                .map(|l| Levels::new(-l.warn.abs(), -l.crit.abs())),
        )
    }
}

/// Evaluate the temperature trend of `unique_name`
///
/// `used` are the levels the temperature itself was judged against; their
/// crit values are the limits for the time-left projection. Fails with an
/// `IgnoreResults` error while the rate counter is initializing.
pub fn check_trend(
    temp: f64,
    params: &TrendParams,
    used: &LevelsSpec,
    output_unit: TempUnit,
    unique_name: &str,
    ctx: &mut CheckContext<'_>,
) -> Result<Vec<CheckResult>> {
    let period = params.period;
    let rate = get_rate(
        ctx.value_store,
        &temp_key(unique_name, DELTA_SUFFIX),
        ctx.now,
        temp,
    )?;
    let rate_avg = get_average(
        ctx.value_store,
        &temp_key(unique_name, TREND_SUFFIX),
        ctx.now,
        rate,
        f64::from(period),
    );
    let trend = rate_avg * f64::from(period) * SECONDS_PER_MINUTE;

    let render = |v: f64| render_trend(v, output_unit, period);
    let (state, summary) = check_levels(trend, &params.levels(), &render, "Temperature trend");
    let mut results = vec![CheckResult::from(Outcome::summary(state, summary))];

    if let Some(timeleft) = params.trend_timeleft {
        let limit = if trend > 0.0 {
            used.upper.map(|l| l.crit)
        } else if trend < 0.0 {
            used.lower.map(|l| l.crit)
        } else {
            None
        };

        if let Some(limit) = limit {
            if rate_avg != 0.0 {
                let minutes = ((limit - temp) / (rate_avg * SECONDS_PER_MINUTE)).max(0.0);
                let (state, summary) = check_levels(
                    minutes,
                    &LevelsSpec::new(None, Some(timeleft)),
                    &|m| render_timespan(m * SECONDS_PER_MINUTE),
                    "Time until temperature limit reached",
                );
                results.push(Outcome::summary(state, summary).into());
            }
        }
    }

    Ok(results)
}
