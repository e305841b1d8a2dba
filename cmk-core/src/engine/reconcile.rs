//! Device vs. user level reconciliation
//!
//! A reading can be judged against levels configured by the administrator,
//! levels reported by the device itself, or both. [`DeviceLevelsHandling`]
//! decides which set applies and the [`Reconciliation`] records the choice
//! together with a human readable explanation.
//!
//! The evaluator does not know what it measures: callers pass a render
//! function and a label, so temperature, humidity, power or fan speed all go
//! through the same code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CheckmkError;
use crate::levels::{check_levels, LevelsSpec};
use crate::state::State;

/// How device-reported levels are combined with user levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceLevelsHandling {
    /// User levels if configured, else device levels
    #[default]
    #[serde(rename = "usrdefault", alias = "prefer_user", alias = "user_default")]
    PreferUser,
    #[serde(rename = "usr", alias = "user_only")]
    UserOnly,
    #[serde(rename = "dev", alias = "device_only")]
    DeviceOnly,
    /// Device levels if reported, else user levels
    #[serde(rename = "devdefault", alias = "prefer_device", alias = "device_default")]
    PreferDevice,
    /// Evaluate both sets, report the more severe state
    #[serde(rename = "worst")]
    Worst,
    /// Evaluate both sets, report the less severe state
    #[serde(rename = "best")]
    Best,
}

impl DeviceLevelsHandling {
    pub const ALL: [DeviceLevelsHandling; 6] = [
        DeviceLevelsHandling::PreferUser,
        DeviceLevelsHandling::UserOnly,
        DeviceLevelsHandling::DeviceOnly,
        DeviceLevelsHandling::PreferDevice,
        DeviceLevelsHandling::Worst,
        DeviceLevelsHandling::Best,
    ];

    /// Canonical spelling used in params files
    pub fn code(self) -> &'static str {
        match self {
            DeviceLevelsHandling::PreferUser => "usrdefault",
            DeviceLevelsHandling::UserOnly => "usr",
            DeviceLevelsHandling::DeviceOnly => "dev",
            DeviceLevelsHandling::PreferDevice => "devdefault",
            DeviceLevelsHandling::Worst => "worst",
            DeviceLevelsHandling::Best => "best",
        }
    }
}

impl fmt::Display for DeviceLevelsHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DeviceLevelsHandling {
    type Err = CheckmkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "usrdefault" | "prefer_user" | "user_default" => Ok(DeviceLevelsHandling::PreferUser),
            "usr" | "user_only" => Ok(DeviceLevelsHandling::UserOnly),
            "dev" | "device_only" => Ok(DeviceLevelsHandling::DeviceOnly),
            "devdefault" | "prefer_device" | "device_default" => {
                Ok(DeviceLevelsHandling::PreferDevice)
            }
            "worst" => Ok(DeviceLevelsHandling::Worst),
            "best" => Ok(DeviceLevelsHandling::Best),
            other => Err(CheckmkError::invalid_params(
                "device_levels_handling",
                format!("unknown policy '{}'", other),
            )),
        }
    }
}

/// Which level set produced the reported state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelSource {
    User,
    Device,
    None,
}

/// Outcome of evaluating a reading under a [`DeviceLevelsHandling`] policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub state: State,
    pub summary: String,
    /// The levels actually applied; empty when none were found
    pub levels: LevelsSpec,
    pub source: LevelSource,
    pub explanation: String,
}

impl Reconciliation {
    /// Upper levels for the metric, if any were used
    pub fn metric_levels(&self) -> Option<(f64, f64)> {
        self.levels.upper.map(|l| l.as_tuple())
    }
}

struct Evaluation {
    state: State,
    summary: String,
    levels: LevelsSpec,
    source: LevelSource,
}

fn evaluate(
    reading: f64,
    levels: &LevelsSpec,
    source: LevelSource,
    render: &dyn Fn(f64) -> String,
    label: &str,
) -> Evaluation {
    let (state, summary) = check_levels(reading, levels, render, label);
    let source = if levels.is_empty() { LevelSource::None } else { source };
    Evaluation {
        state,
        summary,
        levels: *levels,
        source,
    }
}

fn fallback_note(source: LevelSource) -> &'static str {
    match source {
        LevelSource::User => "used user levels",
        LevelSource::Device => "used device levels",
        LevelSource::None => "no levels found",
    }
}

/// Evaluate `reading` under `policy`
///
/// User levels are taken as given (validate them when loading params).
/// Device levels are normalized first since devices report them in either
/// order. For `Worst` and `Best` a tie goes to the user levels unless only
/// the device reported any.
pub fn reconcile(
    reading: f64,
    user: &LevelsSpec,
    device: &LevelsSpec,
    policy: DeviceLevelsHandling,
    render: &dyn Fn(f64) -> String,
    label: &str,
) -> Reconciliation {
    let device = device.normalized();

    let (chosen, explanation) = match policy {
        DeviceLevelsHandling::UserOnly => (
            evaluate(reading, user, LevelSource::User, render, label),
            "only use user levels".to_string(),
        ),
        DeviceLevelsHandling::DeviceOnly => (
            evaluate(reading, &device, LevelSource::Device, render, label),
            "only use device levels".to_string(),
        ),
        DeviceLevelsHandling::PreferUser => {
            let eval = if !user.is_empty() {
                evaluate(reading, user, LevelSource::User, render, label)
            } else {
                evaluate(reading, &device, LevelSource::Device, render, label)
            };
            let note = fallback_note(eval.source);
            (
                eval,
                format!("prefer user levels over device levels ({})", note),
            )
        }
        DeviceLevelsHandling::PreferDevice => {
            let eval = if !device.is_empty() {
                evaluate(reading, &device, LevelSource::Device, render, label)
            } else {
                evaluate(reading, user, LevelSource::User, render, label)
            };
            let note = fallback_note(eval.source);
            (
                eval,
                format!("prefer device levels over user levels ({})", note),
            )
        }
        DeviceLevelsHandling::Worst | DeviceLevelsHandling::Best => {
            let usr = evaluate(reading, user, LevelSource::User, render, label);
            let dev = evaluate(reading, &device, LevelSource::Device, render, label);
            let take_device = if usr.state == dev.state {
                user.is_empty() && !device.is_empty()
            } else if policy == DeviceLevelsHandling::Worst {
                dev.state > usr.state
            } else {
                dev.state < usr.state
            };
            let explanation = if policy == DeviceLevelsHandling::Worst {
                "show most critical state"
            } else {
                "show least critical state"
            };
            (
                if take_device { dev } else { usr },
                explanation.to_string(),
            )
        }
    };

    debug!(
        "Reconciled {} under {}: {} via {:?}",
        reading, policy, chosen.state, chosen.source
    );

    Reconciliation {
        state: chosen.state,
        summary: chosen.summary,
        levels: chosen.levels,
        source: chosen.source,
        explanation,
    }
}
