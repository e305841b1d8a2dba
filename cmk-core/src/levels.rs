//! Warn/crit levels and their evaluation
//!
//! Upper levels alarm when a value reaches them (`value >= warn`), lower
//! levels alarm when a value drops below them (`value < warn`). Both sides are
//! optional and evaluated independently; the upper side wins when both fire.

use serde::{Deserialize, Serialize};

use crate::error::{CheckmkError, Result};
use crate::state::State;

/// A `(warn, crit)` threshold pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Levels {
    pub warn: f64,
    pub crit: f64,
}

impl Levels {
    pub fn new(warn: f64, crit: f64) -> Self {
        Self { warn, crit }
    }

    /// Reorder so that `warn <= crit`
    pub fn normalize_upper(self) -> Self {
        if self.warn > self.crit {
            Self::new(self.crit, self.warn)
        } else {
            self
        }
    }

    /// Reorder so that `warn >= crit`
    pub fn normalize_lower(self) -> Self {
        if self.warn < self.crit {
            Self::new(self.crit, self.warn)
        } else {
            self
        }
    }

    /// Reject upper levels in reverse order
    pub fn validate_upper(&self, field: &str) -> Result<()> {
        self.validate_finite(field)?;
        if self.warn > self.crit {
            return Err(self.invalid(field, "upper warn level must not exceed crit level"));
        }
        Ok(())
    }

    /// Reject lower levels in reverse order
    pub fn validate_lower(&self, field: &str) -> Result<()> {
        self.validate_finite(field)?;
        if self.warn < self.crit {
            return Err(self.invalid(field, "lower warn level must not be below crit level"));
        }
        Ok(())
    }

    fn validate_finite(&self, field: &str) -> Result<()> {
        if !self.warn.is_finite() || !self.crit.is_finite() {
            return Err(self.invalid(field, "levels must be finite numbers"));
        }
        Ok(())
    }

    fn invalid(&self, field: &str, reason: &str) -> CheckmkError {
        CheckmkError::InvalidLevels {
            field: field.to_string(),
            warn: self.warn,
            crit: self.crit,
            reason: reason.to_string(),
        }
    }

    /// Apply a conversion to both thresholds
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(f(self.warn), f(self.crit))
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.warn, self.crit)
    }
}

impl From<(f64, f64)> for Levels {
    fn from((warn, crit): (f64, f64)) -> Self {
        Self::new(warn, crit)
    }
}

impl From<Levels> for (f64, f64) {
    fn from(levels: Levels) -> Self {
        (levels.warn, levels.crit)
    }
}

/// Upper and lower levels of one level source
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelsSpec {
    pub upper: Option<Levels>,
    pub lower: Option<Levels>,
}

impl LevelsSpec {
    pub fn new(upper: Option<Levels>, lower: Option<Levels>) -> Self {
        Self { upper, lower }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.upper.is_none() && self.lower.is_none()
    }

    /// Swap reversed pairs, used for device-reported levels
    pub fn normalized(self) -> Self {
        Self {
            upper: self.upper.map(Levels::normalize_upper),
            lower: self.lower.map(Levels::normalize_lower),
        }
    }

    /// Validate both sides, used for user-configured levels
    pub fn validate(&self, upper_field: &str, lower_field: &str) -> Result<()> {
        if let Some(upper) = &self.upper {
            upper.validate_upper(upper_field)?;
        }
        if let Some(lower) = &self.lower {
            lower.validate_lower(lower_field)?;
        }
        Ok(())
    }

    pub fn map(self, f: impl Fn(f64) -> f64 + Copy) -> Self {
        Self {
            upper: self.upper.map(|l| l.map(f)),
            lower: self.lower.map(|l| l.map(f)),
        }
    }
}

/// State of `value` against upper levels
pub fn upper_state(value: f64, levels: &Levels) -> State {
    if value >= levels.crit {
        State::Crit
    } else if value >= levels.warn {
        State::Warn
    } else {
        State::Ok
    }
}

/// State of `value` against lower levels
pub fn lower_state(value: f64, levels: &Levels) -> State {
    if value < levels.crit {
        State::Crit
    } else if value < levels.warn {
        State::Warn
    } else {
        State::Ok
    }
}

/// Evaluate `value` against both sides of `levels`
///
/// Returns the state and a summary `"<label>: <value>"`, extended by
/// `" (warn/crit at W/C)"` or `" (warn/crit below W/C)"` when not OK. An
/// empty label yields just the rendered value.
pub fn check_levels(
    value: f64,
    levels: &LevelsSpec,
    render: &dyn Fn(f64) -> String,
    label: &str,
) -> (State, String) {
    let mut summary = if label.is_empty() {
        render(value)
    } else {
        format!("{}: {}", label, render(value))
    };

    if let Some(upper) = &levels.upper {
        let state = upper_state(value, upper);
        if state != State::Ok {
            summary.push_str(&format!(
                " (warn/crit at {}/{})",
                render(upper.warn),
                render(upper.crit)
            ));
            return (state, summary);
        }
    }

    if let Some(lower) = &levels.lower {
        let state = lower_state(value, lower);
        if state != State::Ok {
            summary.push_str(&format!(
                " (warn/crit below {}/{})",
                render(lower.warn),
                render(lower.crit)
            ));
            return (state, summary);
        }
    }

    (State::Ok, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(v: f64) -> String {
        format!("{:.1}", v)
    }

    #[test]
    fn test_warn_boundary_inclusive() {
        let spec = LevelsSpec::new(Some(Levels::new(23.0, 30.0)), None);
        let (state, summary) = check_levels(23.0, &spec, &plain, "Value");
        assert_eq!(state, State::Warn);
        assert_eq!(summary, "Value: 23.0 (warn/crit at 23.0/30.0)");

        assert_eq!(check_levels(22.9, &spec, &plain, "Value").0, State::Ok);
        assert_eq!(check_levels(30.0, &spec, &plain, "Value").0, State::Crit);
    }

    #[test]
    fn test_lower_levels_strict() {
        let spec = LevelsSpec::new(None, Some(Levels::new(1.0, -15.0)));
        assert_eq!(check_levels(1.0, &spec, &plain, "T").0, State::Ok);
        assert_eq!(check_levels(0.5, &spec, &plain, "T").0, State::Warn);
        assert_eq!(check_levels(-15.0, &spec, &plain, "T").0, State::Warn);

        let (state, summary) = check_levels(-20.0, &spec, &plain, "T");
        assert_eq!(state, State::Crit);
        assert_eq!(summary, "T: -20.0 (warn/crit below 1.0/-15.0)");
    }

    #[test]
    fn test_empty_label_and_no_levels() {
        let (state, summary) = check_levels(5.0, &LevelsSpec::none(), &plain, "");
        assert_eq!(state, State::Ok);
        assert_eq!(summary, "5.0");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(Levels::new(30.0, 20.0).normalize_upper(), Levels::new(20.0, 30.0));
        assert_eq!(Levels::new(-15.0, 1.0).normalize_lower(), Levels::new(1.0, -15.0));
        assert_eq!(Levels::new(20.0, 30.0).normalize_upper(), Levels::new(20.0, 30.0));
    }

    #[test]
    fn test_validate_rejects_reversed() {
        assert!(Levels::new(30.0, 20.0).validate_upper("levels").is_err());
        assert!(Levels::new(20.0, 20.0).validate_upper("levels").is_ok());
        assert!(Levels::new(-15.0, 1.0).validate_lower("levels_lower").is_err());
        assert!(Levels::new(f64::NAN, 1.0).validate_upper("levels").is_err());
    }

    #[test]
    fn test_serde_as_tuple() {
        let levels: Levels = serde_json::from_str("[23.0, 30.0]").unwrap();
        assert_eq!(levels, Levels::new(23.0, 30.0));
        assert_eq!(serde_json::to_string(&levels).unwrap(), "[23.0,30.0]");
    }
}
