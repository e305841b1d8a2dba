//! Check results, metrics and discovered services
//!
//! A check emits an ordered list of [`CheckResult`]s. Text results carry a
//! summary (shown in the service overview) or only a notice (shown in the
//! details). Metrics carry the levels used so graphs can draw them.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::state::State;

/// A textual sub-result of a check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub state: State,
    pub summary: Option<String>,
    pub notice: Option<String>,
}

impl Outcome {
    /// Result shown in the service summary
    pub fn summary(state: State, text: impl Into<String>) -> Self {
        Self {
            state,
            summary: Some(text.into()),
            notice: None,
        }
    }

    /// Result only shown in the details; promoted to the summary when not OK
    pub fn notice(state: State, text: impl Into<String>) -> Self {
        let text = text.into();
        if state == State::Ok {
            Self {
                state,
                summary: None,
                notice: Some(text),
            }
        } else {
            Self::summary(state, text)
        }
    }

    /// Text of this result regardless of where it is shown
    pub fn text(&self) -> &str {
        self.summary
            .as_deref()
            .or(self.notice.as_deref())
            .unwrap_or_default()
    }
}

/// A performance data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    /// Upper (warn, crit) levels, if any were used
    pub levels: Option<(f64, f64)>,
    /// Optional (min, max) boundaries
    pub boundaries: Option<(f64, f64)>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            levels: None,
            boundaries: None,
        }
    }

    pub fn with_levels(mut self, levels: Option<(f64, f64)>) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_boundaries(mut self, boundaries: Option<(f64, f64)>) -> Self {
        self.boundaries = boundaries;
        self
    }

    /// Nagios performance data notation: `name=value;warn;crit;min;max`
    pub fn perfdata(&self) -> String {
        let mut out = format!("{}={}", self.name, format_number(self.value));
        let (warn, crit) = match self.levels {
            Some((w, c)) => (format_number(w), format_number(c)),
            None => (String::new(), String::new()),
        };
        let (min, max) = match self.boundaries {
            Some((lo, hi)) => (format_number(lo), format_number(hi)),
            None => (String::new(), String::new()),
        };
        let _ = write!(out, ";{};{};{};{}", warn, crit, min, max);
        out.trim_end_matches(';').to_string()
    }
}

fn format_number(value: f64) -> String {
    // f64 Display already drops a trailing ".0"
    format!("{}", value)
}

/// One item yielded by a check function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CheckResult {
    Outcome(Outcome),
    Metric(Metric),
}

impl CheckResult {
    pub fn state(&self) -> State {
        match self {
            CheckResult::Outcome(o) => o.state,
            CheckResult::Metric(_) => State::Ok,
        }
    }

    pub fn as_outcome(&self) -> Option<&Outcome> {
        match self {
            CheckResult::Outcome(o) => Some(o),
            CheckResult::Metric(_) => None,
        }
    }

    pub fn as_metric(&self) -> Option<&Metric> {
        match self {
            CheckResult::Metric(m) => Some(m),
            CheckResult::Outcome(_) => None,
        }
    }
}

impl From<Outcome> for CheckResult {
    fn from(outcome: Outcome) -> Self {
        CheckResult::Outcome(outcome)
    }
}

impl From<Metric> for CheckResult {
    fn from(metric: Metric) -> Self {
        CheckResult::Metric(metric)
    }
}

/// A service found by discovery; `item` is `None` for item-less checks
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Service {
    pub item: Option<String>,
}

impl Service {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: Some(item.into()),
        }
    }

    pub fn itemless() -> Self {
        Self { item: None }
    }
}

/// Worst state among all results
pub fn worst_state(results: &[CheckResult]) -> State {
    State::worst_of(results.iter().map(CheckResult::state))
}

/// Render results as a single plugin output line plus details
///
/// Format: `STATE - summary, summary | perf perf` followed by one line per
/// notice. Non-OK summaries get the usual `(!)`/`(!!)`/`(?)` markers.
pub fn format_plugin_output(results: &[CheckResult]) -> String {
    let state = worst_state(results);

    let summaries: Vec<String> = results
        .iter()
        .filter_map(CheckResult::as_outcome)
        .filter_map(|o| o.summary.as_ref().map(|s| format!("{}{}", s, state_marker(o.state))))
        .collect();

    let perfdata: Vec<String> = results
        .iter()
        .filter_map(CheckResult::as_metric)
        .map(Metric::perfdata)
        .collect();

    let mut out = format!("{} - {}", state, summaries.join(", "));
    if !perfdata.is_empty() {
        let _ = write!(out, " | {}", perfdata.join(" "));
    }

    for notice in results
        .iter()
        .filter_map(CheckResult::as_outcome)
        .filter_map(|o| o.notice.as_ref())
    {
        let _ = write!(out, "\n{}", notice);
    }
    out
}

fn state_marker(state: State) -> &'static str {
    match state {
        State::Ok => "",
        State::Warn => "(!)",
        State::Crit => "(!!)",
        State::Unknown => "(?)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_promoted_when_not_ok() {
        let ok = Outcome::notice(State::Ok, "Configuration: only use user levels");
        assert!(ok.summary.is_none());
        assert_eq!(ok.notice.as_deref(), Some("Configuration: only use user levels"));

        let warn = Outcome::notice(State::Warn, "State on device: warning");
        assert_eq!(warn.summary.as_deref(), Some("State on device: warning"));
        assert!(warn.notice.is_none());
    }

    #[test]
    fn test_perfdata() {
        let metric = Metric::new("temp", 23.0).with_levels(Some((23.0, 30.0)));
        assert_eq!(metric.perfdata(), "temp=23;23;30");

        let bare = Metric::new("temp", 21.5);
        assert_eq!(bare.perfdata(), "temp=21.5");

        let bounded = Metric::new("humidity", 40.0).with_boundaries(Some((0.0, 100.0)));
        assert_eq!(bounded.perfdata(), "humidity=40;;;0;100");
    }

    #[test]
    fn test_worst_state_ignores_metrics() {
        let results = vec![
            CheckResult::from(Metric::new("temp", 99.0)),
            CheckResult::from(Outcome::summary(State::Warn, "Temperature: 23.0 °C")),
        ];
        assert_eq!(worst_state(&results), State::Warn);
        assert_eq!(worst_state(&[]), State::Ok);
    }

    #[test]
    fn test_format_plugin_output() {
        let results = vec![
            CheckResult::from(Metric::new("temp", 23.0).with_levels(Some((23.0, 30.0)))),
            CheckResult::from(Outcome::summary(
                State::Warn,
                "Temperature: 23.0 °C (warn/crit at 23.0 °C/30.0 °C)",
            )),
            CheckResult::from(Outcome::notice(
                State::Ok,
                "Configuration: prefer user levels over device levels (used user levels)",
            )),
        ];
        assert_eq!(
            format_plugin_output(&results),
            "WARN - Temperature: 23.0 °C (warn/crit at 23.0 °C/30.0 °C)(!) | temp=23;23;30\n\
             Configuration: prefer user levels over device levels (used user levels)"
        );
    }
}
