//! Service states
//!
//! The four monitoring states with their numeric codes and the severity
//! ordering used when results are combined. Severity differs from the numeric
//! code: UNKNOWN ranks between WARN and CRIT.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Health state of a service or of a single sub-result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    #[default]
    Ok,
    Warn,
    Crit,
    Unknown,
}

impl State {
    /// Numeric state code (0 OK, 1 WARN, 2 CRIT, 3 UNKNOWN), also used as process exit code
    pub fn code(self) -> u8 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Crit => 2,
            State::Unknown => 3,
        }
    }

    /// Map a numeric state code back to a state
    pub fn from_code(code: i64) -> Option<State> {
        match code {
            0 => Some(State::Ok),
            1 => Some(State::Warn),
            2 => Some(State::Crit),
            3 => Some(State::Unknown),
            _ => None,
        }
    }

    fn severity(self) -> u8 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Unknown => 2,
            State::Crit => 3,
        }
    }

    /// The more severe of two states
    pub fn worst(self, other: State) -> State {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// The less severe of two states
    pub fn best(self, other: State) -> State {
        if other.severity() < self.severity() {
            other
        } else {
            self
        }
    }

    /// Most severe state of an iterator, OK for an empty one
    pub fn worst_of(states: impl IntoIterator<Item = State>) -> State {
        states.into_iter().fold(State::Ok, State::worst)
    }

    pub fn label(self) -> &'static str {
        match self {
            State::Ok => "OK",
            State::Warn => "WARN",
            State::Crit => "CRIT",
            State::Unknown => "UNKNOWN",
        }
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by severity, not by numeric code
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
