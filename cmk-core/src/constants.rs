//! Constants and defaults for the check engine
//!
//! Centralizes magic numbers, value store key suffixes and paths.
//! Add new values here before using them elsewhere.

/// Value store keys and paths
pub mod store {
    /// Suffix of the key holding the last `(timestamp, value)` pair for rates
    pub const DELTA_SUFFIX: &str = "delta";

    /// Suffix of the key holding the exponentially weighted trend average
    pub const TREND_SUFFIX: &str = "trend";

    /// Prefix shared by all temperature keys
    pub const TEMP_PREFIX: &str = "temp";

    /// Directory name below the user data dir
    pub const DATA_DIR_NAME: &str = "cmk-check";

    /// Subdirectory holding per-service value store files
    pub const COUNTERS_DIR: &str = "counters";

    /// Fallback when no user data dir can be resolved
    pub const FALLBACK_DIR: &str = "/var/lib/cmk-check";

    /// Build the value store key for a temperature computation
    pub fn temp_key(unique_name: &str, suffix: &str) -> String {
        format!("{}.{}.{}", TEMP_PREFIX, unique_name, suffix)
    }
}

/// Temperature check defaults
pub mod temperature {
    /// Default trend period in minutes
    pub const DEFAULT_TREND_PERIOD_MINUTES: u32 = 30;

    /// Absolute zero in °C, readings below are impossible
    pub const ABSOLUTE_ZERO_CELSIUS: f64 = -273.15;
}

/// Entity sensor MIB codes
pub mod entity_sensor {
    /// `units` entry of the SI prefix table
    pub const SCALE_UNITS: i32 = 9;

    /// Smallest and largest valid SI prefix codes (yocto..yotta)
    pub const SCALE_MIN: i32 = 1;
    pub const SCALE_MAX: i32 = 17;

    /// Precision range accepted from the device
    pub const PRECISION_MIN: i32 = -8;
    pub const PRECISION_MAX: i32 = 9;

    pub const TYPE_CELSIUS: u8 = 8;
    pub const TYPE_DBM: u8 = 14;

    pub const SEVERITY_OTHER: u8 = 1;
    pub const SEVERITY_MINOR: u8 = 10;
    pub const SEVERITY_MAJOR: u8 = 20;
}

/// Time constants used by rate and timespan computations
pub mod time {
    pub const SECONDS_PER_MINUTE: f64 = 60.0;
    pub const SECONDS_PER_HOUR: f64 = 3600.0;
    pub const SECONDS_PER_DAY: f64 = 86400.0;
    pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;
}
