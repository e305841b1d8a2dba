//! cmk-levels Core Library
//!
//! Threshold evaluation for monitoring checks.
//!
//! # Features
//!
//! - **Level reconciliation**: Judge a reading against user levels, device levels or both
//! - **Temperature check**: Unit conversion, device status, trend and time-left projection
//! - **Value store**: Injected per-service state for rates and averages, in memory or on disk
//! - **Sections**: Parsers and check plugins for entity sensors and agent sensor readings
//! - **Correction tables**: Per-device fixes for scaling and threshold quirks
//!
//! # Module Structure
//!
//! - `engine/` - Reconciliation, temperature, trend, counters
//! - `data/` - Sections, plugins, correction tables
//!
//! # Example
//!
//! ```
//! use cmk_core::{reconcile, DeviceLevelsHandling, Levels, LevelsSpec, State};
//!
//! let user = LevelsSpec::new(Some(Levels::new(23.0, 30.0)), None);
//! let rec = reconcile(
//!     23.0,
//!     &user,
//!     &LevelsSpec::none(),
//!     DeviceLevelsHandling::PreferUser,
//!     &|v| format!("{:.1} °C", v),
//!     "Temperature",
//! );
//! assert_eq!(rec.state, State::Warn);
//! ```

// Grouped modules
pub mod data;
pub mod engine;

// Standalone modules
pub mod constants;
pub mod levels;
pub mod plugin;
pub mod render;
pub mod results;
pub mod state;
pub mod units;
pub mod value_store;

pub use cmk_error as error;

// Re-export error types
pub use error::{CheckmkError, Result};

// Re-export primary types
pub use levels::{check_levels, Levels, LevelsSpec};
pub use results::{format_plugin_output, worst_state, CheckResult, Metric, Outcome, Service};
pub use state::State;
pub use units::TempUnit;

// Re-export engine types
pub use engine::{
    check_temperature, check_temperature_list, check_trend, reconcile, DeviceLevelsHandling,
    DeviceStatus, DeviceTemp, LevelSource, Reconciliation, TempParams, TempSensor, TrendParams,
};

// Re-export data types
pub use data::{
    CorrectionTable, DomParams, EntitySensorDom, EntitySensorTemperature, HumidityParams,
    SensorHumidity, SensorReading, SensorTemperature,
};

// Re-export plugin contract and stores
pub use plugin::{CheckContext, CheckPlugin, PluginRegistry, StringTable, PLUGIN_NAMES};
pub use value_store::{JsonFileValueStore, MemoryValueStore, ValueStore};
