//! Evaluation engine
//!
//! Level reconciliation, the temperature check with its trend, and the
//! value-store backed counters they use.

pub mod counters;
pub mod reconcile;
pub mod temperature;
pub mod trend;

pub use counters::{get_average, get_rate};
pub use reconcile::{reconcile, DeviceLevelsHandling, LevelSource, Reconciliation};
pub use temperature::{
    check_temperature, check_temperature_list, DeviceStatus, DeviceTemp, TempParams, TempSensor,
};
pub use trend::{check_trend, TrendParams};
