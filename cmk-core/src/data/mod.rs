//! Sections and device data
//!
//! Parsers turning raw string tables into typed sections, the plugins
//! evaluating them, and per-device correction tables.

pub mod correction;
pub mod entity_sensor;
pub mod sensor_readings;

pub use correction::{CorrectionTable, SensorScale, ThresholdCorrection};
pub use entity_sensor::{
    parse_entity_sensors, DomParams, EntitySensor, EntitySensorDom, EntitySensorSection,
    EntitySensorTemperature, SensorType,
};
pub use sensor_readings::{
    parse_sensor_readings, HumidityParams, SensorHumidity, SensorReading, SensorReadingsSection,
    SensorTemperature,
};
