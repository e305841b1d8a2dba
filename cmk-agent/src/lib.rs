//! Sensor special agent
//!
//! Reads the device inventory and the latest sensor readings of an
//! organization from a REST API and writes them as agent sections.

pub mod api;
pub mod sections;

pub use api::{
    paginate, Device, DeviceReadings, HttpPageSource, PageLimits, PageSource, RawReading,
    SensorApi,
};
pub use sections::{write_sections, ReadingLine, DEVICES_SECTION, READINGS_SECTION};
