//! Adapters: concrete implementations of the port traits.
//!
//! Each adapter bridges a port trait to real I/O: Linux I2C for the
//! sensors, HTTP for the fan endpoint, MQTT for publication, a JSON file
//! for configuration, and the log facade for events.

pub mod config_file;
pub mod http_fan;
#[cfg(feature = "linux")]
pub mod i2c;
pub mod log_sink;
pub mod mqtt;
