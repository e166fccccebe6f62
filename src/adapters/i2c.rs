//! Linux I2C bus access via `/dev/i2c-<bus>`.
//!
//! Each sensor gets its own handle on the bus device; the kernel
//! serialises transactions between them.

use linux_embedded_hal::{Delay, I2cdev};
use log::error;

use crate::app::ports::SensorPort;
use crate::error::{Result, SensorError};
use crate::sensors::{SensorDescriptor, create_driver};

pub fn bus_path(bus: u8) -> String {
    format!("/dev/i2c-{bus}")
}

/// Open the bus for `descriptor` and build its driver.
pub fn open_sensor(descriptor: &SensorDescriptor) -> Result<Box<dyn SensorPort>> {
    let path = bus_path(descriptor.bus);
    let i2c = I2cdev::new(&path).map_err(|e| {
        error!("{}: cannot open {}: {}", descriptor.name, path, e);
        SensorError::BusUnavailable(descriptor.bus)
    })?;
    Ok(create_driver(descriptor.kind, descriptor.address, i2c, Delay))
}
