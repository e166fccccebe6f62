//! Application core: the sensor pipeline, zero I/O.
//!
//! This module contains the two periodic loops (acquisition and
//! publication) and the startup wiring that builds the shared sensor
//! registry.  All interaction with hardware, the fan endpoint and the
//! message bus happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod acquisition;
pub mod events;
pub mod pipeline;
pub mod ports;
pub mod publication;
