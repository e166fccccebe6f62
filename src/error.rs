//! Unified error types for the sensor daemon.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! startup path's error handling uniform.  The running loops never propagate
//! these upwards: sensor, actuator and publish failures are logged where they
//! happen and the loop carries on.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the daemon funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A sensor could not be opened or read.
    Sensor(SensorError),
    /// A fan command failed.
    Actuator(ActuatorError),
    /// The message bus rejected or could not take a message.
    Publish(PublishError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The I2C bus device could not be opened.
    BusUnavailable(u8),
    /// An I2C write or read transaction failed (NACK, arbitration, timeout).
    Bus,
    /// A data word failed its CRC-8 check.
    Checksum,
    /// The conversion produced a NaN or infinite value.
    NotFinite,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusUnavailable(bus) => write!(f, "I2C bus {bus} unavailable"),
            Self::Bus => write!(f, "I2C transaction failed"),
            Self::Checksum => write!(f, "checksum mismatch"),
            Self::NotFinite => write!(f, "non-finite sample"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    /// The control endpoint answered with a non-2xx status.
    Status(u16),
    /// The request never got a response (connect, DNS, timeout).
    Transport(String),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "control endpoint returned HTTP {code}"),
            Self::Transport(msg) => write!(f, "control endpoint unreachable: {msg}"),
        }
    }
}

impl std::error::Error for ActuatorError {}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Publish errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The client's outgoing request queue is full.
    QueueFull,
    /// The client has shut down and accepts no more requests.
    Disconnected,
    /// The payload could not be serialised.
    Encode(String),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "outgoing queue full"),
            Self::Disconnected => write!(f, "client disconnected"),
            Self::Encode(msg) => write!(f, "payload encoding failed: {msg}"),
        }
    }
}

impl std::error::Error for PublishError {}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
