//! Port traits: the hexagonal boundary between the pipeline and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AcquisitionLoop / PublicationLoop
//! ```
//!
//! Driven adapters (I2C sensor drivers, the HTTP fan endpoint, the MQTT
//! client, the config file) implement these traits.  The loops consume
//! them via generics, so the pipeline never touches hardware or sockets
//! directly and runs unchanged against mocks on the host.

use core::fmt;

use crate::app::events::AppEvent;
use crate::config::SystemConfig;
use crate::control::FanState;
use crate::error::{ActuatorError, PublishError};
use crate::sensors::{QuantitySpec, Readings};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → pipeline)
// ───────────────────────────────────────────────────────────────

/// Raw acquisition capability of one physical sensor.
///
/// A failed bus transaction is not an error at this boundary: the driver
/// logs it and leaves the affected quantities out of the returned
/// [`Readings`], which the pipeline treats as "undefined this tick".
pub trait SensorPort: Send {
    /// Quantities this sensor produces, in a fixed order.
    fn quantities(&self) -> &'static [QuantitySpec];

    /// Names of smoothed peer quantities this sensor needs before it can
    /// take a reading.  Empty for self-contained sensors.
    fn compensation_inputs(&self) -> &'static [&'static str] {
        &[]
    }

    /// Take one raw measurement.  `inputs` carries the resolved
    /// compensation values.
    fn acquire(&mut self, inputs: &Readings) -> Readings;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: pipeline → fan endpoint)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the fan controller calls this to switch a fan.
///
/// Implementations must be time-bounded; a hung endpoint may delay one
/// acquisition tick by at most the adapter's timeout.
pub trait ActuatorPort {
    fn set_state(&mut self, fan: &str, state: FanState) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Publish port (driven adapter: pipeline → message bus)
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget message bus.  Must never block the publication loop.
pub trait PublishPort {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: pipeline → logging)
// ───────────────────────────────────────────────────────────────

/// The loops emit structured [`AppEvent`]s through this port.  Adapters
/// decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: config file → pipeline)
// ───────────────────────────────────────────────────────────────

/// Loads the startup configuration.
///
/// Implementations MUST validate before returning; an invalid config is
/// fatal and no loop is started.
pub trait ConfigPort {
    fn load(&self) -> Result<SystemConfig, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations and config validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No config file at the given path.
    NotFound(String),
    /// The file exists but could not be read.
    Io(String),
    /// The file is not valid JSON or does not match the schema.
    Parse(String),
    /// A sensor `type` that no driver supports.
    UnknownSensorKind(String),
    /// Two sensors share a name.
    DuplicateSensor(String),
    /// A group member or fan trigger names a sensor that does not exist.
    UnknownSensor { referenced_by: String, name: String },
    /// A field failed range or consistency validation.
    ValidationFailed(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "config file not found: {}", path),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::Parse(msg) => write!(f, "parse error: {}", msg),
            Self::UnknownSensorKind(kind) => write!(f, "unknown sensor type '{}'", kind),
            Self::DuplicateSensor(name) => write!(f, "duplicate sensor name '{}'", name),
            Self::UnknownSensor { referenced_by, name } => {
                write!(f, "{} references unknown sensor '{}'", referenced_by, name)
            }
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
