//! Outbound application events.
//!
//! The acquisition and publication loops emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::control::FanState;
use crate::error::{ActuatorError, PublishError};

/// Structured events emitted by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The pipeline is built and the loops are about to start.
    Started {
        sensors: usize,
        groups: usize,
        fan: Option<String>,
    },

    /// A sensor was read but some quantities came back undefined.
    SensorSkipped { sensor: String, undefined: usize },

    /// A sensor was not read because a compensation input is undefined.
    CompensationMissing { sensor: String, input: &'static str },

    /// The fan endpoint accepted a state change.
    FanSwitched {
        fan: String,
        from: FanState,
        to: FanState,
        value: f32,
    },

    /// The fan endpoint rejected a state change; it is retried next tick.
    FanCommandFailed {
        fan: String,
        desired: FanState,
        error: ActuatorError,
    },

    /// A group snapshot was handed to the message bus.
    Published { topic: String, bytes: usize },

    /// The message bus refused a group snapshot.
    PublishFailed { topic: String, error: PublishError },
}
