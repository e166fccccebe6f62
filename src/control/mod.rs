//! Actuator control.

pub mod fan;

pub use fan::{FanController, FanDecision, FanRule, FanState, TriggerDirection};
