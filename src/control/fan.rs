//! Threshold fan controller with redundant-command suppression.
//!
//! The controller remembers the last state it successfully commanded and
//! only talks to the actuator when the desired state differs.  A failed
//! command leaves the remembered state alone, so the same transition is
//! retried on the next tick.

use core::fmt;

use crate::app::events::AppEvent;
use crate::app::ports::{ActuatorPort, ConfigError, EventSink};
use crate::config::FanConfig;
use crate::sensors::SensorRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanState {
    #[default]
    Off,
    On,
}

impl FanState {
    /// `SPEED=` argument of the G-code fan command.
    pub const fn speed_arg(self) -> &'static str {
        match self {
            Self::Off => "0",
            Self::On => "1.0",
        }
    }
}

impl fmt::Display for FanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "OFF",
            Self::On => "ON",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDirection {
    /// ON when the value is at or above the threshold.
    Above,
    /// ON when the value is at or below the threshold.
    Below,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct FanRule {
    pub fan: String,
    /// Registry index of the trigger sensor.
    pub sensor: usize,
    pub quantity: &'static str,
    pub threshold: f32,
    pub direction: TriggerDirection,
}

impl FanRule {
    pub fn desired(&self, value: f32) -> FanState {
        let on = match self.direction {
            TriggerDirection::Above => value >= self.threshold,
            TriggerDirection::Below => value <= self.threshold,
        };
        if on { FanState::On } else { FanState::Off }
    }

    /// Resolve a configured rule against the registry.  Expects a config
    /// that already passed [`SystemConfig::validate`](crate::config::SystemConfig::validate);
    /// only the lookups that can still fail are reported.
    pub fn from_config(cfg: &FanConfig, registry: &SensorRegistry) -> Result<Self, ConfigError> {
        let sensor = registry
            .index_of(&cfg.trigger_sensor)
            .ok_or_else(|| ConfigError::UnknownSensor {
                referenced_by: format!("fan '{}'", cfg.name),
                name: cfg.trigger_sensor.clone(),
            })?;
        let kind = registry
            .get(sensor)
            .map(|s| s.kind())
            .ok_or_else(|| ConfigError::ValidationFailed("trigger sensor index".into()))?;

        let quantity = cfg.trigger_spec(kind)?.name;

        Ok(Self {
            fan: cfg.name.clone(),
            sensor,
            quantity,
            threshold: cfg.trigger_value,
            direction: if cfg.trigger_on_above {
                TriggerDirection::Above
            } else {
                TriggerDirection::Below
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Result of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanDecision {
    /// Trigger value undefined; nothing evaluated.
    NoReading,
    /// Desired state already commanded; no command sent.
    Unchanged(FanState),
    /// Command sent and accepted.
    Switched(FanState),
    /// Command sent and rejected; state kept for retry.
    Failed(FanState),
}

#[derive(Debug, Clone)]
pub struct FanController {
    rule: FanRule,
    commanded: FanState,
}

impl FanController {
    pub fn new(rule: FanRule) -> Self {
        Self {
            rule,
            commanded: FanState::Off,
        }
    }

    pub fn rule(&self) -> &FanRule {
        &self.rule
    }

    /// Last state the actuator accepted.
    pub fn commanded(&self) -> FanState {
        self.commanded
    }

    /// Evaluate the rule against the trigger's current smoothed value.
    pub fn evaluate<A, S>(&mut self, value: Option<f32>, actuator: &mut A, sink: &mut S) -> FanDecision
    where
        A: ActuatorPort + ?Sized,
        S: EventSink + ?Sized,
    {
        let Some(value) = value else {
            return FanDecision::NoReading;
        };

        let desired = self.rule.desired(value);
        if desired == self.commanded {
            return FanDecision::Unchanged(desired);
        }

        match actuator.set_state(&self.rule.fan, desired) {
            Ok(()) => {
                sink.emit(&AppEvent::FanSwitched {
                    fan: self.rule.fan.clone(),
                    from: self.commanded,
                    to: desired,
                    value,
                });
                self.commanded = desired;
                FanDecision::Switched(desired)
            }
            Err(error) => {
                sink.emit(&AppEvent::FanCommandFailed {
                    fan: self.rule.fan.clone(),
                    desired,
                    error,
                });
                FanDecision::Failed(desired)
            }
        }
    }
}
