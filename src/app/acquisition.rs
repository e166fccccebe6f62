//! Acquisition loop: the sole writer of sensor state.
//!
//! ```text
//!  CompensationMap ──▶ ┌──────────────────────┐
//!                      │   AcquisitionLoop    │ ──▶ ActuatorPort
//!  SensorPort(s) ────▶ │ sample · smooth · fan│ ──▶ EventSink
//!                      └──────────────────────┘
//! ```
//!
//! Per tick, in registry order: resolve compensation inputs from peers'
//! smoothed values, acquire, fold into windows.  Then the fan rule (if
//! any) is evaluated against the trigger's freshly smoothed value.  No
//! failure aborts the tick.

use crate::control::{FanController, FanDecision, FanState};
use crate::sensors::compensation::CompensationMap;
use crate::sensors::{SampleOutcome, SensorRegistry};

use super::events::AppEvent;
use super::ports::{ActuatorPort, EventSink};

/// Per-tick summary, mostly for tests and debug logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Sensors read with every quantity defined.
    pub sampled: usize,
    /// Sensors read with at least one undefined quantity.
    pub partial: usize,
    /// Sensors not read for lack of compensation inputs.
    pub waiting: usize,
    pub fan: Option<FanDecision>,
}

pub struct AcquisitionLoop<'r, A> {
    registry: &'r SensorRegistry,
    compensation: CompensationMap,
    fan: Option<FanController>,
    actuator: A,
    tick_count: u64,
}

impl<'r, A: ActuatorPort> AcquisitionLoop<'r, A> {
    pub fn new(
        registry: &'r SensorRegistry,
        compensation: CompensationMap,
        fan: Option<FanController>,
        actuator: A,
    ) -> Self {
        Self {
            registry,
            compensation,
            fan,
            actuator,
            tick_count: 0,
        }
    }

    /// Run one acquisition cycle.
    pub fn tick(&mut self, sink: &mut impl EventSink) -> TickReport {
        self.tick_count += 1;
        let mut report = TickReport::default();

        for (idx, sensor) in self.registry.iter().enumerate() {
            let inputs = self.compensation.resolve(idx, self.registry);
            match sensor.sample(&inputs) {
                SampleOutcome::Sampled { undefined: 0, .. } => report.sampled += 1,
                SampleOutcome::Sampled { undefined, .. } => {
                    report.partial += 1;
                    sink.emit(&AppEvent::SensorSkipped {
                        sensor: sensor.name().to_string(),
                        undefined,
                    });
                }
                SampleOutcome::CompensationMissing(input) => {
                    report.waiting += 1;
                    sink.emit(&AppEvent::CompensationMissing {
                        sensor: sensor.name().to_string(),
                        input,
                    });
                }
            }
        }

        if let Some(fan) = self.fan.as_mut() {
            let rule = fan.rule();
            let value = self
                .registry
                .get(rule.sensor)
                .and_then(|s| s.value(rule.quantity));
            report.fan = Some(fan.evaluate(value, &mut self.actuator, sink));
        }

        report
    }

    /// Last state the actuator accepted, if a fan is configured.
    pub fn fan_state(&self) -> Option<FanState> {
        self.fan.as_ref().map(FanController::commanded)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
