//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured pipeline events through
//! the `log` facade; `main` routes that to stderr or the configured file.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] as a one-line record.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { sensors, groups, fan } => {
                info!(
                    "START | sensors={} groups={} fan={}",
                    sensors,
                    groups,
                    fan.as_deref().unwrap_or("none")
                );
            }
            AppEvent::SensorSkipped { sensor, undefined } => {
                warn!("SENSOR | {} | {} quantities undefined this tick", sensor, undefined);
            }
            AppEvent::CompensationMissing { sensor, input } => {
                debug!("SENSOR | {} | waiting for '{}' compensation", sensor, input);
            }
            AppEvent::FanSwitched { fan, from, to, value } => {
                info!("FAN | {} | {} -> {} (trigger={:.2})", fan, from, to, value);
            }
            AppEvent::FanCommandFailed { fan, desired, error } => {
                warn!("FAN | {} | {} failed: {}", fan, desired, error);
            }
            AppEvent::Published { topic, bytes } => {
                debug!("MQTT | {} | {} bytes", topic, bytes);
            }
            AppEvent::PublishFailed { topic, error } => {
                warn!("MQTT | {} | {}", topic, error);
            }
        }
    }
}
