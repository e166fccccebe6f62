//! Publication loop: reads smoothed values, never waits on acquisition.
//!
//! Each tick emits exactly one JSON object per publication group to the
//! group's topic.  Quantities with no samples yet are published as
//! `null`; defined values are rounded to their published precision.

use serde_json::{Map, Number, Value};

use crate::error::PublishError;
use crate::sensors::SensorRegistry;
use crate::sensors::group::PublicationGroup;

use super::events::AppEvent;
use super::ports::{EventSink, PublishPort};

/// Round half away from zero to `precision` decimal places.
pub fn round_to(value: f32, precision: u8) -> f64 {
    let scale = 10f64.powi(i32::from(precision));
    (f64::from(value) * scale).round() / scale
}

/// Build the `{quantity: value}` snapshot for one group.  A later member
/// overwrites an earlier member's value for the same key.
pub fn build_payload(registry: &SensorRegistry, group: &PublicationGroup) -> Map<String, Value> {
    let mut payload = Map::new();
    for sensor in group.members.iter().filter_map(|&i| registry.get(i)) {
        for (spec, value) in sensor.snapshot() {
            let json = value
                .and_then(|v| Number::from_f64(round_to(v, spec.precision)))
                .map_or(Value::Null, Value::Number);
            payload.insert(spec.name.to_string(), json);
        }
    }
    payload
}

pub struct PublicationLoop<'r, P> {
    registry: &'r SensorRegistry,
    groups: &'r [PublicationGroup],
    publisher: P,
    tick_count: u64,
}

impl<'r, P: PublishPort> PublicationLoop<'r, P> {
    pub fn new(registry: &'r SensorRegistry, groups: &'r [PublicationGroup], publisher: P) -> Self {
        Self {
            registry,
            groups,
            publisher,
            tick_count: 0,
        }
    }

    /// Publish one snapshot per group.  Returns how many were accepted.
    pub fn tick(&mut self, sink: &mut impl EventSink) -> usize {
        self.tick_count += 1;
        let mut accepted = 0;

        for group in self.groups {
            let payload = build_payload(self.registry, group);
            let result = serde_json::to_vec(&payload)
                .map_err(|e| PublishError::Encode(e.to_string()))
                .and_then(|bytes| {
                    self.publisher.publish(&group.topic, &bytes)?;
                    Ok(bytes.len())
                });

            match result {
                Ok(bytes) => {
                    accepted += 1;
                    sink.emit(&AppEvent::Published {
                        topic: group.topic.clone(),
                        bytes,
                    });
                }
                Err(error) => sink.emit(&AppEvent::PublishFailed {
                    topic: group.topic.clone(),
                    error,
                }),
            }
        }

        accepted
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
