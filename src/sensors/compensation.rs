//! Compensation bindings between sensors.
//!
//! A sensor that declares compensation inputs is bound, once at startup,
//! to the peers that supply them.  A peer qualifies if it shares at least
//! one publication group with the consumer and declares a quantity of the
//! required name; the first qualifying peer in registry order wins.  Each
//! tick only the peers' current smoothed values are read.

use log::{debug, warn};

use crate::sensors::group::PublicationGroup;
use crate::sensors::{Readings, SensorRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub input: &'static str,
    /// Registry index of the supplying peer.
    pub peer: usize,
}

/// Per-sensor compensation bindings, indexed like the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationMap {
    bindings: Vec<Vec<Binding>>,
}

impl CompensationMap {
    pub fn build(registry: &SensorRegistry, groups: &[PublicationGroup]) -> Self {
        let bindings = registry
            .iter()
            .enumerate()
            .map(|(consumer, state)| {
                state
                    .compensation_inputs()
                    .iter()
                    .filter_map(|&input| {
                        let peer = registry.iter().enumerate().position(|(idx, peer)| {
                            idx != consumer
                                && peer.declares(input)
                                && groups.iter().any(|g| g.contains(idx) && g.contains(consumer))
                        });
                        match peer {
                            Some(peer) => {
                                debug!(
                                    "{}: '{}' compensated by {}",
                                    state.name(),
                                    input,
                                    registry.get(peer).map_or("?", |p| p.name())
                                );
                                Some(Binding { input, peer })
                            }
                            None => {
                                warn!(
                                    "{}: no peer supplies '{}'; sensor will never read",
                                    state.name(),
                                    input
                                );
                                None
                            }
                        }
                    })
                    .collect()
            })
            .collect();

        Self { bindings }
    }

    pub fn bindings(&self, sensor: usize) -> &[Binding] {
        self.bindings.get(sensor).map(Vec::as_slice).unwrap_or_default()
    }

    /// Current smoothed values of every bound input for `sensor`.  Inputs
    /// whose peer has no samples yet are simply absent.
    pub fn resolve(&self, sensor: usize, registry: &SensorRegistry) -> Readings {
        let mut inputs = Readings::new();
        for b in self.bindings(sensor) {
            let value = registry.get(b.peer).and_then(|p| p.value(b.input));
            inputs.set(b.input, value);
        }
        inputs
    }
}
