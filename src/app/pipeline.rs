//! Startup wiring: configuration → registry, groups, bindings, fan rule.
//!
//! [`Pipeline`] owns everything the two loops share.  `main` builds it
//! once, then lends it by reference to both loop threads.

use crate::config::SystemConfig;
use crate::control::{FanController, FanRule};
use crate::error::Result;
use crate::sensors::compensation::CompensationMap;
use crate::sensors::group::PublicationGroup;
use crate::sensors::{SensorDescriptor, SensorRegistry};

use super::acquisition::AcquisitionLoop;
use super::events::AppEvent;
use super::ports::{ActuatorPort, PublishPort, SensorPort};
use super::publication::PublicationLoop;

#[derive(Debug)]
pub struct Pipeline {
    registry: SensorRegistry,
    groups: Vec<PublicationGroup>,
    compensation: CompensationMap,
    fan_rule: Option<FanRule>,
}

impl Pipeline {
    /// Validate `config` and open every sensor through `open`.  Any error
    /// is fatal: nothing is returned half-built.
    pub fn build<F>(config: &SystemConfig, open: F) -> Result<Self>
    where
        F: FnMut(&SensorDescriptor) -> Result<Box<dyn SensorPort>>,
    {
        config.validate()?;

        let registry = SensorRegistry::build(&config.hardware_sensors, open)?;
        let groups = PublicationGroup::build_all(&config.mqtt_sensors, &registry)?;
        let compensation = CompensationMap::build(&registry, &groups);
        let fan_rule = config
            .fan
            .as_ref()
            .map(|f| FanRule::from_config(f, &registry))
            .transpose()?;

        Ok(Self {
            registry,
            groups,
            compensation,
            fan_rule,
        })
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn compensation(&self) -> &CompensationMap {
        &self.compensation
    }

    pub fn started_event(&self) -> AppEvent {
        AppEvent::Started {
            sensors: self.registry.len(),
            groups: self.groups.len(),
            fan: self.fan_rule.as_ref().map(|r| r.fan.clone()),
        }
    }

    pub fn acquisition<A: ActuatorPort>(&self, actuator: A) -> AcquisitionLoop<'_, A> {
        AcquisitionLoop::new(
            &self.registry,
            self.compensation.clone(),
            self.fan_rule.clone().map(FanController::new),
            actuator,
        )
    }

    pub fn publication<P: PublishPort>(&self, publisher: P) -> PublicationLoop<'_, P> {
        PublicationLoop::new(&self.registry, &self.groups, publisher)
    }
}
