//! Publication groups: named sets of sensors published as one message.

use crate::app::ports::ConfigError;
use crate::config::GroupConfig;
use crate::sensors::SensorRegistry;

const TOPIC_PREFIX: &str = "sensor/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationGroup {
    /// Lowercased group name.
    pub name: String,
    /// `sensor/<name>`.
    pub topic: String,
    /// Registry indices, in configuration order.
    pub members: Vec<usize>,
}

impl PublicationGroup {
    pub fn from_config(
        cfg: &GroupConfig,
        registry: &SensorRegistry,
    ) -> Result<Self, ConfigError> {
        let name = cfg.name.to_lowercase();
        let members = cfg
            .hardware_sensors
            .iter()
            .map(|member| {
                registry
                    .index_of(member)
                    .ok_or_else(|| ConfigError::UnknownSensor {
                        referenced_by: format!("group '{}'", cfg.name),
                        name: member.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            topic: format!("{TOPIC_PREFIX}{name}"),
            name,
            members,
        })
    }

    pub fn build_all(
        cfgs: &[GroupConfig],
        registry: &SensorRegistry,
    ) -> Result<Vec<Self>, ConfigError> {
        cfgs.iter().map(|c| Self::from_config(c, registry)).collect()
    }

    pub fn contains(&self, sensor: usize) -> bool {
        self.members.contains(&sensor)
    }
}
