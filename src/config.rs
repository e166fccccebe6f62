//! System configuration parameters
//!
//! Loaded once at startup from a JSON file (see
//! [`FileConfig`](crate::adapters::config_file::FileConfig)).  Top-level
//! keys are upper-case; everything beyond the sensor list, fan rule,
//! groups and broker address is optional.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::app::ports::ConfigError;
use crate::sensors::{QuantitySpec, SensorKind};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct SystemConfig {
    // --- Topology ---
    /// Physical sensors, in polling order.
    pub hardware_sensors: Vec<SensorConfig>,
    /// Optional single fan rule.  `{}` and `null` both mean "no fan".
    #[serde(deserialize_with = "deserialize_fan")]
    pub fan: Option<FanConfig>,
    /// Publication groups.
    pub mqtt_sensors: Vec<GroupConfig>,

    // --- MQTT ---
    pub mqtt_broker: String,
    pub mqtt_port: u16,

    // --- Fan endpoint ---
    /// URL the fan G-code script is POSTed to.
    pub fan_control_url: String,
    /// Per-request timeout (milliseconds).
    pub fan_timeout_ms: u64,

    // --- Timing ---
    /// Acquisition loop period (milliseconds)
    pub acquisition_interval_ms: u64,
    /// Publication loop period (milliseconds)
    pub publish_interval_ms: u64,
    /// Delay before the first publication (seconds)
    pub publish_warmup_secs: u64,

    // --- Logging ---
    /// Log file; stderr when absent.
    pub log_file: Option<std::path::PathBuf>,
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    /// Sensor model, e.g. `"SHT31"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub i2c_bus: u8,
    /// Overrides the model's default address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanConfig {
    pub name: String,
    pub trigger_sensor: String,
    pub trigger_value: f32,
    /// `true`: ON at or above `trigger_value`; `false`: at or below.
    pub trigger_on_above: bool,
    /// Defaults to the trigger sensor's primary quantity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_quantity: Option<String>,
}

impl FanConfig {
    /// The quantity this rule triggers on for a sensor of `kind`: the
    /// configured one, or the kind's primary quantity.
    pub fn trigger_spec(&self, kind: SensorKind) -> Result<&'static QuantitySpec, ConfigError> {
        match self.trigger_quantity.as_deref() {
            None => Ok(kind.primary_quantity()),
            Some(q) => kind.quantity(q).ok_or_else(|| {
                ConfigError::ValidationFailed(format!(
                    "fan '{}': {} sensors have no quantity '{}'",
                    self.name, kind, q
                ))
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub hardware_sensors: Vec<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            hardware_sensors: Vec::new(),
            fan: None,
            mqtt_sensors: Vec::new(),

            mqtt_broker: "localhost".into(),
            mqtt_port: 1883,

            fan_control_url: "http://localhost/printer/gcode/script".into(),
            fan_timeout_ms: 5_000,

            acquisition_interval_ms: 1_000, // 1 Hz
            publish_interval_ms: 1_000,     // 1 Hz
            publish_warmup_secs: 60,        // let windows fill

            log_file: None,
            log_level: "info".into(),
        }
    }
}

fn deserialize_fan<'de, D>(deserializer: D) -> Result<Option<FanConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct NoFan {}

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Slot {
        Fan(FanConfig),
        Empty(NoFan),
    }

    Ok(match Option::<Slot>::deserialize(deserializer)? {
        Some(Slot::Fan(fan)) => Some(fan),
        Some(Slot::Empty(_)) | None => None,
    })
}

impl SystemConfig {
    pub fn acquisition_interval(&self) -> Duration {
        Duration::from_millis(self.acquisition_interval_ms)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn publish_warmup(&self) -> Duration {
        Duration::from_secs(self.publish_warmup_secs)
    }

    pub fn fan_timeout(&self) -> Duration {
        Duration::from_millis(self.fan_timeout_ms)
    }

    /// Reject anything that would fail later at runtime.  Runs before any
    /// hardware is opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names: Vec<&str> = Vec::with_capacity(self.hardware_sensors.len());
        for s in &self.hardware_sensors {
            if s.name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed("sensor with empty name".into()));
            }
            s.kind.parse::<SensorKind>()?;
            if names.contains(&s.name.as_str()) {
                return Err(ConfigError::DuplicateSensor(s.name.clone()));
            }
            names.push(&s.name);
        }

        for g in &self.mqtt_sensors {
            if g.name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed("group with empty name".into()));
            }
            if let Some(missing) = g.hardware_sensors.iter().find(|m| !names.contains(&m.as_str())) {
                return Err(ConfigError::UnknownSensor {
                    referenced_by: format!("group '{}'", g.name),
                    name: missing.clone(),
                });
            }
        }

        if let Some(fan) = &self.fan {
            self.validate_fan(fan)?;
        }

        if self.mqtt_broker.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("MQTT_BROKER is empty".into()));
        }
        for (key, value) in [
            ("ACQUISITION_INTERVAL_MS", self.acquisition_interval_ms),
            ("PUBLISH_INTERVAL_MS", self.publish_interval_ms),
            ("FAN_TIMEOUT_MS", self.fan_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationFailed(format!("{key} must be > 0")));
            }
        }
        Ok(())
    }

    fn validate_fan(&self, fan: &FanConfig) -> Result<(), ConfigError> {
        if fan.name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("fan with empty name".into()));
        }
        let trigger = self
            .hardware_sensors
            .iter()
            .find(|s| s.name == fan.trigger_sensor)
            .ok_or_else(|| ConfigError::UnknownSensor {
                referenced_by: format!("fan '{}'", fan.name),
                name: fan.trigger_sensor.clone(),
            })?;
        fan.trigger_spec(trigger.kind.parse::<SensorKind>()?)?;
        if !fan.trigger_value.is_finite() {
            return Err(ConfigError::ValidationFailed(format!(
                "fan '{}': trigger_value must be finite",
                fan.name
            )));
        }
        Ok(())
    }
}
