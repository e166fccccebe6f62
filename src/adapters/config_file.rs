//! JSON configuration file adapter.
//!
//! Implements [`ConfigPort`] by reading the daemon's config file, parsing
//! it with `serde_json` and validating the result.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "SENSETT_CONFIG";
/// File name looked up next to the executable.
pub const CONFIG_FILE_NAME: &str = "sensett.conf";

#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$SENSETT_CONFIG` if set, else `sensett.conf` beside the executable
    /// (or in the working directory if the executable path is unknown).
    pub fn from_env() -> Self {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::new(path);
        }
        let dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        Self::new(dir.join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse(text: &str) -> Result<SystemConfig, ConfigError> {
        let config: SystemConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl ConfigPort for FileConfig {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(self.path.display().to_string()),
            _ => ConfigError::Io(format!("{}: {}", self.path.display(), e)),
        })?;
        let config = Self::parse(&text)?;
        info!(
            "Config loaded from {} ({} sensors, {} groups)",
            self.path.display(),
            config.hardware_sensors.len(),
            config.mqtt_sensors.len()
        );
        Ok(config)
    }
}
