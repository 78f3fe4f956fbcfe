use std::path::Path;

use dimse::{DimseError, ScuConfig};
use serde::Deserialize;
use thiserror::Error;

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid [scu] section: {0}")]
    InvalidScu(#[from] DimseError),

    #[error("invalid log level '{0}'")]
    InvalidLogLevel(String),

    #[error("log_to_file is set but log_file_path is empty")]
    MissingLogFilePath,
}

/// Host configuration, loaded from TOML.
///
/// ```toml
/// [scu]
/// local_aet = "VIEWER"
/// timeout_seconds = 30
///
/// [logging]
/// level = "info"
/// ```
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub scu: ScuConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scu.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
