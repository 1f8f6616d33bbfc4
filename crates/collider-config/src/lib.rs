mod defaults;
mod env;
pub mod types;
mod validation;

use std::path::Path;

pub use env::interpolate_env;
pub use types::*;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing environment variables: {0:?}")]
    MissingEnvVars(Vec<String>),

    #[error("Invalid value for '{0}': {1}")]
    InvalidValue(String, String),

    #[error("Invalid {1} name '{0}': {2}")]
    InvalidIdentifier(String, &'static str, String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ColliderConfig {
    /// Parse a collider configuration from a YAML string.
    /// Environment variables in the format `${VAR_NAME}` will be interpolated.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let interpolated = env::interpolate_env(yaml)?;
        let config: ColliderConfig = serde_yaml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Load a collider configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
