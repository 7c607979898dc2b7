//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::env::{apply_env, ConfigWarning};
use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A validated configuration plus the environment values that were rejected.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: ServiceConfig,
    pub warnings: Vec<ConfigWarning>,
}

/// Parse a TOML file without validating it.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Resolve the startup configuration: file (or defaults), then environment
/// overrides read through `lookup`, then validation.
pub fn load<F>(path: Option<&Path>, lookup: F) -> Result<LoadedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    let warnings = apply_env(&mut config, lookup);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(LoadedConfig { config, warnings })
}
