//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Listening port.
pub const ENV_PORT: &str = "PORT";
/// Environment tag; "production" hides fault details.
pub const ENV_NODE_ENV: &str = "NODE_ENV";
/// Error-only log file. Empty disables the sink.
pub const ENV_LOG_ERROR_FILE: &str = "LOG_ERROR_FILE";
/// Combined log file. Empty disables the sink.
pub const ENV_LOG_COMBINED_FILE: &str = "LOG_COMBINED_FILE";
/// Minimum log severity.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// Path of the metrics endpoint.
pub const ENV_METRICS_PATH: &str = "METRICS_PATH";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => {
                write!(f, "Invalid value for {}: `{}`", var, value)
            }
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

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

/// Parse a TOML file. Not validated; see [`load_config`].
pub fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Read an optional TOML file, apply environment overrides and validate.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => AppConfig::default(),
    };
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup(ENV_PORT) {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::Env {
            var: ENV_PORT,
            value: port.clone(),
        })?;
    }
    if let Some(environment) = lookup(ENV_NODE_ENV).filter(|v| !v.trim().is_empty()) {
        config.server.environment = environment.trim().to_string();
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.logging.level = level.parse().map_err(|_| ConfigError::Env {
            var: ENV_LOG_LEVEL,
            value: level.clone(),
        })?;
    }
    if let Some(path) = lookup(ENV_LOG_ERROR_FILE) {
        config.logging.error_file = non_empty(path);
    }
    if let Some(path) = lookup(ENV_LOG_COMBINED_FILE) {
        config.logging.combined_file = non_empty(path);
    }
    if let Some(path) = lookup(ENV_METRICS_PATH) {
        config.metrics.path = path;
    }
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
