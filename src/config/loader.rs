//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;
    finalize(config)
}

/// Validate a configuration and overlay secrets from the environment.
pub fn finalize(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    apply_env(&mut config);
    Ok(config)
}

/// Read the API key from the configured environment variable.
pub fn apply_env(config: &mut GatewayConfig) {
    match std::env::var(&config.upstream.api_key_env) {
        Ok(key) if !key.trim().is_empty() => {
            config.upstream.api_key = key.trim().to_string();
        }
        _ => {
            tracing::warn!(
                env = %config.upstream.api_key_env,
                "Upstream API key not set; requests will be sent without credentials"
            );
        }
    }
}
