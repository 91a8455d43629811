//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the default consensus node URL.
pub const DEFAULT_NODE_URL_ENV_VAR: &str = "GATEWAY_DEFAULT_NODE_URL";
/// Overrides the proxy directory database path.
pub const DB_PATH_ENV_VAR: &str = "GATEWAY_DB_PATH";
/// Overrides the listener bind address.
pub const BIND_ADDRESS_ENV_VAR: &str = "GATEWAY_BIND_ADDRESS";

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
    finish(config)
}

/// Build a configuration from defaults when no file is given.
pub fn default_config() -> Result<GatewayConfig, ConfigError> {
    finish(GatewayConfig::default())
}

fn finish(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides through `lookup` so tests never touch the process env.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(DEFAULT_NODE_URL_ENV_VAR) {
        config.upstream.default_node_url = url;
    }
    if let Some(path) = lookup(DB_PATH_ENV_VAR) {
        config.storage.db_path = path;
    }
    if let Some(addr) = lookup(BIND_ADDRESS_ENV_VAR) {
        config.listener.bind_address = addr;
    }
}
