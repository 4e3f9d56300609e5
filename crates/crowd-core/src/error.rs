//! Initialization errors and config loading

use crowd_logic::config::{ConfigError, CrowdConfig};
use thiserror::Error;

/// Why a crowd could not be set up
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid crowd config: {}", describe(.0))]
    InvalidConfig(Vec<ConfigError>),
    #[error("no agent template supplied")]
    MissingTemplate,
    #[error("crowd config is not valid JSON: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

fn describe(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse a JSON crowd config and validate it. Missing fields take defaults.
pub fn load_config(json: &str) -> Result<CrowdConfig, InitError> {
    let config: CrowdConfig = serde_json::from_str(json)?;
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(InitError::InvalidConfig(errors));
    }
    Ok(config)
}
