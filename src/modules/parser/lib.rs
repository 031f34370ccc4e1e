//! Configuration parsing for Arangolink
//!
//! This crate loads a [`ConnectionConfig`] from YAML, substitutes
//! `{{ env.VAR }}` placeholders and validates the result.

pub mod env;
pub mod validator;
pub mod yaml;

pub use validator::ConfigValidator;
pub use yaml::YamlParser;

use arangolink_core::{ConnectionConfig, ConnectorError};
use tracing::debug;

/// Parse a configuration file from a path
pub fn parse_file(path: &str) -> Result<ConnectionConfig, ConnectorError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConnectorError::Config(format!("Failed to read file '{}': {}", path, e)))?;

    debug!("Loaded connector configuration from {}", path);
    parse_string(&content)
}

/// Parse a configuration from a string
pub fn parse_string(content: &str) -> Result<ConnectionConfig, ConnectorError> {
    let config = YamlParser::parse(content)?;

    let validator = ConfigValidator::new();
    validator.validate(&config)?;

    Ok(config)
}
