//! Configuration validation

use arangolink_core::{ConnectionConfig, ConnectorError};
use arangolink_types::Scheme;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::env::EnvSubstitutor;

/// Host, optional port and optional path after the scheme separator
static AUTHORITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\[[0-9A-Fa-f:.]+\]|[A-Za-z0-9.\-_]+)(:\d{1,5})?(/.*)?$")
        .expect("valid authority pattern")
});

/// Traditional ArangoDB database/collection naming
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("valid name pattern"));

/// Connection configuration validator
pub struct ConfigValidator {
    /// Whether to enforce traditional ArangoDB naming rules
    strict_names: bool,
}

impl ConfigValidator {
    /// Create a validator enforcing traditional naming rules
    pub fn new() -> Self {
        Self { strict_names: true }
    }

    /// Create a validator that only rejects empty names (extended naming)
    pub fn lenient() -> Self {
        Self {
            strict_names: false,
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self, config: &ConnectionConfig) -> Result<(), ConnectorError> {
        self.validate_resolved(config)?;
        self.validate_endpoints(config)?;
        self.validate_name("database", &config.database_name)?;
        if let Some(collection) = &config.collection_name {
            self.validate_name("collection", collection)?;
        }
        Ok(())
    }

    /// Reject values still holding `{{ env.NAME }}` placeholders
    fn validate_resolved(&self, config: &ConnectionConfig) -> Result<(), ConnectorError> {
        let unresolved = config
            .endpoint_urls
            .iter()
            .chain([&config.username, &config.password, &config.database_name])
            .chain(config.collection_name.as_ref())
            .any(|value| EnvSubstitutor::has_placeholders(value));

        if unresolved {
            return Err(ConnectorError::Validation(
                "Configuration has unresolved {{ env.NAME }} placeholders".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate that at least one endpoint is present and all are well-formed
    fn validate_endpoints(&self, config: &ConnectionConfig) -> Result<(), ConnectorError> {
        if config.endpoints().next().is_none() {
            return Err(ConnectorError::Validation(
                "At least one endpoint URL is required".to_string(),
            ));
        }

        for endpoint in config.endpoints() {
            let (_, authority) = Scheme::split_endpoint(endpoint).map_err(|e| {
                ConnectorError::Validation(format!("Invalid endpoint '{}': {}", endpoint, e))
            })?;

            if !AUTHORITY_PATTERN.is_match(authority) {
                return Err(ConnectorError::Validation(format!(
                    "Invalid endpoint '{}': malformed host",
                    endpoint
                )));
            }
        }

        Ok(())
    }

    fn validate_name(&self, kind: &str, name: &str) -> Result<(), ConnectorError> {
        if name.is_empty() {
            return Err(ConnectorError::Validation(format!(
                "The {} name cannot be empty",
                kind
            )));
        }

        if self.strict_names && !NAME_PATTERN.is_match(name) {
            return Err(ConnectorError::Validation(format!(
                "Invalid {} name '{}': must start with a letter or underscore and contain only letters, digits, '_' or '-'",
                kind, name
            )));
        }

        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ConnectionConfig {
        ConnectionConfig::new("http://localhost:8529", "orders").with_collection("items")
    }

    #[test]
    fn test_valid_config() {
        let validator = ConfigValidator::new();
        assert!(validator.validate(&valid_config()).is_ok());

        let config = valid_config()
            .with_endpoint("ssl://[::1]:8530")
            .with_endpoint("https://db.example.com");
        assert!(validator.validate(&config).is_ok());
    }

    #[test]
    fn test_no_endpoints() {
        let mut config = valid_config();
        config.endpoint_urls = vec!["".to_string()];
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("At least one endpoint"));
    }

    #[test]
    fn test_malformed_endpoint() {
        let validator = ConfigValidator::new();

        let config = ConnectionConfig::new("localhost:8529", "orders");
        assert!(validator.validate(&config).is_err());

        let config = ConnectionConfig::new("mongodb://localhost:27017", "orders");
        assert!(validator.validate(&config).is_err());

        let config = ConnectionConfig::new("http://local host:8529", "orders");
        assert!(validator.validate(&config).is_err());
    }

    #[test]
    fn test_empty_database_name() {
        let config = ConnectionConfig::new("http://localhost:8529", "");
        assert!(ConfigValidator::lenient().validate(&config).is_err());
    }

    #[test]
    fn test_strict_names() {
        let config = ConnectionConfig::new("http://localhost:8529", "1orders");
        assert!(ConfigValidator::new().validate(&config).is_err());
        assert!(ConfigValidator::lenient().validate(&config).is_ok());

        let config = valid_config().with_collection("bad name");
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_unresolved_placeholders() {
        let config = valid_config().with_credentials("root", "{{ env.ARANGO_PASSWORD }}");
        let err = ConfigValidator::lenient().validate(&config).unwrap_err();
        assert!(matches!(err, ConnectorError::Validation(msg) if msg.contains("unresolved")));

        let config = valid_config().with_credentials("root", "{{literal}}");
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }
}
