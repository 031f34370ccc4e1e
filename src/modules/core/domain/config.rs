//! Connection configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection settings for a single connector
///
/// Immutable once handed to a connector. The password is redacted from the
/// `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Endpoint URLs, tried in order until one is reachable
    pub endpoint_urls: Vec<String>,

    /// User name; empty means anonymous access
    #[serde(default)]
    pub username: String,

    /// Password for `username`
    #[serde(default)]
    pub password: String,

    /// Target database name
    pub database_name: String,

    /// Target collection name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,

    /// Accept any server certificate on TLS endpoints
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

impl ConnectionConfig {
    /// Create a config for a single endpoint with anonymous access
    pub fn new(endpoint: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            endpoint_urls: vec![endpoint.into()],
            username: String::new(),
            password: String::new(),
            database_name: database_name.into(),
            collection_name: None,
            insecure_skip_tls_verify: false,
        }
    }

    /// Set the credential pair
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the target collection
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collection_name = Some(name.into());
        self
    }

    /// Append a fallback endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_urls.push(endpoint.into());
        self
    }

    /// Disable TLS certificate verification
    pub fn insecure(mut self) -> Self {
        self.insecure_skip_tls_verify = true;
        self
    }

    /// Non-empty endpoint URLs, in configured order
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.endpoint_urls
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
    }

    /// Credentials to authenticate with, or `None` for anonymous access
    pub fn credentials(&self) -> Option<Credentials> {
        if self.username.is_empty() {
            None
        } else {
            Some(Credentials::new(&self.username, &self.password))
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint_urls", &self.endpoint_urls)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database_name", &self.database_name)
            .field("collection_name", &self.collection_name)
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .finish()
    }
}

/// Basic authentication credential pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConnectionConfig::new("http://localhost:8529", "orders")
            .with_credentials("root", "")
            .with_collection("items")
            .with_endpoint("http://replica:8529");
        assert_eq!(config.database_name, "orders");
        assert_eq!(config.collection_name.as_deref(), Some("items"));
        assert_eq!(
            config.endpoints().collect::<Vec<_>>(),
            vec!["http://localhost:8529", "http://replica:8529"]
        );
        assert!(!config.insecure_skip_tls_verify);
        assert!(config.insecure().insecure_skip_tls_verify);
    }

    #[test]
    fn test_endpoints_skip_blank_entries() {
        let mut config = ConnectionConfig::new("  ", "orders");
        config.endpoint_urls.push("http://localhost:8529".into());
        assert_eq!(config.endpoints().count(), 1);
    }

    #[test]
    fn test_credentials_empty_username_is_anonymous() {
        let config = ConnectionConfig::new("http://localhost:8529", "orders");
        assert!(config.credentials().is_none());

        let config = config.with_credentials("root", "secret");
        assert_eq!(config.credentials(), Some(Credentials::new("root", "secret")));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::new("http://localhost:8529", "orders")
            .with_credentials("root", "hunter2");
        let debug = format!("{:?}", config);
        assert!(debug.contains("root"));
        assert!(!debug.contains("hunter2"));
        assert!(!format!("{:?}", config.credentials()).contains("hunter2"));
    }
}
