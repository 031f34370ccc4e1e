//! YAML configuration parser

use arangolink_core::{ConnectionConfig, ConnectorError};
use serde::Deserialize;

use crate::env::EnvSubstitutor;

/// YAML parser for connector configuration files
pub struct YamlParser;

/// On-disk config schema.
///
/// Accepts both a single `endpoint` and an `endpoints` list, and the short
/// `database`/`collection` keys alongside the field names of
/// [`ConnectionConfig`].
#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    endpoint: Option<String>,

    #[serde(default, alias = "endpoint_urls")]
    endpoints: Vec<String>,

    #[serde(default, alias = "user")]
    username: Option<String>,

    #[serde(default)]
    password: Option<String>,

    #[serde(alias = "database_name")]
    database: String,

    #[serde(default, alias = "collection_name")]
    collection: Option<String>,

    #[serde(default)]
    insecure_skip_tls_verify: bool,
}

impl FileConfig {
    /// Every string value a placeholder may appear in
    fn strings_mut(&mut self) -> impl Iterator<Item = &mut String> + '_ {
        self.endpoint
            .iter_mut()
            .chain(self.endpoints.iter_mut())
            .chain(self.username.iter_mut())
            .chain(self.password.iter_mut())
            .chain(std::iter::once(&mut self.database))
            .chain(self.collection.iter_mut())
    }
}

impl YamlParser {
    /// Parse a YAML string into a ConnectionConfig.
    ///
    /// `{{ env.NAME }}` placeholders are resolved after parsing, inside the
    /// string values, so a substituted value is taken literally.
    pub fn parse(content: &str) -> Result<ConnectionConfig, ConnectorError> {
        let mut file = Self::deserialize(content)?;
        EnvSubstitutor::new().substitute_each(file.strings_mut())?;
        Ok(file_to_config(file))
    }

    /// Parse a YAML string without environment variable substitution
    pub fn parse_raw(content: &str) -> Result<ConnectionConfig, ConnectorError> {
        Self::deserialize(content).map(file_to_config)
    }

    fn deserialize(content: &str) -> Result<FileConfig, ConnectorError> {
        serde_yaml::from_str::<FileConfig>(content).map_err(|e| {
            // An unquoted `{{ ... }}` reads as a YAML flow mapping
            let hint = if EnvSubstitutor::has_placeholders(content) {
                " (quote values holding {{ env.NAME }} placeholders)"
            } else {
                ""
            };
            ConnectorError::Config(format!("YAML parse error: {}{}", e, hint))
        })
    }
}

fn file_to_config(file: FileConfig) -> ConnectionConfig {
    let mut endpoint_urls = Vec::with_capacity(file.endpoints.len() + 1);
    endpoint_urls.extend(file.endpoint);
    endpoint_urls.extend(file.endpoints);

    ConnectionConfig {
        endpoint_urls,
        username: file.username.unwrap_or_default(),
        password: file.password.unwrap_or_default(),
        database_name: file.database,
        collection_name: file.collection.filter(|c| !c.is_empty()),
        insecure_skip_tls_verify: file.insecure_skip_tls_verify,
    }
}
