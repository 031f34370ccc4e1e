//! Endpoint scheme definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transport scheme of an ArangoDB endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP (`http://` or `tcp://`)
    Http,
    /// HTTP over TLS (`https://` or `ssl://`)
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "tcp" | "http+tcp" => Ok(Scheme::Http),
            "https" | "ssl" | "http+ssl" => Ok(Scheme::Https),
            _ => Err(format!("Unsupported endpoint scheme: {}", s)),
        }
    }
}

impl Scheme {
    /// Split an endpoint into its scheme and the remainder after `://`
    pub fn split_endpoint(endpoint: &str) -> Result<(Scheme, &str), String> {
        let (scheme, rest) = endpoint
            .split_once("://")
            .ok_or_else(|| format!("Endpoint '{}' has no scheme", endpoint))?;
        Ok((scheme.parse()?, rest))
    }

    /// Returns true if this scheme negotiates TLS
    pub fn is_tls(&self) -> bool {
        matches!(self, Scheme::Https)
    }
}
