//! Driver trait definitions
//!
//! The connector never talks to the server itself. Each stage of the
//! lifecycle is delegated to one of these handles, which a driver
//! implementation hands out in order: connection, client, database,
//! collection.

use arangolink_core::{ConnectorError, Credentials};
use arangolink_types::DocumentMeta;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Entry point of a driver implementation
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a transport to the first reachable endpoint
    ///
    /// # Arguments
    /// * `endpoints` - Endpoint URLs in preference order (never empty)
    /// * `insecure_skip_tls_verify` - Accept any certificate on TLS endpoints
    async fn open_connection(
        &self,
        endpoints: &[String],
        insecure_skip_tls_verify: bool,
    ) -> Result<Arc<dyn Connection>, ConnectorError>;

    /// Get the driver type name
    fn driver_type(&self) -> &'static str;
}

/// Open transport-level connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// The endpoint this connection talks to
    fn endpoint(&self) -> &str;

    /// Create a client, authenticating when credentials are given
    ///
    /// `None` requests anonymous access; it succeeds only if the server
    /// allows it.
    async fn client(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn Client>, ConnectorError>;
}

/// Authenticated client
#[async_trait]
pub trait Client: Send + Sync {
    async fn database_exists(&self, name: &str) -> Result<bool, ConnectorError>;

    /// Create a database with default options and open it
    async fn create_database(&self, name: &str) -> Result<Arc<dyn Database>, ConnectorError>;

    /// Open an existing database
    async fn database(&self, name: &str) -> Result<Arc<dyn Database>, ConnectorError>;
}

/// Open database
#[async_trait]
pub trait Database: Send + Sync {
    fn name(&self) -> &str;

    async fn collection_exists(&self, name: &str) -> Result<bool, ConnectorError>;

    /// Create a document collection with default options and open it
    async fn create_collection(&self, name: &str) -> Result<Arc<dyn Collection>, ConnectorError>;

    /// Open an existing collection
    async fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, ConnectorError>;
}

/// Open document collection
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Insert a document; the server assigns `_key` unless the document has one
    async fn create_document(&self, document: &Value) -> Result<DocumentMeta, ConnectorError>;

    /// Merge `patch` into the document stored under `key`
    async fn update_document(
        &self,
        key: &str,
        patch: &Value,
    ) -> Result<DocumentMeta, ConnectorError>;

    /// Remove the document stored under `key`
    async fn remove_document(&self, key: &str) -> Result<DocumentMeta, ConnectorError>;
}
