//! Connector lifecycle and document operations
//!
//! A [`Connector`] walks through `Uninitialized → Connected → DatabaseOpen →
//! CollectionOpen(n)`. Each stage holds the driver handle produced by the
//! previous one, and every operation checks that the stages it depends on are
//! in place before the driver is called.

use arangolink_core::{ConnectionConfig, ConnectorError};
use arangolink_types::DocumentMeta;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::RequestContext;
use crate::driver::{Client, Collection, Connection, Database, Driver, HttpDriver};

/// Identifies a collection opened by a [`Connector`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    database: String,
    name: String,
}

impl CollectionHandle {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CollectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database, self.name)
    }
}

/// Lifecycle stage of a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Uninitialized,
    Connected,
    DatabaseOpen,
    /// Database open with this many collections opened on it
    CollectionOpen(usize),
}

/// Stateful adapter over a document-database driver
///
/// Not internally synchronized: share it between tasks behind a mutex, or
/// give each worker its own connector.
pub struct Connector {
    config: ConnectionConfig,
    driver: Arc<dyn Driver>,
    connection: Option<Arc<dyn Connection>>,
    client: Option<Arc<dyn Client>>,
    database: Option<Arc<dyn Database>>,
    collections: HashMap<String, Arc<dyn Collection>>,
}

impl Connector {
    /// Create an unconnected connector using `driver`
    pub fn new(config: ConnectionConfig, driver: impl Driver + 'static) -> Self {
        Self {
            config,
            driver: Arc::new(driver),
            connection: None,
            client: None,
            database: None,
            collections: HashMap::new(),
        }
    }

    /// Create an unconnected connector speaking the ArangoDB HTTP API
    pub fn http(config: ConnectionConfig) -> Self {
        Self::new(config, HttpDriver::new())
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectorState {
        match (&self.client, &self.database) {
            (None, _) => ConnectorState::Uninitialized,
            (Some(_), None) => ConnectorState::Connected,
            (Some(_), Some(_)) if self.collections.is_empty() => ConnectorState::DatabaseOpen,
            (Some(_), Some(_)) => ConnectorState::CollectionOpen(self.collections.len()),
        }
    }

    /// Endpoint of the open connection
    pub fn endpoint(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.endpoint())
    }

    /// Name of the open database
    pub fn database_name(&self) -> Option<&str> {
        self.database.as_ref().map(|db| db.name())
    }

    /// Connect to the first reachable endpoint and authenticate
    ///
    /// Empty credentials request anonymous access. Calling this on a
    /// connected connector does nothing.
    pub async fn connect(&mut self, cx: &RequestContext) -> Result<(), ConnectorError> {
        if self.client.is_some() {
            debug!("Connector already connected");
            return Ok(());
        }

        let endpoints: Vec<String> = self.config.endpoints().map(str::to_string).collect();
        if endpoints.is_empty() {
            return Err(ConnectorError::Connection(
                "At least one endpoint URL is required".to_string(),
            ));
        }

        let connection = cx
            .run(
                self.driver
                    .open_connection(&endpoints, self.config.insecure_skip_tls_verify),
            )
            .await?;

        let credentials = self.config.credentials();
        let client = cx.run(connection.client(credentials.as_ref())).await?;

        info!(
            "Connected to {} as {} ({} driver)",
            connection.endpoint(),
            credentials
                .as_ref()
                .map_or("anonymous", |c| c.username.as_str()),
            self.driver.driver_type()
        );

        self.connection = Some(connection);
        self.client = Some(client);
        Ok(())
    }

    fn client(&self) -> Result<Arc<dyn Client>, ConnectorError> {
        self.client.clone().ok_or(ConnectorError::NotConnected)
    }

    fn database(&self) -> Result<Arc<dyn Database>, ConnectorError> {
        self.client()?;
        self.database.clone().ok_or(ConnectorError::DatabaseNotOpen)
    }

    fn collection(&self, handle: &CollectionHandle) -> Result<Arc<dyn Collection>, ConnectorError> {
        let database = self.database()?;
        if database.name() != handle.database {
            return Err(ConnectorError::CollectionNotOpen(handle.to_string()));
        }
        self.collections
            .get(&handle.name)
            .cloned()
            .ok_or_else(|| ConnectorError::CollectionNotOpen(handle.to_string()))
    }

    fn set_database(&mut self, database: Arc<dyn Database>) {
        if self.database_name() != Some(database.name()) {
            self.collections.clear();
        }
        self.database = Some(database);
    }

    fn register_collection(
        &mut self,
        database: &str,
        collection: Arc<dyn Collection>,
    ) -> CollectionHandle {
        let handle = CollectionHandle {
            database: database.to_string(),
            name: collection.name().to_string(),
        };
        self.collections.insert(handle.name.clone(), collection);
        handle
    }

    pub async fn database_exists(
        &self,
        cx: &RequestContext,
        name: &str,
    ) -> Result<bool, ConnectorError> {
        let client = self.client()?;
        let exists = cx.run(client.database_exists(name)).await?;
        debug!("Database {} exists: {}", name, exists);
        Ok(exists)
    }

    /// Open an existing database without creating it
    pub async fn open_database(
        &mut self,
        cx: &RequestContext,
        name: &str,
    ) -> Result<(), ConnectorError> {
        let client = self.client()?;
        let database = cx.run(client.database(name)).await?;
        debug!("Opened database {}", name);
        self.set_database(database);
        Ok(())
    }

    /// Open database `name`, creating it with default options if absent
    ///
    /// Opening a different database than the current one drops the
    /// collections opened on the previous database.
    pub async fn ensure_database(
        &mut self,
        cx: &RequestContext,
        name: &str,
    ) -> Result<(), ConnectorError> {
        let client = self.client()?;

        let database = if cx.run(client.database_exists(name)).await? {
            debug!("Opening existing database {}", name);
            cx.run(client.database(name)).await?
        } else {
            info!("Creating database {}", name);
            cx.run(client.create_database(name)).await?
        };

        self.set_database(database);
        Ok(())
    }

    pub async fn collection_exists(
        &self,
        cx: &RequestContext,
        name: &str,
    ) -> Result<bool, ConnectorError> {
        let database = self.database()?;
        let exists = cx.run(database.collection_exists(name)).await?;
        debug!("Collection {}/{} exists: {}", database.name(), name, exists);
        Ok(exists)
    }

    /// Open an existing collection of the open database without creating it
    pub async fn open_collection(
        &mut self,
        cx: &RequestContext,
        name: &str,
    ) -> Result<CollectionHandle, ConnectorError> {
        let database = self.database()?;
        let collection = cx.run(database.collection(name)).await?;
        debug!("Opened collection {}/{}", database.name(), name);
        Ok(self.register_collection(database.name(), collection))
    }

    /// Open collection `name` of the open database, creating it if absent
    pub async fn ensure_collection(
        &mut self,
        cx: &RequestContext,
        name: &str,
    ) -> Result<CollectionHandle, ConnectorError> {
        let database = self.database()?;

        let collection = if cx.run(database.collection_exists(name)).await? {
            debug!("Opening existing collection {}/{}", database.name(), name);
            cx.run(database.collection(name)).await?
        } else {
            info!("Creating collection {}/{}", database.name(), name);
            cx.run(database.create_collection(name)).await?
        };

        Ok(self.register_collection(database.name(), collection))
    }

    /// Connect, then ensure the configured database and collection
    ///
    /// Returns the collection handle when the config names a collection.
    pub async fn ensure_configured(
        &mut self,
        cx: &RequestContext,
    ) -> Result<Option<CollectionHandle>, ConnectorError> {
        self.connect(cx).await?;

        let database_name = self.config.database_name.clone();
        self.ensure_database(cx, &database_name).await?;

        match self.config.collection_name.clone() {
            Some(name) => Ok(Some(self.ensure_collection(cx, &name).await?)),
            None => Ok(None),
        }
    }

    /// Insert a document into the collection identified by `handle`
    pub async fn create_document<T>(
        &self,
        cx: &RequestContext,
        handle: &CollectionHandle,
        document: &T,
    ) -> Result<DocumentMeta, ConnectorError>
    where
        T: Serialize + ?Sized,
    {
        let collection = self.collection(handle)?;
        let document = serde_json::to_value(document)?;

        let meta = cx.run(collection.create_document(&document)).await?;
        debug!("Created document {}", meta);
        Ok(meta)
    }

    /// Merge `document` into the document stored under `key`
    pub async fn update_document<T>(
        &self,
        cx: &RequestContext,
        handle: &CollectionHandle,
        key: &str,
        document: &T,
    ) -> Result<DocumentMeta, ConnectorError>
    where
        T: Serialize + ?Sized,
    {
        let collection = self.collection(handle)?;
        require_key(key)?;
        let document = serde_json::to_value(document)?;

        let meta = cx.run(collection.update_document(key, &document)).await?;
        debug!("Updated document {}", meta);
        Ok(meta)
    }

    /// Remove the document stored under `key`, returning its last revision
    pub async fn delete_document(
        &self,
        cx: &RequestContext,
        handle: &CollectionHandle,
        key: &str,
    ) -> Result<DocumentMeta, ConnectorError> {
        let collection = self.collection(handle)?;
        require_key(key)?;

        let meta = cx.run(collection.remove_document(key)).await?;
        debug!("Removed document {}", meta);
        Ok(meta)
    }

    /// Release the connector
    ///
    /// Dropping the handles is all there is to do: the driver owns the
    /// underlying transport and closes it on its own.
    pub fn close(self) -> Result<(), Infallible> {
        debug!("Closing connector in state {:?}", self.state());
        Ok(())
    }
}

fn require_key(key: &str) -> Result<(), ConnectorError> {
    if key.is_empty() {
        return Err(ConnectorError::Validation(
            "Document key cannot be empty".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("config", &self.config)
            .field("driver", &self.driver.driver_type())
            .field("state", &self.state())
            .field("endpoint", &self.endpoint())
            .field("database", &self.database_name())
            .finish()
    }
}
