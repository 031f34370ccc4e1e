//! In-process driver backed by a shared in-memory store
//!
//! Behaves like a single ArangoDB server for the operations the connector
//! uses, including its error numbers and messages, and counts every call it
//! receives. Clones share the same store and counters.

use arangolink_core::error::{
    ERROR_COLLECTION_NOT_FOUND, ERROR_DATABASE_NOT_FOUND, ERROR_DOCUMENT_NOT_FOUND,
    ERROR_UNIQUE_CONSTRAINT_VIOLATED,
};
use arangolink_core::{ConnectorError, Credentials, ServerError};
use arangolink_types::DocumentMeta;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::http::normalize_endpoint;
use super::traits::{Client, Collection, Connection, Database, Driver};

const ERROR_DUPLICATE_NAME: i64 = 1207;
const ERROR_DOCUMENT_TYPE_INVALID: i64 = 1227;
const ERROR_FORBIDDEN: i64 = 11;

const SYSTEM_DATABASE: &str = "_system";

/// Counters of driver calls, shared by every handle of a MemoryDriver
#[derive(Debug, Default)]
pub struct DriverStats {
    calls: AtomicUsize,
    database_creates: AtomicUsize,
    collection_creates: AtomicUsize,
    document_writes: AtomicUsize,
}

impl DriverStats {
    /// Total number of driver calls of any kind
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn database_creates(&self) -> usize {
        self.database_creates.load(Ordering::SeqCst)
    }

    pub fn collection_creates(&self) -> usize {
        self.collection_creates.load(Ordering::SeqCst)
    }

    pub fn document_writes(&self) -> usize {
        self.document_writes.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct StoredCollection {
    documents: BTreeMap<String, Map<String, Value>>,
    next_key: u64,
}

struct ServerState {
    users: HashMap<String, String>,
    allow_anonymous: bool,
    allow_database_creation: bool,
    unreachable: HashSet<String>,
    databases: HashMap<String, HashMap<String, StoredCollection>>,
}

struct MemoryServer {
    state: Mutex<ServerState>,
    stats: DriverStats,
}

impl MemoryServer {
    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Driver keeping databases, collections and documents in memory
#[derive(Clone)]
pub struct MemoryDriver {
    server: Arc<MemoryServer>,
}

impl MemoryDriver {
    /// Create a server with a `root` user (empty password), anonymous access
    /// allowed and only the `_system` database
    pub fn new() -> Self {
        let mut users = HashMap::new();
        users.insert("root".to_string(), String::new());

        let mut databases = HashMap::new();
        databases.insert(SYSTEM_DATABASE.to_string(), HashMap::new());

        Self {
            server: Arc::new(MemoryServer {
                state: Mutex::new(ServerState {
                    users,
                    allow_anonymous: true,
                    allow_database_creation: true,
                    unreachable: HashSet::new(),
                    databases,
                }),
                stats: DriverStats::default(),
            }),
        }
    }

    /// Add or replace a user
    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.server
            .lock()
            .users
            .insert(username.to_string(), password.to_string());
        self
    }

    /// Require credentials on every request
    pub fn deny_anonymous(self) -> Self {
        self.server.lock().allow_anonymous = false;
        self
    }

    /// Reject database creation with 403, as for a user without
    /// administrative rights
    pub fn deny_database_creation(self) -> Self {
        self.server.lock().allow_database_creation = false;
        self
    }

    /// Make connection attempts to `endpoint` fail
    pub fn with_unreachable(self, endpoint: &str) -> Self {
        self.server.lock().unreachable.insert(endpoint.to_string());
        self
    }

    /// Pre-create a collection, creating its database when needed
    pub fn with_collection(self, database: &str, name: &str) -> Self {
        self.server
            .lock()
            .databases
            .entry(database.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default();
        self
    }

    pub fn stats(&self) -> &DriverStats {
        &self.server.stats
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.server.lock().databases.contains_key(name)
    }

    pub fn has_collection(&self, database: &str, name: &str) -> bool {
        self.server
            .lock()
            .databases
            .get(database)
            .is_some_and(|db| db.contains_key(name))
    }

    /// Stored document, system attributes included
    pub fn document(&self, database: &str, collection: &str, key: &str) -> Option<Value> {
        self.server
            .lock()
            .databases
            .get(database)
            .and_then(|db| db.get(collection))
            .and_then(|c| c.documents.get(key))
            .map(|doc| Value::Object(doc.clone()))
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn new_rev() -> String {
    format!("_{}", Uuid::new_v4().simple())
}

fn database_not_found() -> ServerError {
    ServerError::new(404, ERROR_DATABASE_NOT_FOUND, "database not found")
}

fn collection_not_found() -> ServerError {
    ServerError::new(404, ERROR_COLLECTION_NOT_FOUND, "collection or view not found")
}

fn document_not_found() -> ServerError {
    ServerError::new(404, ERROR_DOCUMENT_NOT_FOUND, "document not found")
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn open_connection(
        &self,
        endpoints: &[String],
        _insecure_skip_tls_verify: bool,
    ) -> Result<Arc<dyn Connection>, ConnectorError> {
        self.server.stats.hit();

        let mut last_error = "No endpoints configured".to_string();
        for endpoint in endpoints {
            if let Err(e) = normalize_endpoint(endpoint) {
                last_error = e.to_string();
                continue;
            }
            if self.server.lock().unreachable.contains(endpoint) {
                last_error = format!("Request to {} failed: connection refused", endpoint);
                continue;
            }
            return Ok(Arc::new(MemoryConnection {
                server: self.server.clone(),
                endpoint: endpoint.clone(),
            }));
        }

        Err(ConnectorError::Connection(format!(
            "No reachable endpoint: {}",
            last_error
        )))
    }

    fn driver_type(&self) -> &'static str {
        "memory"
    }
}

struct MemoryConnection {
    server: Arc<MemoryServer>,
    endpoint: String,
}

#[async_trait]
impl Connection for MemoryConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn client(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn Client>, ConnectorError> {
        self.server.stats.hit();

        let state = self.server.lock();
        let authorized = match credentials {
            Some(c) => state.users.get(&c.username) == Some(&c.password),
            None => state.allow_anonymous,
        };
        if !authorized {
            return Err(ConnectorError::Authentication(
                "not authorized to execute this request".to_string(),
            ));
        }

        Ok(Arc::new(MemoryClient {
            server: self.server.clone(),
        }))
    }
}

struct MemoryClient {
    server: Arc<MemoryServer>,
}

impl MemoryClient {
    fn database_handle(&self, name: &str) -> Arc<dyn Database> {
        Arc::new(MemoryDatabase {
            server: self.server.clone(),
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl Client for MemoryClient {
    async fn database_exists(&self, name: &str) -> Result<bool, ConnectorError> {
        self.server.stats.hit();
        Ok(self.server.lock().databases.contains_key(name))
    }

    async fn create_database(&self, name: &str) -> Result<Arc<dyn Database>, ConnectorError> {
        self.server.stats.hit();

        let mut state = self.server.lock();
        if !state.allow_database_creation {
            return Err(ConnectorError::Database(ServerError::new(
                403,
                ERROR_FORBIDDEN,
                "forbidden",
            )));
        }
        if state.databases.contains_key(name) {
            return Err(ConnectorError::Database(ServerError::new(
                409,
                ERROR_DUPLICATE_NAME,
                "duplicate database name",
            )));
        }
        state.databases.insert(name.to_string(), HashMap::new());
        self.server
            .stats
            .database_creates
            .fetch_add(1, Ordering::SeqCst);

        Ok(self.database_handle(name))
    }

    async fn database(&self, name: &str) -> Result<Arc<dyn Database>, ConnectorError> {
        self.server.stats.hit();

        if !self.server.lock().databases.contains_key(name) {
            return Err(ConnectorError::Database(database_not_found()));
        }
        Ok(self.database_handle(name))
    }
}

struct MemoryDatabase {
    server: Arc<MemoryServer>,
    name: String,
}

impl MemoryDatabase {
    fn collection_handle(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(MemoryCollection {
            server: self.server.clone(),
            database: self.name.clone(),
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, ConnectorError> {
        self.server.stats.hit();

        let state = self.server.lock();
        let db = state
            .databases
            .get(&self.name)
            .ok_or_else(|| ConnectorError::Collection(database_not_found()))?;
        Ok(db.contains_key(name))
    }

    async fn create_collection(
        &self,
        name: &str,
    ) -> Result<Arc<dyn Collection>, ConnectorError> {
        self.server.stats.hit();

        if name.is_empty() {
            return Err(ConnectorError::Collection(ServerError::new(
                400,
                1208,
                "illegal name",
            )));
        }

        let mut state = self.server.lock();
        let db = state
            .databases
            .get_mut(&self.name)
            .ok_or_else(|| ConnectorError::Collection(database_not_found()))?;
        if db.contains_key(name) {
            return Err(ConnectorError::Collection(ServerError::new(
                409,
                ERROR_DUPLICATE_NAME,
                "duplicate name",
            )));
        }
        db.insert(name.to_string(), StoredCollection::default());
        self.server
            .stats
            .collection_creates
            .fetch_add(1, Ordering::SeqCst);

        Ok(self.collection_handle(name))
    }

    async fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, ConnectorError> {
        self.server.stats.hit();

        let exists = self
            .server
            .lock()
            .databases
            .get(&self.name)
            .is_some_and(|db| db.contains_key(name));
        if !exists {
            return Err(ConnectorError::Collection(collection_not_found()));
        }
        Ok(self.collection_handle(name))
    }
}

struct MemoryCollection {
    server: Arc<MemoryServer>,
    database: String,
    name: String,
}

impl MemoryCollection {
    /// Run `f` against the stored collection, counting one document write
    fn write<F>(&self, f: F) -> Result<DocumentMeta, ConnectorError>
    where
        F: FnOnce(&mut StoredCollection) -> Result<DocumentMeta, ServerError>,
    {
        self.server.stats.hit();
        self.server
            .stats
            .document_writes
            .fetch_add(1, Ordering::SeqCst);

        let mut state = self.server.lock();
        let collection = state
            .databases
            .get_mut(&self.database)
            .and_then(|db| db.get_mut(&self.name))
            .ok_or_else(|| ConnectorError::Write(collection_not_found()))?;
        f(collection).map_err(ConnectorError::from_write)
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, ServerError> {
    value
        .as_object()
        .ok_or_else(|| ServerError::new(400, ERROR_DOCUMENT_TYPE_INVALID, "invalid document type"))
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_document(&self, document: &Value) -> Result<DocumentMeta, ConnectorError> {
        self.write(|collection| {
            let fields = as_object(document)?;

            let key = match fields.get("_key") {
                Some(Value::String(key)) if !key.is_empty() => key.clone(),
                Some(_) => return Err(ServerError::new(400, 1221, "illegal document key")),
                None => loop {
                    collection.next_key += 1;
                    let key = collection.next_key.to_string();
                    if !collection.documents.contains_key(&key) {
                        break key;
                    }
                },
            };

            if collection.documents.contains_key(&key) {
                return Err(ServerError::new(
                    409,
                    ERROR_UNIQUE_CONSTRAINT_VIOLATED,
                    format!(
                        "unique constraint violated - in index primary of type primary over '_key'; conflicting key: {}",
                        key
                    ),
                ));
            }

            let meta = DocumentMeta::new(&self.name, key.clone(), new_rev());
            let mut stored = fields.clone();
            stored.insert("_key".into(), Value::String(meta.key.clone()));
            stored.insert("_id".into(), Value::String(meta.id.clone()));
            stored.insert("_rev".into(), Value::String(meta.rev.clone()));
            collection.documents.insert(key, stored);

            Ok(meta)
        })
    }

    async fn update_document(
        &self,
        key: &str,
        patch: &Value,
    ) -> Result<DocumentMeta, ConnectorError> {
        self.write(|collection| {
            let fields = as_object(patch)?;
            let stored = collection
                .documents
                .get_mut(key)
                .ok_or_else(document_not_found)?;

            let old_rev = stored
                .get("_rev")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            for (field, value) in fields {
                if !matches!(field.as_str(), "_key" | "_id" | "_rev") {
                    stored.insert(field.clone(), value.clone());
                }
            }

            let meta = DocumentMeta::new(&self.name, key, new_rev()).with_old_rev(old_rev);
            stored.insert("_rev".into(), Value::String(meta.rev.clone()));
            Ok(meta)
        })
    }

    async fn remove_document(&self, key: &str) -> Result<DocumentMeta, ConnectorError> {
        self.write(|collection| {
            let removed = collection
                .documents
                .remove(key)
                .ok_or_else(document_not_found)?;
            let rev = removed
                .get("_rev")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(DocumentMeta::new(&self.name, key, rev))
        })
    }
}
