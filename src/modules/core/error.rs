//! Error types for Arangolink

use serde::Deserialize;
use std::convert::Infallible;
use std::fmt;
use thiserror::Error;

/// ArangoDB error number for "document not found"
pub const ERROR_DOCUMENT_NOT_FOUND: i64 = 1202;

/// ArangoDB error number for "unique constraint violated"
pub const ERROR_UNIQUE_CONSTRAINT_VIOLATED: i64 = 1210;

/// ArangoDB error number for "database not found"
pub const ERROR_DATABASE_NOT_FOUND: i64 = 1228;

/// ArangoDB error number for "collection or view not found"
pub const ERROR_COLLECTION_NOT_FOUND: i64 = 1203;

/// Error reported by the database server.
///
/// `message` is kept exactly as the server sent it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerError {
    /// HTTP status code of the response
    pub code: u16,

    /// ArangoDB error number
    #[serde(rename = "errorNum", default)]
    pub error_num: i64,

    /// Server error message
    #[serde(rename = "errorMessage", default)]
    pub message: String,
}

impl ServerError {
    pub fn new(code: u16, error_num: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            error_num,
            message: message.into(),
        }
    }

    /// Returns true if the server reported a missing document
    pub fn is_document_not_found(&self) -> bool {
        self.code == 404 && self.error_num == ERROR_DOCUMENT_NOT_FOUND
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (status {}, errorNum {})",
            self.message, self.code, self.error_num
        )
    }
}

/// Main error type for Arangolink operations
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Transport or TLS failure, or no usable endpoint
    #[error("Connection error: {0}")]
    Connection(String),

    /// Credentials rejected by the server
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Client operation attempted before `connect`
    #[error("Not connected: call connect first")]
    NotConnected,

    /// Database operation attempted before a database was opened
    #[error("Database not open: call ensure_database first")]
    DatabaseNotOpen,

    /// Collection operation on a collection this connector has not opened
    #[error("Collection not open: {0}")]
    CollectionNotOpen(String),

    /// Server rejected a database-level request
    #[error("Database error: {0}")]
    Database(ServerError),

    /// Server rejected a collection-level request
    #[error("Collection error: {0}")]
    Collection(ServerError),

    /// Server rejected a document write
    #[error("Write error: {0}")]
    Write(ServerError),

    /// Update or delete of a key that does not exist
    #[error("Document not found: {0}")]
    NotFound(ServerError),

    /// The request context was cancelled
    #[error("Request cancelled")]
    Cancelled,

    /// The request context deadline passed
    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    /// Configuration file parsing error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<Infallible> for ConnectorError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl ConnectorError {
    /// Returns true if this error is a lifecycle precondition violation
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ConnectorError::NotConnected
                | ConnectorError::DatabaseNotOpen
                | ConnectorError::CollectionNotOpen(_)
        )
    }

    /// Returns true if the server rejected a document write
    pub fn is_write_error(&self) -> bool {
        matches!(self, ConnectorError::Write(_) | ConnectorError::NotFound(_))
    }

    /// Returns true if a document write targeted a missing key
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConnectorError::NotFound(_))
    }

    /// The server error behind this error, if any
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            ConnectorError::Database(e)
            | ConnectorError::Collection(e)
            | ConnectorError::Write(e)
            | ConnectorError::NotFound(e) => Some(e),
            _ => None,
        }
    }

    /// Classify a server error returned by a document write
    pub fn from_write(err: ServerError) -> Self {
        if err.is_document_not_found() {
            ConnectorError::NotFound(err)
        } else {
            ConnectorError::Write(err)
        }
    }
}
