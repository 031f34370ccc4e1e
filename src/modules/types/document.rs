//! Document write metadata

use serde::{Deserialize, Serialize};
use std::fmt;

/// Metadata returned by the server after a document write.
///
/// Field names follow the ArangoDB document attributes (`_key`, `_id`,
/// `_rev`, `_oldRev`) so the struct deserializes straight from API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Document key, unique within its collection
    #[serde(rename = "_key")]
    pub key: String,

    /// Document handle in `collection/key` form
    #[serde(rename = "_id", default)]
    pub id: String,

    /// Revision of the document after the write
    #[serde(rename = "_rev")]
    pub rev: String,

    /// Revision replaced by an update or remove, when reported
    #[serde(rename = "_oldRev", default, skip_serializing_if = "Option::is_none")]
    pub old_rev: Option<String>,
}

impl DocumentMeta {
    /// Create metadata for a freshly written document
    pub fn new(collection: &str, key: impl Into<String>, rev: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            id: format!("{}/{}", collection, key),
            key,
            rev: rev.into(),
            old_rev: None,
        }
    }

    /// Attach the revision this write replaced
    pub fn with_old_rev(mut self, old_rev: impl Into<String>) -> Self {
        self.old_rev = Some(old_rev.into());
        self
    }
}

impl fmt::Display for DocumentMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.rev)
    }
}
