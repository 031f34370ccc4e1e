//! ArangoDB connector for Arangolink
//!
//! This crate provides the [`Connector`] state machine, the per-call
//! [`RequestContext`], and the driver seam it delegates to.
//!
//! ```rust,ignore
//! use arangolink_connector::{Connector, RequestContext};
//! use arangolink_core::ConnectionConfig;
//! use serde_json::json;
//!
//! let cx = RequestContext::background();
//! let config = ConnectionConfig::new("http://localhost:8529", "orders")
//!     .with_credentials("root", "");
//!
//! let mut connector = Connector::http(config);
//! connector.connect(&cx).await?;
//! connector.ensure_database(&cx, "orders").await?;
//! let items = connector.ensure_collection(&cx, "items").await?;
//! let meta = connector.create_document(&cx, &items, &json!({ "sku": "A1" })).await?;
//! ```

pub mod connector;
pub mod context;
pub mod driver;

pub use connector::{CollectionHandle, Connector, ConnectorState};
pub use context::RequestContext;
pub use driver::{Driver, HttpDriver, MemoryDriver};
