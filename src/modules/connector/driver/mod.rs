//! Database drivers for Arangolink
//!
//! The connector reaches the server only through the traits in this module.
//! [`HttpDriver`] talks to ArangoDB over its REST API; [`MemoryDriver`] keeps
//! everything in process for tests and embedding.

mod http;
mod memory;
mod traits;

pub use http::HttpDriver;
pub use memory::{DriverStats, MemoryDriver};
pub use traits::{Client, Collection, Connection, Database, Driver};
