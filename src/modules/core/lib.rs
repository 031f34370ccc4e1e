//! Core domain logic for Arangolink
//!
//! This crate contains the connection configuration model and the error
//! types shared by the parser and connector crates.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{ConnectorError, ServerError};
