//! Type definitions for Arangolink
//!
//! This crate contains value types shared across the Arangolink workspace:
//! document write metadata and endpoint schemes.

pub mod document;
pub mod scheme;

pub use document::DocumentMeta;
pub use scheme::Scheme;
