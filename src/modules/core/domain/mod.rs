//! Domain models for Arangolink configuration

mod config;

pub use config::{ConnectionConfig, Credentials};
