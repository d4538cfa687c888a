//! identdb core library.
//!
//! A synchronous connector between an identity-management host and a
//! relational store of user accounts, credentials, roles and request rights.
//! It provides configuration, SQLite sessions, the property mapping table,
//! the typed [`Connector`] API and the host-facing [`HostConnector`].

pub mod config;
pub mod connector;
pub mod db;
pub mod errors;
pub mod host;
pub mod models;
pub mod properties;

// Re-exports for convenience.
pub use config::{AppConfig, ConnectorConfig};
pub use connector::Connector;
pub use errors::{ConnectorError, ErrorKind};
pub use host::{HostConnector, IdentityConnector};
