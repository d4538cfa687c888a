//! Error types for the identdb core library.
//!
//! Configuration and persistence failures have their own `thiserror` enums.
//! [`ConnectorError`] is the typed result every connector operation returns,
//! and [`ErrorKind`] groups its variants for callers that only need to
//! branch on the category.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Connector errors
// ---------------------------------------------------------------------------

/// Outcome of a failed connector operation.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// An operation was invoked before `start_up` configured the store.
    #[error("connector has not been started")]
    NotStarted,

    /// No account row exists for the login.
    #[error("user '{0}' not found")]
    UserNotFound(String),

    /// An account row already exists for the login.
    #[error("user '{0}' already exists")]
    UserAlreadyExists(String),

    /// Input rejected before touching the store.
    #[error("validation failed for '{field}': {detail}")]
    Validation {
        field: String,
        detail: String,
    },

    /// A permission id did not have the `<Kind>:<Id>` shape.
    #[error("invalid permission id '{id}': {detail}")]
    InvalidPermissionId {
        id: String,
        detail: String,
    },

    /// A property value could not be converted to the column type.
    #[error("invalid value '{value}' for property '{property}'")]
    InvalidPropertyValue {
        property: String,
        value: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Coarse category of a [`ConnectorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Persistence,
    Configuration,
}

impl ConnectorError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_) => ErrorKind::NotFound,
            Self::UserAlreadyExists(_)
            | Self::Validation { .. }
            | Self::InvalidPermissionId { .. }
            | Self::InvalidPropertyValue { .. } => ErrorKind::Validation,
            Self::Database(DatabaseError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Database(_) => ErrorKind::Persistence,
            Self::NotStarted | Self::Config(_) => ErrorKind::Configuration,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and connection-string parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML or connection-string syntax error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required connection-string key is absent.
    #[error("connection string is missing required key '{0}'")]
    MissingKey(String),

    /// The provider is not one this build can open.
    #[error("unsupported database provider '{0}'")]
    UnsupportedProvider(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed {
        version: u32,
        detail: String,
    },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
