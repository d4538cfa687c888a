//! Connector configuration.
//!
//! A [`ConnectorConfig`] is either loaded from a TOML file (the admin CLI
//! does this) or parsed from the host's connection string, which looks like
//! `ConnectionString='<target>';Provider='<name>';`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

/// Target that selects an in-memory database instead of a file.
pub const MEMORY_TARGET: &str = ":memory:";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub connector: ConnectorConfig,
}

/// Database provider supported by this build.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Sqlite,
}

impl Provider {
    /// Parse a host provider name such as `SQLite` or `SQLite.3`.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        let family = name.split('.').next().unwrap_or_default().trim();
        if family.eq_ignore_ascii_case("sqlite") {
            Ok(Self::Sqlite)
        } else {
            Err(ConfigError::UnsupportedProvider(name.to_string()))
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Settings needed to open store sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default)]
    pub provider: Provider,

    /// Database file path, or `:memory:`.
    pub connection: String,

    /// How long a session waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Minimum tracing level used by binaries embedding the connector.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_log_level() -> String {
    "info".into()
}

impl ConnectorConfig {
    /// Config for a database file at `path` with default settings.
    pub fn sqlite<P: AsRef<Path>>(path: P) -> Self {
        Self {
            provider: Provider::Sqlite,
            connection: path.as_ref().display().to_string(),
            busy_timeout_ms: default_busy_timeout_ms(),
            log_level: default_log_level(),
        }
    }

    /// Config for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::sqlite(MEMORY_TARGET)
    }

    /// Parse the host's `Key='value';` connection string.
    ///
    /// `ConnectionString` and `Provider` are required; other keys (such as
    /// `SchemaName`) are accepted and ignored.
    pub fn from_connection_string(input: &str) -> Result<Self, ConfigError> {
        let pairs = parse_pairs(input)?;
        let connection = pairs
            .get("connectionstring")
            .ok_or_else(|| ConfigError::MissingKey("ConnectionString".into()))?;
        let provider = pairs
            .get("provider")
            .ok_or_else(|| ConfigError::MissingKey("Provider".into()))?;

        let config = Self {
            provider: Provider::parse(provider)?,
            connection: connection.clone(),
            busy_timeout_ms: default_busy_timeout_ms(),
            log_level: default_log_level(),
        };
        config.validate()?;
        debug!(provider = %config.provider, connection = %config.connection, "parsed connection string");
        Ok(config)
    }

    /// Whether sessions should share one in-memory database.
    pub fn is_memory(&self) -> bool {
        self.connection == MEMORY_TARGET
    }

    /// Database file path for file-backed configs.
    pub fn database_path(&self) -> Option<PathBuf> {
        (!self.is_memory()).then(|| PathBuf::from(&self.connection))
    }

    /// Validate that required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "connector.connection".into(),
                detail: "connection target must not be empty".into(),
            });
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connector.busy_timeout_ms".into(),
                detail: "busy timeout must be > 0".into(),
            });
        }
        Ok(())
    }
}

/// Split `Key='value';Key2=value2;` into a lowercase-keyed map.
///
/// Quoted values may contain `;`. A doubled quote inside a quoted value is
/// an escaped quote.
fn parse_pairs(input: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut pairs = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ';') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        let mut has_value = false;
        for c in chars.by_ref() {
            if c == '=' {
                has_value = true;
                break;
            }
            if c == ';' {
                break;
            }
            key.push(c);
        }
        if !has_value {
            return Err(ConfigError::ParseError(format!(
                "expected '=' after key '{}'",
                key.trim()
            )));
        }
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(ConfigError::ParseError("empty key in connection string".into()));
        }

        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'\'') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                if c == '\'' {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        value.push('\'');
                        continue;
                    }
                    closed = true;
                    break;
                }
                value.push(c);
            }
            if !closed {
                return Err(ConfigError::ParseError(format!(
                    "unterminated quote in value of '{key}'"
                )));
            }
            while matches!(chars.peek(), Some(c) if *c != ';') {
                let c = chars.next().unwrap_or(';');
                if !c.is_whitespace() {
                    return Err(ConfigError::ParseError(format!(
                        "unexpected '{c}' after quoted value of '{key}'"
                    )));
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ';' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        pairs.insert(key, value);
    }

    Ok(pairs)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.connector.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[connector]
provider = "sqlite"
connection = "/var/lib/identdb/identdb.db"
busy_timeout_ms = 2500
log_level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.connector.provider, Provider::Sqlite);
        assert_eq!(config.connector.connection, "/var/lib/identdb/identdb.db");
        assert_eq!(config.connector.busy_timeout_ms, 2500);
        assert_eq!(config.connector.log_level, "debug");
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[connector]
connection = "identdb.db"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.connector.provider, Provider::Sqlite);
        assert_eq!(config.connector.busy_timeout_ms, 5000);
        assert_eq!(config.connector.log_level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identdb.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_and_validate(&path).expect("load failed");
        assert_eq!(config.connector.log_level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/identdb.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_connection_string_quoted() {
        let config = ConnectorConfig::from_connection_string(
            "ConnectionString='/tmp/store.db';Provider='SQLite';SchemaName='TestTaskSchema';",
        )
        .unwrap();
        assert_eq!(config.provider, Provider::Sqlite);
        assert_eq!(config.connection, "/tmp/store.db");
        assert_eq!(config.database_path(), Some(PathBuf::from("/tmp/store.db")));
    }

    #[test]
    fn test_connection_string_semicolon_inside_quotes() {
        let config = ConnectorConfig::from_connection_string(
            "provider=sqlite.3; connectionstring = 'dir;with;semis/it''s.db'",
        )
        .unwrap();
        assert_eq!(config.connection, "dir;with;semis/it's.db");
    }

    #[test]
    fn test_connection_string_memory() {
        let config =
            ConnectorConfig::from_connection_string("ConnectionString=:memory:;Provider=SQLite")
                .unwrap();
        assert!(config.is_memory());
        assert_eq!(config.database_path(), None);
    }

    #[test]
    fn test_connection_string_missing_keys() {
        let result = ConnectorConfig::from_connection_string("Provider='SQLite';");
        assert!(matches!(result, Err(ConfigError::MissingKey(ref k)) if k == "ConnectionString"));

        let result = ConnectorConfig::from_connection_string("ConnectionString='a.db';");
        assert!(matches!(result, Err(ConfigError::MissingKey(ref k)) if k == "Provider"));
    }

    #[test]
    fn test_connection_string_unsupported_provider() {
        let result = ConnectorConfig::from_connection_string(
            "ConnectionString='Server=127.0.0.1;Port=5432';Provider='PostgreSQL.9.5';",
        );
        assert!(matches!(result, Err(ConfigError::UnsupportedProvider(ref p)) if p == "PostgreSQL.9.5"));
    }

    #[test]
    fn test_connection_string_malformed() {
        assert!(matches!(
            ConnectorConfig::from_connection_string("ConnectionString='a.db;Provider=SQLite"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            ConnectorConfig::from_connection_string("garbage;Provider=SQLite"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            ConnectorConfig::from_connection_string("Provider=SQLite;trailing"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            ConnectorConfig::from_connection_string("ConnectionString='';Provider=SQLite"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = ConnectorConfig::sqlite("x.db");
        config.busy_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "connector.busy_timeout_ms"
        ));
    }
}
