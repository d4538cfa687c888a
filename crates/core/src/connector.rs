//! Typed connector API.
//!
//! [`Connector`] turns host-level identity operations into reads and writes
//! against the store. Every operation opens one session from the injected
//! [`SessionFactory`], runs its mutations in a single transaction, and
//! releases the session before returning. Not-found and validation outcomes
//! come back as [`ConnectorError`] values; every outcome is also logged.

use tracing::{debug, error, info, warn};

use crate::config::ConnectorConfig;
use crate::db::{self, queries, schema, SessionFactory};
use crate::errors::ConnectorError;
use crate::models::{
    ParsedPermissionId, Permission, PermissionId, PermissionKind, Property, UserProperty,
    UserToCreate,
};
use crate::properties;

/// Stateless façade over per-call store sessions.
pub struct Connector {
    config: ConnectorConfig,
    sessions: Box<dyn SessionFactory>,
}

impl Connector {
    /// Create a connector over an explicit session factory.
    pub fn new(config: ConnectorConfig, sessions: Box<dyn SessionFactory>) -> Self {
        Self { config, sessions }
    }

    /// Build a connector from configuration and bring the schema up to date.
    pub fn open(config: ConnectorConfig) -> Result<Self, ConnectorError> {
        config.validate()?;
        let sessions = db::factory_for(&config)?;
        let connector = Self::new(config, sessions);
        connector.migrate()?;
        Ok(connector)
    }

    /// Parse the host connection string and open the store it names.
    ///
    /// Configuration errors are returned as-is so the host can treat them as
    /// fatal.
    pub fn start_up(connection_string: &str) -> Result<Self, ConnectorError> {
        let config = ConnectorConfig::from_connection_string(connection_string)?;
        info!(provider = %config.provider, connection = %config.connection, "starting connector");
        Self::open(config)
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Apply pending schema migrations.
    pub fn migrate(&self) -> Result<(), ConnectorError> {
        let session = self.sessions.open()?;
        schema::run_migrations(&session)?;
        Ok(())
    }

    // -- users ------------------------------------------------------------

    /// Create an account and its credential in one transaction.
    pub fn create_user(&self, user: &UserToCreate) -> Result<(), ConnectorError> {
        if user.login.trim().is_empty() {
            return Err(ConnectorError::Validation {
                field: "login".into(),
                detail: "login must not be empty".into(),
            });
        }

        let account = user.to_account();
        let mut session = self.sessions.open()?;
        let result = session.transaction(|conn| -> Result<(), ConnectorError> {
            if queries::account_exists(conn, &account.login)? {
                return Err(ConnectorError::UserAlreadyExists(account.login.clone()));
            }
            queries::insert_account(conn, &account)?;
            queries::insert_credential(conn, &account.login, &user.hashed_password)?;
            Ok(())
        });

        match &result {
            Ok(()) => debug!(login = %account.login, "created user"),
            Err(e) => error!(login = %account.login, error = %e, "failed to create user"),
        }
        result
    }

    /// The fixed catalog of properties the host may address.
    pub fn all_properties(&self) -> Vec<Property> {
        debug!("listing supported properties");
        properties::catalog()
    }

    /// Profile attributes of a user, in fixed order.
    pub fn user_properties(&self, login: &str) -> Result<Vec<UserProperty>, ConnectorError> {
        let session = self.sessions.open()?;
        let Some(account) = queries::find_account(&session, login)? else {
            warn!(login, "requested properties of unknown user");
            return Err(ConnectorError::UserNotFound(login.to_string()));
        };

        let values = properties::ACCESSORS
            .iter()
            .map(|a| UserProperty::new(a.name, (a.get)(&account)))
            .collect();
        debug!(login, "read user properties");
        Ok(values)
    }

    /// Whether an account exists for `login`.
    pub fn user_exists(&self, login: &str) -> Result<bool, ConnectorError> {
        let session = self.sessions.open()?;
        let exists = queries::account_exists(&session, login)?;
        if exists {
            debug!(login, "user found");
        } else {
            warn!(login, "user does not exist");
        }
        Ok(exists)
    }

    /// Apply property changes to a user and save them in one commit.
    ///
    /// Unknown property names are ignored. An unparsable value rejects the
    /// whole batch.
    pub fn update_user_properties(
        &self,
        login: &str,
        changes: &[UserProperty],
    ) -> Result<(), ConnectorError> {
        let mut session = self.sessions.open()?;
        let result = session.transaction(|conn| -> Result<(), ConnectorError> {
            let Some(mut account) = queries::find_account(conn, login)? else {
                return Err(ConnectorError::UserNotFound(login.to_string()));
            };
            for change in changes {
                match properties::accessor(&change.name) {
                    Some(accessor) => (accessor.set)(&mut account, &change.value)?,
                    None => debug!(login, property = %change.name, "ignoring unsupported property"),
                }
            }
            queries::update_account(conn, &account)?;
            Ok(())
        });

        match &result {
            Ok(()) => debug!(login, count = changes.len(), "updated user properties"),
            Err(ConnectorError::UserNotFound(_)) => {
                warn!(login, "tried to update properties of unknown user")
            }
            Err(e) => error!(login, error = %e, "failed to update user properties"),
        }
        result
    }

    // -- permissions ------------------------------------------------------

    /// Every role followed by every request right.
    pub fn all_permissions(&self) -> Result<Vec<Permission>, ConnectorError> {
        let session = self.sessions.open()?;
        let mut permissions: Vec<Permission> = queries::list_catalog(&session, PermissionKind::Role)?
            .into_iter()
            .map(Permission::from)
            .collect();
        permissions.extend(
            queries::list_catalog(&session, PermissionKind::Request)?
                .into_iter()
                .map(Permission::from),
        );
        debug!(count = permissions.len(), "listed all permissions");
        Ok(permissions)
    }

    /// Assign permissions to an existing user.
    ///
    /// The batch is all-or-nothing: a malformed id rolls back every
    /// assignment staged before it. Ids with an unknown kind, or pointing at
    /// a catalog row that does not exist, are skipped.
    pub fn add_user_permissions(&self, login: &str, ids: &[String]) -> Result<(), ConnectorError> {
        self.change_permissions(login, ids, PermissionChange::Add)
    }

    /// Revoke permissions from an existing user, with the same batch rules
    /// as [`add_user_permissions`](Self::add_user_permissions).
    pub fn remove_user_permissions(
        &self,
        login: &str,
        ids: &[String],
    ) -> Result<(), ConnectorError> {
        self.change_permissions(login, ids, PermissionChange::Remove)
    }

    fn change_permissions(
        &self,
        login: &str,
        ids: &[String],
        change: PermissionChange,
    ) -> Result<(), ConnectorError> {
        let mut session = self.sessions.open()?;
        let result = session.transaction(|conn| -> Result<usize, ConnectorError> {
            if !queries::account_exists(conn, login)? {
                return Err(ConnectorError::UserNotFound(login.to_string()));
            }

            let mut applied = 0usize;
            for raw in ids {
                let id = match PermissionId::parse(raw)? {
                    ParsedPermissionId::Known(id) => id,
                    ParsedPermissionId::UnknownKind(kind) => {
                        warn!(login, permission = %raw, kind = %kind, "skipping permission of unknown kind");
                        continue;
                    }
                };
                let changed = match change {
                    PermissionChange::Add => {
                        if !queries::catalog_entry_exists(conn, id)? {
                            warn!(login, permission = %id, "skipping permission missing from catalog");
                            continue;
                        }
                        queries::insert_assignment(conn, login, id)?
                    }
                    PermissionChange::Remove => queries::delete_assignment(conn, login, id)?,
                };
                if changed {
                    applied += 1;
                }
            }
            Ok(applied)
        });

        match &result {
            Ok(applied) => debug!(login, action = change.as_str(), requested = ids.len(), applied, "changed user permissions"),
            Err(ConnectorError::UserNotFound(_)) => {
                warn!(login, action = change.as_str(), "tried to change permissions of unknown user")
            }
            Err(e) => error!(login, action = change.as_str(), error = %e, "failed to change user permissions"),
        }
        result.map(|_| ())
    }

    /// Assigned permissions as `Role:<name>` entries followed by
    /// `Request:<name>` entries. Empty for a user with no assignments or no
    /// account.
    pub fn user_permissions(&self, login: &str) -> Result<Vec<String>, ConnectorError> {
        let session = self.sessions.open()?;
        let mut permissions = Vec::new();
        for kind in [PermissionKind::Role, PermissionKind::Request] {
            permissions.extend(
                queries::list_assigned_names(&session, login, kind)?
                    .into_iter()
                    .map(|name| format!("{kind}:{name}")),
            );
        }
        debug!(login, count = permissions.len(), "read user permissions");
        Ok(permissions)
    }

    // -- catalogs ---------------------------------------------------------

    /// Add a role or request right to its catalog. Returns the catalog id.
    pub fn add_catalog_entry(
        &self,
        kind: PermissionKind,
        id: Option<i64>,
        name: &str,
    ) -> Result<i64, ConnectorError> {
        if name.trim().is_empty() {
            return Err(ConnectorError::Validation {
                field: "name".into(),
                detail: "catalog entry name must not be empty".into(),
            });
        }
        let mut session = self.sessions.open()?;
        let id = session.transaction(|conn| queries::insert_catalog_entry(conn, kind, id, name))?;
        info!(%kind, id, name, "added catalog entry");
        Ok(id)
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
enum PermissionChange {
    Add,
    Remove,
}

impl PermissionChange {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}
