//! Host-facing connector contract.
//!
//! The identity host drives connectors through [`IdentityConnector`]: a
//! fixed set of calls with no failure channel besides the log. Only
//! `start_up` can fail. [`HostConnector`] implements the contract on top of
//! the typed [`Connector`]. Each failure is logged and then reduced to an
//! empty result or a no-op.

use tracing::{error, warn};

use crate::connector::Connector;
use crate::errors::{ConnectorError, ErrorKind};
use crate::models::{Permission, Property, UserProperty, UserToCreate};

/// The call surface an identity host expects from a connector.
pub trait IdentityConnector {
    fn start_up(&mut self, connection_string: &str) -> Result<(), ConnectorError>;
    fn create_user(&self, user: &UserToCreate);
    fn get_all_properties(&self) -> Vec<Property>;
    fn get_user_properties(&self, login: &str) -> Vec<UserProperty>;
    fn is_user_exists(&self, login: &str) -> bool;
    fn update_user_properties(&self, properties: &[UserProperty], login: &str);
    fn get_all_permissions(&self) -> Vec<Permission>;
    fn add_user_permissions(&self, login: &str, permission_ids: &[String]);
    fn remove_user_permissions(&self, login: &str, permission_ids: &[String]);
    fn get_user_permissions(&self, login: &str) -> Vec<String>;
}

/// [`IdentityConnector`] over a lazily started [`Connector`].
#[derive(Debug, Default)]
pub struct HostConnector {
    inner: Option<Connector>,
}

impl HostConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already configured connector.
    pub fn with_connector(connector: Connector) -> Self {
        Self {
            inner: Some(connector),
        }
    }

    /// The typed connector, once started.
    pub fn connector(&self) -> Option<&Connector> {
        self.inner.as_ref()
    }

    fn call<T>(
        &self,
        operation: &'static str,
        fallback: T,
        f: impl FnOnce(&Connector) -> Result<T, ConnectorError>,
    ) -> T {
        let Some(connector) = &self.inner else {
            error!(operation, "connector called before start_up");
            return fallback;
        };
        match f(connector) {
            Ok(value) => value,
            // Not-found outcomes were already logged as warnings by the
            // typed layer.
            Err(e) if e.kind() == ErrorKind::NotFound => fallback,
            Err(e) => {
                error!(operation, error = %e, "connector operation failed");
                fallback
            }
        }
    }
}

impl IdentityConnector for HostConnector {
    fn start_up(&mut self, connection_string: &str) -> Result<(), ConnectorError> {
        if self.inner.is_some() {
            warn!("connector restarted; replacing previous store");
        }
        self.inner = Some(Connector::start_up(connection_string)?);
        Ok(())
    }

    fn create_user(&self, user: &UserToCreate) {
        self.call("create_user", (), |c| c.create_user(user))
    }

    fn get_all_properties(&self) -> Vec<Property> {
        match &self.inner {
            Some(connector) => connector.all_properties(),
            None => crate::properties::catalog(),
        }
    }

    fn get_user_properties(&self, login: &str) -> Vec<UserProperty> {
        self.call("get_user_properties", Vec::new(), |c| c.user_properties(login))
    }

    fn is_user_exists(&self, login: &str) -> bool {
        self.call("is_user_exists", false, |c| c.user_exists(login))
    }

    fn update_user_properties(&self, properties: &[UserProperty], login: &str) {
        self.call("update_user_properties", (), |c| {
            c.update_user_properties(login, properties)
        })
    }

    fn get_all_permissions(&self) -> Vec<Permission> {
        self.call("get_all_permissions", Vec::new(), |c| c.all_permissions())
    }

    fn add_user_permissions(&self, login: &str, permission_ids: &[String]) {
        self.call("add_user_permissions", (), |c| {
            c.add_user_permissions(login, permission_ids)
        })
    }

    fn remove_user_permissions(&self, login: &str, permission_ids: &[String]) {
        self.call("remove_user_permissions", (), |c| {
            c.remove_user_permissions(login, permission_ids)
        })
    }

    fn get_user_permissions(&self, login: &str) -> Vec<String> {
        self.call("get_user_permissions", Vec::new(), |c| c.user_permissions(login))
    }
}
