//! Domain model types shared by the store, the connector and the host
//! adapter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConnectorError;

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// A row from the `users` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub telephone_number: String,
    pub is_lead: bool,
}

/// Descriptor for a new account plus its pre-hashed credential.
///
/// Unset profile fields are stored as empty strings, an unset lead flag as
/// `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToCreate {
    pub login: String,
    pub hashed_password: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub telephone_number: Option<String>,
    pub is_lead: Option<bool>,
}

impl UserToCreate {
    pub fn new(login: impl Into<String>, hashed_password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            hashed_password: hashed_password.into(),
            ..Default::default()
        }
    }

    /// Build a descriptor from host properties, using the same name table as
    /// property updates. Unknown names are ignored.
    pub fn from_properties(
        login: impl Into<String>,
        hashed_password: impl Into<String>,
        properties: &[UserProperty],
    ) -> Result<Self, ConnectorError> {
        let login = login.into();
        let mut account = Account {
            login: login.clone(),
            ..Default::default()
        };
        let mut seen = Vec::new();
        for property in properties {
            if let Some(accessor) = crate::properties::accessor(&property.name) {
                (accessor.set)(&mut account, &property.value)?;
                seen.push(accessor.name);
            }
        }

        let pick = |name: &'static str, value: String| seen.contains(&name).then_some(value);
        Ok(Self {
            login,
            hashed_password: hashed_password.into(),
            first_name: pick(crate::properties::FIRST_NAME, account.first_name),
            middle_name: pick(crate::properties::MIDDLE_NAME, account.middle_name),
            last_name: pick(crate::properties::LAST_NAME, account.last_name),
            telephone_number: pick(crate::properties::TELEPHONE_NUMBER, account.telephone_number),
            is_lead: seen
                .contains(&crate::properties::IS_LEAD)
                .then_some(account.is_lead),
        })
    }

    /// The account row this descriptor creates.
    pub fn to_account(&self) -> Account {
        Account {
            login: self.login.clone(),
            first_name: self.first_name.clone().unwrap_or_default(),
            middle_name: self.middle_name.clone().unwrap_or_default(),
            last_name: self.last_name.clone().unwrap_or_default(),
            telephone_number: self.telephone_number.clone().unwrap_or_default(),
            is_lead: self.is_lead.unwrap_or(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// An attribute the host may read or write, with its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub description: String,
}

impl Property {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A named attribute value for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProperty {
    pub name: String,
    pub value: String,
}

impl UserProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Label of permissions backed by the role catalog.
pub const ROLE_CATEGORY: &str = "Роль исполнителя";
/// Label of permissions backed by the request-right catalog.
pub const REQUEST_RIGHT_CATEGORY: &str = "Право по изменению заявок";

/// Which catalog and junction table a permission id targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionKind {
    Role,
    Request,
}

impl PermissionKind {
    /// Parse the tag before the `:` of a permission id.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Role" => Some(Self::Role),
            "Request" => Some(Self::Request),
            _ => None,
        }
    }

    /// Human-readable category of permissions of this kind.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Role => ROLE_CATEGORY,
            Self::Request => REQUEST_RIGHT_CATEGORY,
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role => write!(f, "Role"),
            Self::Request => write!(f, "Request"),
        }
    }
}

/// A parsed `"<Kind>:<Id>"` permission id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionId {
    pub kind: PermissionKind,
    pub id: i64,
}

/// Result of parsing a permission id whose shape is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPermissionId {
    Known(PermissionId),
    /// The tag names no catalog; callers skip these.
    UnknownKind(String),
}

impl PermissionId {
    pub fn new(kind: PermissionKind, id: i64) -> Self {
        Self { kind, id }
    }

    /// Parse `raw`, distinguishing an unrecognised kind (skippable) from a
    /// malformed id (an error).
    ///
    /// Only a known kind can be malformed: `Role` or `Role:x` is an error,
    /// while `Garbage` is an unknown kind like `Group:1`.
    pub fn parse(raw: &str) -> Result<ParsedPermissionId, ConnectorError> {
        let (tag, id) = match raw.split_once(':') {
            Some((tag, id)) => (tag, Some(id)),
            None => (raw, None),
        };

        let Some(kind) = PermissionKind::from_tag(tag) else {
            return Ok(ParsedPermissionId::UnknownKind(tag.to_string()));
        };

        let id = id.ok_or_else(|| ConnectorError::InvalidPermissionId {
            id: raw.to_string(),
            detail: format!("expected '{kind}:<Id>'"),
        })?;
        let id = id
            .trim()
            .parse::<i64>()
            .map_err(|e| ConnectorError::InvalidPermissionId {
                id: raw.to_string(),
                detail: e.to_string(),
            })?;
        Ok(ParsedPermissionId::Known(Self { kind, id }))
    }
}

impl FromStr for PermissionId {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::parse(s)? {
            ParsedPermissionId::Known(id) => Ok(id),
            ParsedPermissionId::UnknownKind(tag) => Err(ConnectorError::InvalidPermissionId {
                id: s.to_string(),
                detail: format!("unknown kind '{tag}'"),
            }),
        }
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// An entry of the permission universe as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Catalog id rendered as a string.
    pub id: String,
    pub name: String,
    /// Category label, one of [`ROLE_CATEGORY`] or [`REQUEST_RIGHT_CATEGORY`].
    pub description: String,
}

/// A row from the `it_roles` or `request_rights` catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub kind: PermissionKind,
    pub id: i64,
    pub name: String,
}

impl From<CatalogEntry> for Permission {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            name: entry.name,
            description: entry.kind.category().to_string(),
        }
    }
}
