//! Host property vocabulary and its mapping onto account columns.
//!
//! The host addresses profile attributes by free-form name. [`ACCESSORS`]
//! maps each account-backed name to a getter/setter pair over [`Account`];
//! a lookup miss means the name is not account-backed and is ignored.

use crate::errors::ConnectorError;
use crate::models::{Account, Property};

pub const FIRST_NAME: &str = "First name";
pub const LAST_NAME: &str = "Last name";
pub const MIDDLE_NAME: &str = "Middle name";
pub const TELEPHONE_NUMBER: &str = "Telephone number";
pub const IS_LEAD: &str = "Is lead";
pub const PASSWORD: &str = "Password";

/// The fixed catalog returned to the host, as `(name, display label)`.
static CATALOG: &[(&str, &str)] = &[
    (FIRST_NAME, "Имя"),
    (LAST_NAME, "Фамилия"),
    (MIDDLE_NAME, "Отчество"),
    (TELEPHONE_NUMBER, "Номер телефона"),
    (IS_LEAD, "Ведущий"),
    (PASSWORD, "Пароль"),
];

/// Typed access to one account column.
pub struct Accessor {
    pub name: &'static str,
    pub get: fn(&Account) -> String,
    pub set: fn(&mut Account, &str) -> Result<(), ConnectorError>,
}

/// Account-backed properties, in the order they are reported.
pub static ACCESSORS: &[Accessor] = &[
    Accessor {
        name: FIRST_NAME,
        get: |a| a.first_name.clone(),
        set: |a, v| {
            a.first_name = v.to_string();
            Ok(())
        },
    },
    Accessor {
        name: MIDDLE_NAME,
        get: |a| a.middle_name.clone(),
        set: |a, v| {
            a.middle_name = v.to_string();
            Ok(())
        },
    },
    Accessor {
        name: LAST_NAME,
        get: |a| a.last_name.clone(),
        set: |a, v| {
            a.last_name = v.to_string();
            Ok(())
        },
    },
    Accessor {
        name: TELEPHONE_NUMBER,
        get: |a| a.telephone_number.clone(),
        set: |a, v| {
            a.telephone_number = v.to_string();
            Ok(())
        },
    },
    Accessor {
        name: IS_LEAD,
        get: |a| format_bool(a.is_lead),
        set: |a, v| {
            a.is_lead = parse_bool(v).ok_or_else(|| ConnectorError::InvalidPropertyValue {
                property: IS_LEAD.into(),
                value: v.to_string(),
            })?;
            Ok(())
        },
    },
];

/// The six properties the host may address.
pub fn catalog() -> Vec<Property> {
    CATALOG
        .iter()
        .map(|(name, description)| Property::new(*name, *description))
        .collect()
}

/// Find the accessor for a property name. Names are matched exactly.
pub fn accessor(name: &str) -> Option<&'static Accessor> {
    ACCESSORS.iter().find(|a| a.name == name)
}

/// Parse a lead flag the way the host spells booleans: `true` or `false`,
/// case-insensitive, surrounding whitespace ignored.
pub fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Render a lead flag in the host's canonical spelling.
pub fn format_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_fixed() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog[0], Property::new("First name", "Имя"));
        assert_eq!(catalog[5], Property::new("Password", "Пароль"));
    }

    #[test]
    fn test_accessor_order_and_password_has_none() {
        let names: Vec<_> = ACCESSORS.iter().map(|a| a.name).collect();
        assert_eq!(
            names,
            vec![FIRST_NAME, MIDDLE_NAME, LAST_NAME, TELEPHONE_NUMBER, IS_LEAD]
        );
        assert!(accessor(PASSWORD).is_none());
        assert!(accessor("first name").is_none());
    }

    #[test]
    fn test_set_and_get() {
        let mut account = Account::default();
        (accessor(TELEPHONE_NUMBER).unwrap().set)(&mut account, "+7 900 000").unwrap();
        assert_eq!(account.telephone_number, "+7 900 000");

        (accessor(IS_LEAD).unwrap().set)(&mut account, " True ").unwrap();
        assert!(account.is_lead);
        assert_eq!((accessor(IS_LEAD).unwrap().get)(&account), "True");
    }

    #[test]
    fn test_invalid_lead_value() {
        let mut account = Account::default();
        let result = (accessor(IS_LEAD).unwrap().set)(&mut account, "yes");
        assert!(matches!(
            result,
            Err(ConnectorError::InvalidPropertyValue { ref value, .. }) if value == "yes"
        ));
        assert!(!account.is_lead);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("FALSE"), Some(false));
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("1"), None);
        assert_eq!(parse_bool(""), None);
    }
}
