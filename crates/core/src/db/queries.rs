//! Typed query helpers for every table in the identdb database.
//!
//! All helpers take a plain `&Connection`, so the same function works on a
//! session or on an open transaction.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::errors::DatabaseError;
use crate::models::{Account, CatalogEntry, PermissionId, PermissionKind};

fn map_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        login: row.get(0)?,
        first_name: row.get(1)?,
        middle_name: row.get(2)?,
        last_name: row.get(3)?,
        telephone_number: row.get(4)?,
        is_lead: row.get(5)?,
    })
}

// -- users ------------------------------------------------------------------

/// Look up an account by login.
pub fn find_account(conn: &Connection, login: &str) -> Result<Option<Account>, DatabaseError> {
    let account = conn
        .query_row(
            "SELECT login, first_name, middle_name, last_name, telephone_number, is_lead
             FROM users WHERE login = ?1",
            params![login],
            map_account,
        )
        .optional()?;
    Ok(account)
}

/// Check whether an account exists.
pub fn account_exists(conn: &Connection, login: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE login = ?1",
        params![login],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Insert a new account row.
pub fn insert_account(conn: &Connection, account: &Account) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (login, first_name, middle_name, last_name, telephone_number, is_lead)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            account.login,
            account.first_name,
            account.middle_name,
            account.last_name,
            account.telephone_number,
            account.is_lead,
        ],
    )?;
    debug!(login = %account.login, "inserted user");
    Ok(())
}

/// Overwrite every profile column of an existing account.
pub fn update_account(conn: &Connection, account: &Account) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users
         SET first_name = ?2, middle_name = ?3, last_name = ?4, telephone_number = ?5, is_lead = ?6
         WHERE login = ?1",
        params![
            account.login,
            account.first_name,
            account.middle_name,
            account.last_name,
            account.telephone_number,
            account.is_lead,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity: "user".into(),
            id: account.login.clone(),
        });
    }
    debug!(login = %account.login, "updated user");
    Ok(())
}

// -- passwords --------------------------------------------------------------

/// Store the pre-hashed credential for a login.
pub fn insert_credential(
    conn: &Connection,
    login: &str,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO passwords (user_id, password) VALUES (?1, ?2)",
        params![login, password_hash],
    )?;
    debug!(login, "inserted credential");
    Ok(())
}

/// Read the stored credential hash for a login.
pub fn find_credential(conn: &Connection, login: &str) -> Result<Option<String>, DatabaseError> {
    let hash = conn
        .query_row(
            "SELECT password FROM passwords WHERE user_id = ?1",
            params![login],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hash)
}

// -- catalogs ---------------------------------------------------------------

fn catalog_table(kind: PermissionKind) -> &'static str {
    match kind {
        PermissionKind::Role => "it_roles",
        PermissionKind::Request => "request_rights",
    }
}

/// List one catalog in id order.
pub fn list_catalog(
    conn: &Connection,
    kind: PermissionKind,
) -> Result<Vec<CatalogEntry>, DatabaseError> {
    let sql = format!("SELECT id, name FROM {} ORDER BY id", catalog_table(kind));
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map([], |row| {
            Ok(CatalogEntry {
                kind,
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Check whether the catalog row a permission id points at exists.
pub fn catalog_entry_exists(conn: &Connection, id: PermissionId) -> Result<bool, DatabaseError> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE id = ?1",
        catalog_table(id.kind)
    );
    let count: i64 = conn.query_row(&sql, params![id.id], |row| row.get(0))?;
    Ok(count > 0)
}

/// Insert a catalog row. Returns the id, which is assigned when `id` is `None`.
pub fn insert_catalog_entry(
    conn: &Connection,
    kind: PermissionKind,
    id: Option<i64>,
    name: &str,
) -> Result<i64, DatabaseError> {
    let sql = format!(
        "INSERT INTO {} (id, name) VALUES (?1, ?2)",
        catalog_table(kind)
    );
    conn.execute(&sql, params![id, name])?;
    let id = conn.last_insert_rowid();
    debug!(%kind, id, name, "inserted catalog entry");
    Ok(id)
}

// -- assignments ------------------------------------------------------------

/// Assign a permission to a user. Existing assignments are left alone.
///
/// Returns `true` if a row was inserted.
pub fn insert_assignment(
    conn: &Connection,
    login: &str,
    id: PermissionId,
) -> Result<bool, DatabaseError> {
    let sql = match id.kind {
        PermissionKind::Role => {
            "INSERT OR IGNORE INTO user_it_roles (user_id, role_id) VALUES (?1, ?2)"
        }
        PermissionKind::Request => {
            "INSERT OR IGNORE INTO user_request_rights (user_id, right_id) VALUES (?1, ?2)"
        }
    };
    let changed = conn.execute(sql, params![login, id.id])?;
    Ok(changed > 0)
}

/// Revoke a permission from a user. Returns `true` if a row was deleted.
pub fn delete_assignment(
    conn: &Connection,
    login: &str,
    id: PermissionId,
) -> Result<bool, DatabaseError> {
    let sql = match id.kind {
        PermissionKind::Role => "DELETE FROM user_it_roles WHERE user_id = ?1 AND role_id = ?2",
        PermissionKind::Request => {
            "DELETE FROM user_request_rights WHERE user_id = ?1 AND right_id = ?2"
        }
    };
    let changed = conn.execute(sql, params![login, id.id])?;
    Ok(changed > 0)
}

/// Names of the catalog entries of one kind assigned to a user, in catalog
/// id order.
pub fn list_assigned_names(
    conn: &Connection,
    login: &str,
    kind: PermissionKind,
) -> Result<Vec<String>, DatabaseError> {
    let sql = match kind {
        PermissionKind::Role => {
            "SELECT r.name FROM user_it_roles ur
             JOIN it_roles r ON r.id = ur.role_id
             WHERE ur.user_id = ?1 ORDER BY r.id"
        }
        PermissionKind::Request => {
            "SELECT r.name FROM user_request_rights ur
             JOIN request_rights r ON r.id = ur.right_id
             WHERE ur.user_id = ?1 ORDER BY r.id"
        }
    };
    let mut stmt = conn.prepare(sql)?;
    let names = stmt
        .query_map(params![login], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        schema::run_migrations(&conn).unwrap();
        conn
    }

    fn alice() -> Account {
        Account {
            login: "alice".into(),
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_account_crud() {
        let conn = setup();
        assert!(find_account(&conn, "alice").unwrap().is_none());
        assert!(!account_exists(&conn, "alice").unwrap());

        insert_account(&conn, &alice()).unwrap();
        assert!(account_exists(&conn, "alice").unwrap());

        let mut account = find_account(&conn, "alice").unwrap().unwrap();
        assert_eq!(account, alice());

        account.is_lead = true;
        account.telephone_number = "555".into();
        update_account(&conn, &account).unwrap();
        assert_eq!(find_account(&conn, "alice").unwrap().unwrap(), account);
    }

    #[test]
    fn test_update_missing_account() {
        let conn = setup();
        let result = update_account(&conn, &alice());
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn test_credentials() {
        let conn = setup();
        insert_account(&conn, &alice()).unwrap();
        insert_credential(&conn, "alice", "$2b$04$hash").unwrap();
        assert_eq!(
            find_credential(&conn, "alice").unwrap().as_deref(),
            Some("$2b$04$hash")
        );
        assert!(find_credential(&conn, "bob").unwrap().is_none());
        // One credential per login.
        assert!(insert_credential(&conn, "alice", "other").is_err());
    }

    #[test]
    fn test_catalogs() {
        let conn = setup();
        insert_catalog_entry(&conn, PermissionKind::Role, Some(2), "Auditor").unwrap();
        insert_catalog_entry(&conn, PermissionKind::Role, Some(1), "Operator").unwrap();
        let id = insert_catalog_entry(&conn, PermissionKind::Request, None, "Edit").unwrap();

        let roles = list_catalog(&conn, PermissionKind::Role).unwrap();
        let names: Vec<_> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Operator", "Auditor"]);

        assert!(catalog_entry_exists(&conn, PermissionId::new(PermissionKind::Request, id)).unwrap());
        assert!(!catalog_entry_exists(&conn, PermissionId::new(PermissionKind::Role, 99)).unwrap());
    }

    #[test]
    fn test_assignments() {
        let conn = setup();
        insert_account(&conn, &alice()).unwrap();
        insert_catalog_entry(&conn, PermissionKind::Role, Some(1), "Operator").unwrap();
        insert_catalog_entry(&conn, PermissionKind::Request, Some(5), "Edit").unwrap();

        let role = PermissionId::new(PermissionKind::Role, 1);
        let right = PermissionId::new(PermissionKind::Request, 5);
        assert!(insert_assignment(&conn, "alice", role).unwrap());
        assert!(!insert_assignment(&conn, "alice", role).unwrap());
        assert!(insert_assignment(&conn, "alice", right).unwrap());

        assert_eq!(
            list_assigned_names(&conn, "alice", PermissionKind::Role).unwrap(),
            vec!["Operator"]
        );
        assert_eq!(
            list_assigned_names(&conn, "alice", PermissionKind::Request).unwrap(),
            vec!["Edit"]
        );

        assert!(delete_assignment(&conn, "alice", role).unwrap());
        assert!(!delete_assignment(&conn, "alice", role).unwrap());
        assert!(list_assigned_names(&conn, "alice", PermissionKind::Role)
            .unwrap()
            .is_empty());
    }
}
