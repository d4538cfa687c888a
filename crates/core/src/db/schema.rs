//! Database schema definitions and migration runner.
//!
//! Migrations are simple SQL strings applied in order. The SQLite
//! `user_version` pragma tracks which migrations have already been applied.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::DatabaseError;

/// All migrations, in order. Each entry is `(version, description, sql)`.
static MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "accounts and credentials",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            login             TEXT PRIMARY KEY NOT NULL,
            first_name        TEXT NOT NULL DEFAULT '',
            middle_name       TEXT NOT NULL DEFAULT '',
            last_name         TEXT NOT NULL DEFAULT '',
            telephone_number  TEXT NOT NULL DEFAULT '',
            is_lead           INTEGER NOT NULL DEFAULT 0 CHECK (is_lead IN (0, 1))
        );

        CREATE TABLE IF NOT EXISTS passwords (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id   TEXT NOT NULL UNIQUE REFERENCES users (login) ON DELETE CASCADE,
            password  TEXT NOT NULL
        );
        "#,
    ),
    (
        2,
        "role and request-right catalogs with assignments",
        r#"
        CREATE TABLE IF NOT EXISTS it_roles (
            id                      INTEGER PRIMARY KEY,
            name                    TEXT NOT NULL,
            corporate_phone_number  TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS request_rights (
            id    INTEGER PRIMARY KEY,
            name  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_it_roles (
            user_id  TEXT    NOT NULL REFERENCES users (login) ON DELETE CASCADE,
            role_id  INTEGER NOT NULL REFERENCES it_roles (id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, role_id)
        );

        CREATE TABLE IF NOT EXISTS user_request_rights (
            user_id   TEXT    NOT NULL REFERENCES users (login) ON DELETE CASCADE,
            right_id  INTEGER NOT NULL REFERENCES request_rights (id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, right_id)
        );

        CREATE INDEX IF NOT EXISTS idx_user_it_roles_role ON user_it_roles (role_id);
        CREATE INDEX IF NOT EXISTS idx_user_request_rights_right ON user_request_rights (right_id);
        "#,
    ),
];

/// Run all pending migrations against `conn`.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_schema_version(conn)?;
    info!(
        current_version,
        target_version = latest_version(),
        "checking database migrations"
    );

    for &(version, description, sql) in MIGRATIONS {
        if version > current_version {
            info!(version, description, "applying migration");
            conn.execute_batch(sql)
                .map_err(|e| DatabaseError::MigrationFailed {
                    version,
                    detail: e.to_string(),
                })?;
            set_schema_version(conn, version)?;
            debug!(version, "migration applied successfully");
        }
    }

    Ok(())
}

/// Highest schema version this build knows about.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.0).unwrap_or(0)
}

/// Read the current schema version from the SQLite `user_version` pragma.
pub fn get_schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: u32) -> Result<(), DatabaseError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}
