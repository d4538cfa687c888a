//! End-to-end tests for the connector against file-backed SQLite stores.
//!
//! These tests exercise the host contract the way an identity host does:
//! start up from a connection string, then issue independent calls that
//! each open and release their own session.

use std::path::Path;

use tempfile::TempDir;

use identdb_core::db::queries;
use identdb_core::db::{FileSessionFactory, SessionFactory};
use identdb_core::models::{PermissionKind, UserProperty, UserToCreate};
use identdb_core::{
    Connector, ConnectorConfig, ConnectorError, HostConnector, IdentityConnector,
};

// ===========================================================================
// Helpers
// ===========================================================================

fn connection_string(path: &Path) -> String {
    format!(
        "ConnectionString='{}';Provider='SQLite';SchemaName='TestTaskSchema';",
        path.display()
    )
}

/// Start a host connector on a fresh database and seed the catalogs.
fn start_host(dir: &TempDir) -> HostConnector {
    let path = dir.path().join("identity.db");
    let mut host = HostConnector::new();
    host.start_up(&connection_string(&path))
        .expect("start_up failed");

    let connector = host.connector().expect("connector not started");
    connector
        .add_catalog_entry(PermissionKind::Role, Some(1), "Operator")
        .unwrap();
    connector
        .add_catalog_entry(PermissionKind::Role, Some(2), "Supervisor")
        .unwrap();
    connector
        .add_catalog_entry(PermissionKind::Request, Some(10), "Close requests")
        .unwrap();
    host
}

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn test_create_user_persists_account_and_credential() {
    let dir = TempDir::new().unwrap();
    let host = start_host(&dir);

    let hash = bcrypt::hash("correct horse", 4).unwrap();
    let user = UserToCreate::from_properties(
        "alice",
        hash.clone(),
        &[
            UserProperty::new("First name", "Alice"),
            UserProperty::new("Telephone number", "+1 555 0100"),
            UserProperty::new("Password", "ignored"),
        ],
    )
    .unwrap();
    host.create_user(&user);
    assert!(host.is_user_exists("alice"));

    let props = host.get_user_properties("alice");
    assert_eq!(props[0], UserProperty::new("First name", "Alice"));
    assert_eq!(props[3], UserProperty::new("Telephone number", "+1 555 0100"));

    let factory = FileSessionFactory::new(
        dir.path().join("identity.db"),
        std::time::Duration::from_secs(1),
    );
    let session = factory.open().unwrap();
    let stored = queries::find_credential(&session, "alice").unwrap().unwrap();
    assert!(bcrypt::verify("correct horse", &stored).unwrap());
}

#[test]
fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let host = start_host(&dir);
        host.create_user(&UserToCreate::new("bob", "h"));
        host.add_user_permissions("bob", &ids(&["Role:2", "Request:10"]));
    }

    let mut host = HostConnector::new();
    host.start_up(&connection_string(&dir.path().join("identity.db")))
        .unwrap();
    assert!(host.is_user_exists("bob"));
    assert_eq!(
        host.get_user_permissions("bob"),
        vec!["Role:Supervisor", "Request:Close requests"]
    );
    assert_eq!(host.get_all_permissions().len(), 3);
}

#[test]
fn test_typed_and_host_views_agree_on_failures() {
    let dir = TempDir::new().unwrap();
    let host = start_host(&dir);
    host.create_user(&UserToCreate::new("carol", "h"));

    let connector: &Connector = host.connector().unwrap();
    let err = connector
        .add_user_permissions("carol", &ids(&["Role:1", "Request:ten"]))
        .unwrap_err();
    assert!(matches!(err, ConnectorError::InvalidPermissionId { .. }));

    // The host call swallows the same failure, and nothing was committed.
    host.add_user_permissions("carol", &ids(&["Role:1", "Request:ten"]));
    assert!(host.get_user_permissions("carol").is_empty());
}

#[test]
fn test_update_properties_round_trip() {
    let dir = TempDir::new().unwrap();
    let host = start_host(&dir);
    host.create_user(&UserToCreate::new("dave", "h"));

    host.update_user_properties(
        &[
            UserProperty::new("Middle name", "Q"),
            UserProperty::new("Is lead", "True"),
        ],
        "dave",
    );
    let props = host.get_user_properties("dave");
    assert_eq!(props[1].value, "Q");
    assert_eq!(props[4].value, "True");
}

#[test]
fn test_concurrent_writers_wait_for_each_other() {
    let dir = TempDir::new().unwrap();
    let connector = Connector::open(ConnectorConfig::sqlite(dir.path().join("identity.db"))).unwrap();
    connector.create_user(&UserToCreate::new("erin", "h")).unwrap();

    const THREADS: usize = 4;
    const WRITES: usize = 50;
    let failures: usize = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|t| {
                let connector = &connector;
                scope.spawn(move || {
                    (0..WRITES)
                        .filter(|i| {
                            let value = format!("writer-{t}-{i}");
                            connector
                                .update_user_properties("erin", &[UserProperty::new("Last name", value)])
                                .is_err()
                        })
                        .count()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).sum()
    });
    assert_eq!(failures, 0, "every concurrent update should commit");

    let last_name = connector.user_properties("erin").unwrap()[2].value.clone();
    assert!(last_name.starts_with("writer-"));
}

#[test]
fn test_failed_read_returns_nothing_rather_than_a_partial_list() {
    let dir = TempDir::new().unwrap();
    let host = start_host(&dir);
    host.create_user(&UserToCreate::new("frank", "h"));
    host.add_user_permissions("frank", &ids(&["Role:1", "Request:10"]));

    // Break only the request-right half of the read.
    let factory = FileSessionFactory::new(
        dir.path().join("identity.db"),
        std::time::Duration::from_secs(1),
    );
    factory
        .open()
        .unwrap()
        .execute_batch("DROP TABLE user_request_rights;")
        .unwrap();

    let connector = host.connector().unwrap();
    assert!(connector.user_permissions("frank").is_err());
    assert!(host.get_user_permissions("frank").is_empty());
}
