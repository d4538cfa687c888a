//! SQLite persistence layer for identdb.
//!
//! Every connector operation opens a [`Session`] from an injected
//! [`SessionFactory`], does its reads and writes, and drops the session
//! before returning. [`FileSessionFactory`] opens a fresh connection per
//! session; [`MemorySessionFactory`] lends out one shared in-memory
//! connection so that tests see a single store across calls.

pub mod queries;
pub mod schema;

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::ConnectorConfig;
use crate::errors::DatabaseError;

/// Source of store sessions.
pub trait SessionFactory: Send + Sync {
    /// Open a session. The returned handle releases its connection on drop.
    fn open(&self) -> Result<Session<'_>, DatabaseError>;
}

/// Build the factory described by `config`.
pub fn factory_for(config: &ConnectorConfig) -> Result<Box<dyn SessionFactory>, DatabaseError> {
    let timeout = Duration::from_millis(config.busy_timeout_ms);
    match config.database_path() {
        Some(path) => Ok(Box::new(FileSessionFactory::new(path, timeout))),
        None => Ok(Box::new(MemorySessionFactory::new()?)),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

enum Handle<'a> {
    Owned(Connection),
    Shared(MutexGuard<'a, Connection>),
}

/// Scoped handle to the store, bounded to one connector operation.
pub struct Session<'a> {
    handle: Handle<'a>,
}

impl<'a> Session<'a> {
    fn owned(conn: Connection) -> Self {
        trace!("session opened");
        Self {
            handle: Handle::Owned(conn),
        }
    }

    fn shared(guard: MutexGuard<'a, Connection>) -> Self {
        trace!("session opened on shared connection");
        Self {
            handle: Handle::Shared(guard),
        }
    }

    /// Execute a closure inside a SQLite transaction. If the closure returns
    /// `Ok`, the transaction is committed; otherwise it is rolled back.
    ///
    /// The error type only needs to absorb [`DatabaseError`], so callers can
    /// abort with their own validation errors and still get a rollback.
    pub fn transaction<F, T, E>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let tx = self.transaction_handle()?;
        let result = f(&tx)?;
        tx.commit().map_err(DatabaseError::from)?;
        Ok(result)
    }

    // Take the write lock up front. A deferred transaction that reads and then
    // writes fails with SQLITE_BUSY under WAL instead of waiting.
    fn transaction_handle(&mut self) -> Result<rusqlite::Transaction<'_>, DatabaseError> {
        Ok(self
            .deref_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

impl Deref for Session<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.handle {
            Handle::Owned(conn) => conn,
            Handle::Shared(guard) => &**guard,
        }
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        match &mut self.handle {
            Handle::Owned(conn) => conn,
            Handle::Shared(guard) => &mut **guard,
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        trace!("session released");
    }
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

/// Opens a new connection to a database file for every session.
pub struct FileSessionFactory {
    path: PathBuf,
    busy_timeout: Duration,
}

impl FileSessionFactory {
    pub fn new<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionFactory for FileSessionFactory {
    fn open(&self) -> Result<Session<'_>, DatabaseError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;

        // WAL keeps readers from blocking on a writer in another session.
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        debug!(path = %self.path.display(), "opened database session");
        Ok(Session::owned(conn))
    }
}

/// Lends one in-memory connection to each session in turn.
///
/// Sessions are serialized by the inner `Mutex`.
pub struct MemorySessionFactory {
    conn: Mutex<Connection>,
}

impl MemorySessionFactory {
    pub fn new() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        info!("opened in-memory database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SessionFactory for MemorySessionFactory {
    fn open(&self) -> Result<Session<'_>, DatabaseError> {
        // A poisoned lock means a previous holder panicked; the connection
        // itself is still usable.
        let guard = self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("database mutex was poisoned, recovering");
            poisoned.into_inner()
        });
        Ok(Session::shared(guard))
    }
}
