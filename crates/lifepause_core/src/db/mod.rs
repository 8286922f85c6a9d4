//! SQLite storage bootstrap for freeze periods.
//!
//! # Responsibility
//! - Open and configure SQLite connections holding freeze-period state.
//! - Apply schema migrations in deterministic order.
//! - Hand out a lockable shared connection for request-path readers.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No freeze data is read or written before migrations succeed.

use log::warn;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, open_shared_db};

pub type DbResult<T> = Result<T, DbError>;

/// Connection shared between the freeze store and its writers.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so concurrent users go
/// through the mutex and never hold it across an `.await`.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Wraps an opened connection for shared use.
pub fn share(conn: Connection) -> SharedConnection {
    Arc::new(Mutex::new(conn))
}

/// Locks the shared connection, taking it back if a previous holder panicked.
///
/// SQLite rolls back the panicked holder's open transaction, so the connection
/// itself stays usable. The poison flag is cleared so the recovery is logged
/// once per panic.
pub fn lock_shared(conn: &SharedConnection) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| {
        warn!("event=db_lock module=db status=recovered reason=poisoned");
        conn.clear_poison();
        poisoned.into_inner()
    })
}

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "freeze database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
