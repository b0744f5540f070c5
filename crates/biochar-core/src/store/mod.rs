//! `SQLite`-backed lifecycle store.
//!
//! The store is the only synchronization point between farmer-side and
//! kiln-side callers. Nothing is cached across operations: every balance
//! check reads the committed row inside the transaction that updates it.
//!
//! # Transactions
//!
//! Every mutation runs inside one `BEGIN IMMEDIATE` transaction, which takes
//! the database write lock before the first read. Two writers, in this
//! process or another one sharing the file, therefore cannot both pass a
//! balance check against the same stale balance. Returning an error from
//! the closure passed to [`LifecycleStore::write`] drops the transaction
//! uncommitted, so no partial credit or debit is ever observable.
//!
//! Writers that find the lock held wait up to `busy_timeout_ms` before
//! failing with a database error.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{LifecycleError, UnknownVariant};
use crate::evidence::MediaKind;
use crate::ledger::{Account, Direction};
use crate::quantity::{AreaUnit, VehicleType, WeightUnit};
use crate::stage::Stage;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Stores domain enums as their `as_str` identifiers.
macro_rules! sql_text_enum {
    ($($ty:ty),+ $(,)?) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|err: UnknownVariant| FromSqlError::Other(Box::new(err)))
            }
        }
    )+};
}

sql_text_enum!(Stage, WeightUnit, AreaUnit, VehicleType, MediaKind, Account, Direction);

/// Current time in nanoseconds since the Unix epoch.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Shared handle to the lifecycle database.
///
/// Cloning is cheap; clones share one connection, serialized by a mutex.
/// Separate processes (or separate [`LifecycleStore::open`] calls) get
/// separate connections and are serialized by `SQLite`'s write lock.
#[derive(Debug, Clone)]
pub struct LifecycleStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl LifecycleStore {
    /// Opens or creates the store described by `config`.
    ///
    /// The schema is applied on every open.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(config: &StoreConfig) -> Result<Self, LifecycleError> {
        let conn = Connection::open_with_flags(
            &config.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        let journal_mode = if config.wal {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?
        } else {
            conn.query_row("PRAGMA journal_mode", [], |row| row.get::<_, String>(0))?
        };
        Self::initialize_connection(&conn)?;

        info!(
            path = %config.path.display(),
            journal_mode = %journal_mode,
            "opened lifecycle store"
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(config.path.clone()),
        })
    }

    /// Creates a private in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, LifecycleError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    fn initialize_connection(conn: &Connection) -> Result<(), LifecycleError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA_SQL)?;
        debug!("lifecycle schema applied");
        Ok(())
    }

    /// Returns the database path, or `None` for an in-memory store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the journal mode in effect (`wal` for file stores by default).
    ///
    /// # Errors
    ///
    /// Returns an error if the journal mode cannot be queried.
    pub fn journal_mode(&self) -> Result<String, LifecycleError> {
        let conn = self.lock()?;
        Ok(conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LifecycleError> {
        self.conn.lock().map_err(|_| LifecycleError::StoreUnavailable)
    }

    /// Runs `f` inside an immediate write transaction.
    ///
    /// Commits if `f` returns `Ok`; otherwise the transaction is dropped and
    /// rolled back.
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, LifecycleError>,
    ) -> Result<T, LifecycleError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs `f` against a consistent snapshot of committed state.
    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, LifecycleError>,
    ) -> Result<T, LifecycleError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        f(&tx)
    }
}
