// crates/trestle-store-sqlite/src/client.rs
// ============================================================================
// Module: SQLite Client Wrapper
// Description: Writer/reader connection management and transactional runs.
// Purpose: Serialize writes through one connection, retry busy errors with
//          jittered backoff, and execute prepared reads.
// Dependencies: crate::config, rand, rusqlite, thiserror, tracing,
//               trestle-core
// ============================================================================

//! ## Overview
//! File-backed SQLite serializes writers; funneling every write through a
//! single connection avoids cross-transaction busy storms. The wrapper holds
//! one writer connection behind a mutex (reopened after the configured idle
//! timeout) and one shared reader connection for prepared SELECTs. `run`
//! executes a statement list inside `BEGIN IMMEDIATE` … `COMMIT`; the commit
//! is the sole externally visible point of atomicity. Busy errors retry with
//! a `random(1..=retry_delay)` ms sleep up to `retry_limit` attempts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use rand::Rng as _;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqliteValue;
use rusqlite::types::ValueRef;
use thiserror::Error;
use tracing::debug;
use tracing::error;
use tracing::warn;
use trestle_core::SqlScalar;
use trestle_core::TableError;

use crate::config::EngineConfig;
use crate::statement_cache::STATEMENT_CACHE_CAPACITY;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Engine-side failures raised below the operation layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapped SQLite failure.
    #[error("sqlite error: {0}")]
    Db(String),
    /// Lock contention that survived every bounded retry.
    #[error("database busy: {0}")]
    Busy(String),
    /// Filesystem failure around the backing file.
    #[error("sqlite io error: {0}")]
    Io(String),
    /// Invalid engine configuration.
    #[error("invalid engine configuration: {0}")]
    Config(String),
    /// A referenced physical table does not exist.
    #[error("missing physical table: {0}")]
    MissingTable(String),
}

impl From<StoreError> for TableError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Busy(message) => Self::Busy { title: message },
            StoreError::Db(message)
            | StoreError::Io(message)
            | StoreError::Config(message)
            | StoreError::MissingTable(message) => Self::engine(message),
        }
    }
}

/// Classified SQLite failure used for retry decisions.
enum ErrorClass {
    /// Retryable lock contention.
    Busy,
    /// The referenced table does not exist.
    MissingTable,
    /// Everything else.
    Other,
}

/// Classifies a rusqlite error.
fn classify(error: &rusqlite::Error) -> ErrorClass {
    if let rusqlite::Error::SqliteFailure(inner, message) = error {
        if matches!(inner.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) {
            return ErrorClass::Busy;
        }
        if message.as_deref().is_some_and(|text| text.contains("no such table")) {
            return ErrorClass::MissingTable;
        }
    }
    if error.to_string().contains("no such table") {
        return ErrorClass::MissingTable;
    }
    ErrorClass::Other
}

/// Maps a rusqlite error into the engine taxonomy.
fn map_error(error: &rusqlite::Error) -> StoreError {
    match classify(error) {
        ErrorClass::Busy => StoreError::Busy(error.to_string()),
        ErrorClass::MissingTable => StoreError::MissingTable(error.to_string()),
        ErrorClass::Other => StoreError::Db(error.to_string()),
    }
}

// ============================================================================
// SECTION: Statements and Rows
// ============================================================================

/// Parameterized SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with positional placeholders.
    pub sql: String,
    /// Parameter vector in placeholder order.
    pub params: Vec<SqlScalar>,
}

impl Statement {
    /// Creates a statement without parameters.
    #[must_use]
    pub fn bare(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// One result row: column name to physical scalar.
pub type Row = BTreeMap<String, SqlScalar>;

/// Converts a physical scalar to the engine parameter type.
fn to_engine_value(scalar: &SqlScalar) -> SqliteValue {
    match scalar {
        SqlScalar::Null => SqliteValue::Null,
        SqlScalar::Integer(number) => SqliteValue::Integer(*number),
        SqlScalar::Real(number) => SqliteValue::Real(*number),
        SqlScalar::Text(text) => SqliteValue::Text(text.clone()),
        SqlScalar::Blob(bytes) => SqliteValue::Blob(bytes.clone()),
    }
}

/// Converts an engine cell back to a physical scalar.
fn from_engine_value(value: ValueRef<'_>) -> SqlScalar {
    match value {
        ValueRef::Null => SqlScalar::Null,
        ValueRef::Integer(number) => SqlScalar::Integer(number),
        ValueRef::Real(number) => SqlScalar::Real(number),
        ValueRef::Text(text) => SqlScalar::Text(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => SqlScalar::Blob(bytes.to_vec()),
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Writer slot holding the lazily reopened writer connection.
struct WriterSlot {
    /// Active writer connection, if any.
    connection: Option<Connection>,
    /// Last time the writer was used.
    last_used: Instant,
}

/// SQLite client with a cap-1 writer and a shared reader connection.
pub struct SqliteClient {
    /// Resolved backing file path.
    path: PathBuf,
    /// Echo compiled SQL to the log.
    show_sql: bool,
    /// Upper bound of the jittered busy-retry sleep (ms).
    retry_delay: u64,
    /// Maximum busy retries per acquire or execute.
    retry_limit: u32,
    /// Writer idle timeout.
    idle_timeout: Duration,
    /// Serialized writer connection.
    writer: Mutex<WriterSlot>,
    /// Shared reader connection for prepared SELECTs.
    reader: Mutex<Connection>,
}

impl SqliteClient {
    /// Opens the client, creating the backing file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the path is invalid or the database
    /// cannot be opened.
    pub fn open(config: &EngineConfig) -> Result<Self, StoreError> {
        let path = config.database_path();
        validate_database_path(&path)?;
        ensure_parent_dir(&path)?;
        let writer = open_connection(&path)?;
        let reader = open_connection(&path)?;
        Ok(Self {
            path,
            show_sql: config.show_sql,
            retry_delay: config.retry_delay.max(1),
            retry_limit: config.retry_limit,
            idle_timeout: Duration::from_millis(config.pool_idle_timeout),
            writer: Mutex::new(WriterSlot {
                connection: Some(writer),
                last_used: Instant::now(),
            }),
            reader: Mutex::new(reader),
        })
    }

    /// Executes the statements in declared order inside one transaction.
    ///
    /// Acquires the writer, issues `BEGIN IMMEDIATE` (retrying busy errors
    /// with jitter), executes each statement, and commits. Any failure rolls
    /// back and re-raises.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when execution or the commit fails.
    pub fn run(&self, statements: &[Statement]) -> Result<(), StoreError> {
        let mut slot = self
            .writer
            .lock()
            .map_err(|_| StoreError::Db("writer mutex poisoned".to_string()))?;
        if slot.last_used.elapsed() > self.idle_timeout {
            slot.connection = None;
        }
        if slot.connection.is_none() {
            slot.connection = Some(open_connection(&self.path)?);
        }
        let Some(connection) = slot.connection.as_ref() else {
            return Err(StoreError::Db("writer connection unavailable".to_string()));
        };

        self.begin_immediate(connection)?;
        for statement in statements {
            if self.show_sql {
                debug!(sql = %statement.sql, "run");
            }
            let outcome = connection
                .prepare_cached(&statement.sql)
                .and_then(|mut prepared| {
                    prepared
                        .execute(params_from_iter(statement.params.iter().map(to_engine_value)))
                })
                .map_err(|err| map_error(&err));
            if let Err(err) = outcome {
                rollback(connection);
                return Err(err);
            }
        }
        if let Err(err) = connection.execute_batch("COMMIT") {
            rollback(connection);
            return Err(map_error(&err));
        }
        slot.last_used = Instant::now();
        Ok(())
    }

    /// Executes a prepared SELECT against the reader connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingTable`] when the target table does not
    /// exist, [`StoreError::Busy`] after retry exhaustion, [`StoreError::Db`]
    /// otherwise.
    pub fn all(&self, sql: &str, params: &[SqlScalar]) -> Result<Vec<Row>, StoreError> {
        let connection = self
            .reader
            .lock()
            .map_err(|_| StoreError::Db("reader mutex poisoned".to_string()))?;
        if self.show_sql {
            debug!(sql = %sql, "all");
        }
        let mut attempt = 0;
        loop {
            match query_rows(&connection, sql, params) {
                Ok(rows) => return Ok(rows),
                Err(err) => {
                    if matches!(classify(&err), ErrorClass::Busy) && attempt < self.retry_limit {
                        attempt += 1;
                        warn!(attempt, "reader busy, backing off");
                        self.backoff();
                        continue;
                    }
                    return Err(map_error(&err));
                }
            }
        }
    }

    /// Verifies both connections can execute a trivial statement.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when either connection fails.
    pub fn check_connection(&self) -> Result<(), StoreError> {
        {
            let connection = self
                .reader
                .lock()
                .map_err(|_| StoreError::Db("reader mutex poisoned".to_string()))?;
            connection.execute_batch("SELECT 1").map_err(|err| map_error(&err))?;
        }
        self.run(&[])
    }

    /// Flushes both connections' prepared-statement caches.
    pub fn flush_statements(&self) {
        if let Ok(connection) = self.reader.lock() {
            connection.flush_prepared_statement_cache();
        }
        if let Ok(slot) = self.writer.lock()
            && let Some(connection) = slot.connection.as_ref()
        {
            connection.flush_prepared_statement_cache();
        }
    }

    /// Starts an immediate transaction, retrying busy errors with jitter.
    fn begin_immediate(&self, connection: &Connection) -> Result<(), StoreError> {
        let mut attempt = 0;
        loop {
            match connection.execute_batch("BEGIN IMMEDIATE") {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if matches!(classify(&err), ErrorClass::Busy) && attempt < self.retry_limit {
                        attempt += 1;
                        warn!(attempt, "writer busy, backing off");
                        self.backoff();
                        continue;
                    }
                    return Err(map_error(&err));
                }
            }
        }
    }

    /// Sleeps for a random interval in `1..=retry_delay` milliseconds.
    fn backoff(&self) {
        let millis = rand::rng().random_range(1 ..= self.retry_delay);
        std::thread::sleep(Duration::from_millis(millis));
    }
}

/// Rolls a transaction back, logging (not raising) any failure.
fn rollback(connection: &Connection) {
    if let Err(err) = connection.execute_batch("ROLLBACK") {
        error!(error = %err, "rollback failed");
    }
}

/// Runs one query and collects its rows.
fn query_rows(
    connection: &Connection,
    sql: &str,
    params: &[SqlScalar],
) -> Result<Vec<Row>, rusqlite::Error> {
    let mut prepared = connection.prepare_cached(sql)?;
    let columns: Vec<String> =
        prepared.column_names().iter().map(ToString::to_string).collect();
    let mut rows = prepared.query(params_from_iter(params.iter().map(to_engine_value)))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (index, column) in columns.iter().enumerate() {
            record.insert(column.clone(), from_engine_value(row.get_ref(index)?));
        }
        out.push(record);
    }
    Ok(out)
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Opens a connection with the engine pragmas applied.
fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(path, flags).map_err(|err| map_error(&err))?;
    connection
        .execute_batch(
            "PRAGMA journal_mode = wal;
             PRAGMA synchronous = normal;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|err| map_error(&err))?;
    connection.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
    Ok(connection)
}

/// Rejects directory paths before opening.
fn validate_database_path(path: &Path) -> Result<(), StoreError> {
    if path.exists() && path.is_dir() {
        return Err(StoreError::Config(
            "dbname must be a file path, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Ensures the parent directory for the backing file exists.
fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))?;
    }
    Ok(())
}
