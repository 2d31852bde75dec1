/// Connection Management Module
///
/// Driver selection, opening and pinging the backing store, and construction of the
/// `Database` handle that owns the connection together with its rewrite rules.

use crate::core::{DbError, Result};
use crate::policy::FailurePolicy;
use crate::rewrite::{EscapeRule, PrefixRule};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// Source string that opens a private in-memory database.
pub const MEMORY_SOURCE: &str = ":memory:";

/// Backing-store protocols known to the wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// SQLite through the bundled rusqlite client
    Sqlite,
}

impl Driver {
    /// Resolves a driver from its name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` for names no driver answers to.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(DbError::Connection(format!("unknown driver \"{}\"", other))),
        }
    }

    /// Canonical name of the driver
    pub fn name(&self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
        }
    }

    fn open(&self, source: &str) -> Result<Connection> {
        let opened = match self {
            Driver::Sqlite if source == MEMORY_SOURCE => Connection::open_in_memory(),
            Driver::Sqlite => Connection::open(source),
        };
        opened.map_err(|e| DbError::Connection(format!("Failed to open \"{}\": {}", source, e)))
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Liveness check. Reads the schema so that a file which is not a database fails here
/// rather than on the first real query.
fn ping(conn: &Connection) -> Result<()> {
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map(|_| ())
        .map_err(|e| DbError::Connection(format!("Ping failed: {}", e)))
}

/// Handle over a live connection plus the prefix and escape rules fixed at construction.
///
/// Cloning is cheap and shares the underlying connection.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    prefixer: PrefixRule,
    escaper: EscapeRule,
    policy: FailurePolicy,
}

impl Database {
    /// Opens `source` with the named driver, pings it and builds the rewrite rules.
    ///
    /// # Arguments
    ///
    /// * `driver` - Driver name, e.g. `"sqlite"`
    /// * `source` - Driver-specific source: a file path, a `file:` URI or `":memory:"`
    /// * `prefix` - Replacement for every `#__` token in SQL text
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` when the driver is unknown, the open fails or the
    /// ping fails.
    ///
    /// # Examples
    ///
    /// ```
    /// let db = dbwrapper::Database::new("sqlite", ":memory:", "wp_")?;
    /// assert_eq!(db.prefix(), "wp_");
    /// # Ok::<(), dbwrapper::DbError>(())
    /// ```
    pub fn new(driver: &str, source: &str, prefix: &str) -> Result<Self> {
        Database::builder()
            .driver(driver)
            .source(source)
            .prefix(prefix)
            .open()
    }

    /// Starts a builder for handles needing more than the three basic settings.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::default()
    }

    /// Wraps an already-open connection without re-opening or pinging it.
    pub fn from_connection(conn: Connection, prefix: &str) -> Self {
        Database::from_shared(Arc::new(Mutex::new(conn)), prefix)
    }

    /// Wraps a connection whose lifecycle is owned elsewhere.
    pub fn from_shared(conn: Arc<Mutex<Connection>>, prefix: &str) -> Self {
        Database {
            conn,
            prefixer: PrefixRule::new(prefix),
            escaper: EscapeRule::new(),
            policy: FailurePolicy::default(),
        }
    }

    /// Table prefix substituted for `#__`
    pub fn prefix(&self) -> &str {
        self.prefixer.prefix()
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Applies the prefix rule: the SQL that would actually be sent for `sql`.
    pub fn rewrite(&self, sql: &str) -> String {
        self.prefixer.apply(sql)
    }

    /// Escapes `'`, `\` and `"` with a backslash. Pure, no I/O.
    pub fn escape_string(&self, s: &str) -> String {
        self.escaper.apply(s)
    }

    /// Runs `func` against the raw connection, for work the wrapper does not cover.
    pub fn with_connection<F, T>(&self, func: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let result = func(&*self.lock()).map_err(|e| DbError::Query(e.to_string()));
        self.policy.enforce(result)
    }

    /// Replaces the failure policy, e.g. for a handle built by `from_connection`.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Locks the connection. A panic in another caller leaves the connection itself
    /// intact, so a poisoned lock is recovered rather than reported.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Recovering database lock poisoned by a panicking caller");
                self.conn.clear_poison();
                poisoned.into_inner()
            }
        }
    }

    pub(crate) fn policy(&self) -> FailurePolicy {
        self.policy
    }
}

/// Builder for `Database` handles
#[derive(Debug, Clone)]
pub struct DatabaseBuilder {
    driver: String,
    source: String,
    prefix: String,
    policy: FailurePolicy,
    foreign_keys: Option<bool>,
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        DatabaseBuilder {
            driver: Driver::Sqlite.name().to_string(),
            source: MEMORY_SOURCE.to_string(),
            prefix: String::new(),
            policy: FailurePolicy::default(),
            foreign_keys: None,
        }
    }
}

impl DatabaseBuilder {
    pub fn driver(mut self, driver: &str) -> Self {
        self.driver = driver.to_string();
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets `PRAGMA foreign_keys` right after the ping.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = Some(enabled);
        self
    }

    /// Opens and pings the connection. Under `FailurePolicy::FailFast` a failure panics.
    pub fn open(self) -> Result<Database> {
        let policy = self.policy;
        let source = self.source.clone();
        let result = self.try_open();
        if let Err(e) = &result {
            error!("Failed to open database {:?}: {}", source, e);
        }
        policy.enforce(result)
    }

    fn try_open(self) -> Result<Database> {
        let driver = Driver::from_name(&self.driver)?;
        let conn = driver.open(&self.source)?;
        ping(&conn)?;

        if let Some(enabled) = self.foreign_keys {
            conn.pragma_update(None, "foreign_keys", enabled)
                .map_err(|e| DbError::Connection(format!("Failed to set foreign_keys: {}", e)))?;
        }

        debug!("Opened {} database {:?} with prefix {:?}", driver, self.source, self.prefix);

        Ok(Database::from_connection(conn, &self.prefix).with_failure_policy(self.policy))
    }
}
