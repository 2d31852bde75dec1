/// # Test Utilities Module
///
/// Fixtures shared by the unit tests: isolated in-memory handles with an optional
/// prefixed sample schema, and a one-time log subscriber.

use crate::core::db::Database;
use crate::core::Result;
use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Installs a fmt subscriber that writes through the test harness.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Isolated database test fixture
pub struct DatabaseFixture {
    pub db: Database,
}

impl DatabaseFixture {
    /// Empty in-memory database with the given table prefix
    pub fn new(prefix: &str) -> Result<Self> {
        init_logging();
        let db = Database::new("sqlite", ":memory:", prefix)?;
        Ok(DatabaseFixture { db })
    }

    /// Fixture with a `#__users` table holding three users.
    ///
    /// User 3 has an empty name and a NULL email.
    pub fn with_sample_data(prefix: &str) -> Result<Self> {
        let fixture = DatabaseFixture::new(prefix)?;
        fixture.db.exec(
            "CREATE TABLE #__users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                active INTEGER NOT NULL DEFAULT 1
            )",
            [],
        )?;
        for (name, email) in [
            ("Alice", Some("alice@example.com")),
            ("Bob", Some("bob@example.com")),
            ("", None),
        ] {
            fixture.db.exec(
                "INSERT INTO #__users (name, email) VALUES (?1, ?2)",
                rusqlite::params![name, email],
            )?;
        }
        Ok(fixture)
    }
}
