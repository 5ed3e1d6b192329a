//! Database service for the issuance ledger and check-in history.
//!
//! Wraps SQLite access via sqlx. The schema is created idempotently on
//! open; every mutating operation elsewhere runs in a single transaction.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

/// Database handle shared by the ledger and the check-in store.
#[derive(Clone)]
pub struct DbService {
    pool: SqlitePool,
}

impl DbService {
    /// Open or create a database at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, sqlx::Error> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                sqlx::Error::Configuration(format!("Failed to create db directory: {}", e).into())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1) // SQLite performs best with single writer
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Open a private in-memory database.
    ///
    /// A single connection is kept alive for the lifetime of the pool; an
    /// in-memory SQLite database disappears with its last connection.
    pub async fn open_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Wrap an existing pool, creating tables if they don't exist.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        create_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS identities (
            identity_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrollments (
            record_id TEXT PRIMARY KEY,
            identity_id TEXT NOT NULL REFERENCES identities(identity_id),
            expected_token TEXT NOT NULL,
            bound_public_key BLOB,
            valid_until TEXT,
            issued INTEGER NOT NULL DEFAULT 0,
            issued_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS checkins (
            checkin_id INTEGER PRIMARY KEY AUTOINCREMENT,
            identity_id TEXT NOT NULL REFERENCES identities(identity_id),
            session_id INTEGER NOT NULL,
            checkin_date TEXT NOT NULL,
            first_checkin_at TEXT NOT NULL,
            last_checkin_at TEXT NOT NULL,
            status TEXT NOT NULL,
            UNIQUE (identity_id, session_id, checkin_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Render a timestamp for storage.
///
/// Fixed-width RFC 3339 in UTC with microseconds, so lexical order in SQL
/// matches time order.
pub fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`encode_timestamp`].
pub fn decode_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(format!("Invalid {}: {}", column, e).into()))
}
