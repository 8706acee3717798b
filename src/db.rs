use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::Result;
use crate::models::package::Package;

/// Storage text format for timestamps (UTC, second precision).
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Storage text format for calendar dates.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// The canonical schema. The four tables of the core data model; foreign
/// keys are declarative only - revoking a token deletes the user row and
/// intentionally leaves subscription/key rows behind.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    password TEXT NOT NULL DEFAULT '',
    hwid     TEXT NOT NULL,
    paket    TEXT NOT NULL,
    token    TEXT NOT NULL UNIQUE,
    email    TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS subscriptions (
    sub_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL,
    paket         TEXT NOT NULL,
    start_date    TEXT NOT NULL,
    end_date      TEXT NOT NULL,
    canceled_flag INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY(username) REFERENCES users(username)
);
CREATE TABLE IF NOT EXISTS keys (
    key_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    key_value   TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    valid_until TEXT,
    username    TEXT NOT NULL,
    paket       TEXT NOT NULL,
    FOREIGN KEY(username) REFERENCES users(username)
);
CREATE TABLE IF NOT EXISTS payments (
    payment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    username   TEXT NOT NULL,
    amount     REAL NOT NULL,
    currency   TEXT NOT NULL,
    status     TEXT NOT NULL,
    timestamp  TEXT NOT NULL,
    FOREIGN KEY(username) REFERENCES users(username)
);
CREATE INDEX IF NOT EXISTS idx_subscriptions_username ON subscriptions(username);
CREATE INDEX IF NOT EXISTS idx_keys_username ON keys(username);
"#;

/// Handle to the embedded SQLite database.
///
/// All access serializes on a single async mutex, so a read-modify-write
/// sequence inside one repository call can never interleave with another
/// writer. The lock is never held across an external call.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open(path: &str) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a fresh in-memory database. Used by the test suites.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        // Foreign keys are declarative only (see SCHEMA); the bundled SQLite
        // enables them by default, so turn enforcement back off.
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        // Substring filters in the admin views are case-sensitive.
        conn.execute_batch("PRAGMA case_sensitive_like = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Acquires the global store lock.
    pub(crate) async fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

pub(crate) fn format_datetime(t: DateTime<Utc>) -> String {
    t.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub(crate) fn read_datetime(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn read_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn read_package(idx: usize, raw: &str) -> rusqlite::Result<Package> {
    raw.parse::<Package>().map_err(|e| conversion_failure(idx, e))
}

fn conversion_failure(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_applies_cleanly() {
        let db = Database::open_in_memory().expect("open");
        let conn = db.conn.try_lock().expect("uncontended lock");
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .expect("prepare")
            .query_map([], |row| row.get(0))
            .expect("query")
            .collect::<rusqlite::Result<_>>()
            .expect("rows");
        for table in ["keys", "payments", "subscriptions", "users"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
    }

    #[test]
    fn test_datetime_round_trip_is_second_precise() {
        let t = DateTime::parse_from_rfc3339("2026-08-06T10:11:12Z")
            .expect("parse")
            .with_timezone(&Utc);
        let raw = format_datetime(t);
        assert_eq!(raw, "2026-08-06T10:11:12");
        assert_eq!(read_datetime(0, &raw).expect("read"), t);
    }

    #[test]
    fn test_date_round_trip() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 6).expect("valid date");
        assert_eq!(read_date(0, &format_date(d)).expect("read"), d);
    }
}
