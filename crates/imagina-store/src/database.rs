//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.  It is opened once at
//! application start and handed explicitly to every call site.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Name of the SQL function used for case-insensitive substring search.
pub(crate) const CONTAINS_CI: &str = "contains_ci";

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/imagina/imagina.db`
    /// - macOS:   `~/Library/Application Support/app.imagina.imagina/imagina.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\imagina\imagina\data\imagina.db`
    pub fn new() -> Result<Self> {
        let db_path = default_path()?;
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    ///
    /// Idempotent: reopening an up-to-date database changes nothing, and an
    /// older schema is upgraded in place.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Recommended SQLite settings.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::init(conn)
    }

    /// A private, throwaway database.  Mostly useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        register_functions(&conn)?;

        // Run schema migrations.
        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// The underlying connection, for the store's own modules and tests.
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

/// Platform default location of the database file.
pub fn default_path() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("app", "imagina", "imagina").ok_or(StoreError::NoDataDir)?;
    Ok(project_dirs.data_dir().join("imagina.db"))
}

fn register_functions(conn: &Connection) -> Result<()> {
    // contains_ci(haystack, needle): Unicode-aware, unlike LIKE which only
    // folds ASCII.
    conn.create_scalar_function(
        CONTAINS_CI,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack: Option<String> = ctx.get(0)?;
            let needle: Option<String> = ctx.get(1)?;
            Ok(match (haystack, needle) {
                (Some(h), Some(n)) => h.to_lowercase().contains(&n.to_lowercase()),
                _ => false,
            })
        },
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Timestamp encoding
// ---------------------------------------------------------------------------

/// Fixed-width RFC 3339 (`...T..:..:..ffffffZ`) so text order is time order.
pub(crate) fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Truncate to the precision the database keeps.
pub(crate) fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(ts.timestamp_micros()).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
        drop(db);

        // reopening is idempotent
        Database::open_at(&path).expect("should reopen");
    }

    #[test]
    fn contains_ci_folds_unicode() {
        let db = Database::open_in_memory().unwrap();
        let hit: bool = db
            .conn()
            .query_row("SELECT contains_ci('ÉTÉ Rouge', 'été')", [], |r| r.get(0))
            .unwrap();
        assert!(hit);

        let null: bool = db
            .conn()
            .query_row("SELECT contains_ci(NULL, 'x')", [], |r| r.get(0))
            .unwrap();
        assert!(!null);
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let a = decode_timestamp("2024-05-01T10:00:00.5+00:00").unwrap();
        let b = decode_timestamp("2024-05-01T10:00:00.123456+00:00").unwrap();
        assert!(encode_timestamp(&b) < encode_timestamp(&a));
        assert_eq!(encode_timestamp(&a), "2024-05-01T10:00:00.500000Z");
    }
}
