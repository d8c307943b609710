//! Database migration runner.
//!
//! Migrations are executed in order on every [`Database::open_at`] call.
//! Each one is guarded by the `user_version` pragma so it runs exactly once,
//! and runs in the same transaction as its version bump.
//!
//! [`Database::open_at`]: crate::Database::open_at

pub mod v001_initial;
pub mod v002_ai_metadata;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.  Bump this and add a new migration module whenever
/// the schema changes.  Migrations must stay additive.
pub const CURRENT_VERSION: u32 = 2;

type Up = fn(&Connection) -> std::result::Result<(), rusqlite::Error>;

const MIGRATIONS: &[(u32, &str, Up)] = &[
    (1, "v001_initial", v001_initial::up),
    (2, "v002_ai_metadata", v002_ai_metadata::up),
];

/// Run all pending migrations against the open connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;

    tracing::info!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking database migrations"
    );

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{current} is newer than supported v{CURRENT_VERSION}"
        )));
    }

    for &(version, name, up) in MIGRATIONS {
        if current >= version {
            continue;
        }

        tracing::info!(migration = name, "applying migration");
        let tx = conn.unchecked_transaction()?;
        up(&tx).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }

    Ok(())
}

/// Read `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[test]
    fn test_fresh_database_is_current() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(schema_version(db.conn()).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_rerun_is_noop() {
        let db = Database::open_in_memory().unwrap();
        run_migrations(db.conn()).unwrap();
        assert_eq!(schema_version(db.conn()).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_v1_rows_upgrade_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        let id = uuid::Uuid::new_v4();

        {
            let conn = Connection::open(&path).unwrap();
            v001_initial::up(&conn).unwrap();
            conn.pragma_update(None, "user_version", 1).unwrap();
            conn.execute(
                "INSERT INTO images (id, prompt, model_used, is_favorite, image_mime, image_bytes,
                                     width, height, created_at, updated_at)
                 VALUES (?1, 'old fox', 'legacy-model', 1, 'image/png', X'0102', NULL, NULL,
                         '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
                [id.to_string()],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO image_tags (image_id, position, tag) VALUES (?1, 0, 'animal')",
                [id.to_string()],
            )
            .unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        assert_eq!(schema_version(db.conn()).unwrap(), CURRENT_VERSION);

        let rec = db.get_image(id).unwrap().expect("legacy row survives");
        assert_eq!(rec.prompt, "old fox");
        assert!(rec.is_favorite);
        assert_eq!(rec.tags, vec!["animal".to_string()]);
        assert!(rec.collections.is_empty());
        assert_eq!(rec.suggested_prompt, None);
        assert_eq!(rec.params, imagina_shared::GenerationParams::default());
        assert_eq!(rec.image.bytes, vec![1, 2]);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", CURRENT_VERSION + 1)
                .unwrap();
        }
        assert!(matches!(
            Database::open_at(&path),
            Err(StoreError::Migration(_))
        ));
    }
}
