//! v001 -- Initial schema creation.
//!
//! Creates the `images` table and the multi-valued `image_tags` index table.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Images
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS images (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4, assigned by the caller
    prompt      TEXT NOT NULL,
    model_used  TEXT NOT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    image_mime  TEXT NOT NULL,
    image_bytes BLOB NOT NULL,
    width       INTEGER,
    height      INTEGER,
    created_at  TEXT NOT NULL,                -- RFC-3339, fixed width, UTC
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_images_created_at ON images(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_images_favorite ON images(is_favorite);

-- ----------------------------------------------------------------
-- Manual tags (one row per entry, order preserved by position)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS image_tags (
    image_id TEXT NOT NULL,                   -- FK -> images(id)
    position INTEGER NOT NULL,
    tag      TEXT NOT NULL,

    PRIMARY KEY (image_id, position),
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_image_tags_tag ON image_tags(tag);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
