//! v002 -- AI metadata and generation parameters.
//!
//! Purely additive: existing rows pick up the column defaults.

use rusqlite::Connection;

const UP_SQL: &str = r#"
ALTER TABLE images ADD COLUMN suggested_prompt TEXT;
ALTER TABLE images ADD COLUMN artistic_style TEXT NOT NULL DEFAULT 'none';
ALTER TABLE images ADD COLUMN aspect_ratio TEXT NOT NULL DEFAULT '1:1';
ALTER TABLE images ADD COLUMN image_quality TEXT NOT NULL DEFAULT 'standard';

-- AI-suggested collections, kept apart from manual tags
CREATE TABLE IF NOT EXISTS image_collections (
    image_id TEXT NOT NULL,                   -- FK -> images(id)
    position INTEGER NOT NULL,
    label    TEXT NOT NULL,

    PRIMARY KEY (image_id, position),
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_image_collections_label ON image_collections(label);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
