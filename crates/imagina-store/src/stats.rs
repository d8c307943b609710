//! Aggregate counts for the statistics view.

use imagina_shared::constants::{DEFAULT_ARTISTIC_STYLE, STATS_TOP_N};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryStats {
    pub total: u64,
    pub favorites: u64,
    pub top_tags: Vec<LabelCount>,
    pub top_collections: Vec<LabelCount>,
    /// Artistic styles other than the default "none".
    pub top_styles: Vec<LabelCount>,
}

impl Database {
    pub fn gallery_stats(&self) -> Result<GalleryStats> {
        let tx = self.conn().unchecked_transaction()?;

        let (total, favorites): (i64, i64) = tx.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_favorite), 0) FROM images",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let top_tags = top_counts(
            &tx,
            "SELECT tag, COUNT(*) AS n FROM image_tags
             GROUP BY tag ORDER BY n DESC, tag ASC LIMIT ?1",
            None,
        )?;
        let top_collections = top_counts(
            &tx,
            "SELECT label, COUNT(*) AS n FROM image_collections
             GROUP BY label ORDER BY n DESC, label ASC LIMIT ?1",
            None,
        )?;
        let top_styles = top_counts(
            &tx,
            "SELECT artistic_style, COUNT(*) AS n FROM images
             WHERE artistic_style <> ?2
             GROUP BY artistic_style ORDER BY n DESC, artistic_style ASC LIMIT ?1",
            Some(DEFAULT_ARTISTIC_STYLE),
        )?;
        tx.commit()?;

        Ok(GalleryStats {
            total: total as u64,
            favorites: favorites as u64,
            top_tags,
            top_collections,
            top_styles,
        })
    }
}

fn top_counts(conn: &Connection, sql: &str, exclude: Option<&str>) -> Result<Vec<LabelCount>> {
    let mut stmt = conn.prepare(sql)?;
    let map = |row: &rusqlite::Row<'_>| {
        Ok(LabelCount {
            name: row.get(0)?,
            count: row.get::<_, i64>(1)? as u64,
        })
    };
    let limit = STATS_TOP_N as i64;
    let rows = match exclude {
        Some(value) => stmt.query_map(params![limit, value], map)?,
        None => stmt.query_map(params![limit], map)?,
    };

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
