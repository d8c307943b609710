//! CRUD operations on [`ImageRecord`] and the favorite toggle.

use chrono::{DateTime, Duration, Utc};
use imagina_shared::{GenerationParams, ImageData};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::database::{decode_timestamp, encode_timestamp, truncate_to_micros, Database};
use crate::error::{Result, StoreError};
use crate::models::{ImageChanges, ImageRecord};

/// Column list shared by every query that materialises a record.
/// The `images` table must be aliased as `i`.
pub(crate) const IMAGE_COLUMNS: &str = "i.id, i.prompt, i.model_used, i.is_favorite, \
     i.image_mime, i.image_bytes, i.width, i.height, i.suggested_prompt, \
     i.artistic_style, i.aspect_ratio, i.image_quality, i.created_at, i.updated_at";

/// The two multi-valued label tables.
#[derive(Debug, Clone, Copy)]
pub(crate) enum LabelTable {
    Tags,
    Collections,
}

impl LabelTable {
    fn table(self) -> &'static str {
        match self {
            LabelTable::Tags => "image_tags",
            LabelTable::Collections => "image_collections",
        }
    }

    fn column(self) -> &'static str {
        match self {
            LabelTable::Tags => "tag",
            LabelTable::Collections => "label",
        }
    }
}

impl Database {
    /// Insert a new record.
    ///
    /// Blank generation parameters are replaced with their defaults and
    /// labels are trimmed and de-duplicated before writing.  Fails with
    /// [`StoreError::DuplicateId`] if the id is taken; the existing record is
    /// left untouched.
    pub fn add_image(&self, record: &ImageRecord) -> Result<Uuid> {
        let tx = self.conn().unchecked_transaction()?;
        let id = insert_in(&tx, record)?;
        tx.commit()?;
        Ok(id)
    }

    /// Fetch a record by id.  A missing id is `Ok(None)`, not an error.
    pub fn get_image(&self, id: Uuid) -> Result<Option<ImageRecord>> {
        fetch_image(self.conn(), id)
    }

    /// Apply a partial update and stamp `updated_at`, atomically.
    ///
    /// Returns the number of affected records.
    pub fn update_image(&self, id: Uuid, changes: &ImageChanges) -> Result<usize> {
        let tx = self.conn().unchecked_transaction()?;
        let affected = update_in(&tx, id, changes)?;
        tx.commit()?;

        tracing::debug!(id = %id, "image updated");
        Ok(affected)
    }

    /// Flip `is_favorite` and return the new value.
    pub fn toggle_favorite(&self, id: Uuid) -> Result<bool> {
        let tx = self.conn().unchecked_transaction()?;
        let current: Option<i32> = tx
            .query_row(
                "SELECT is_favorite FROM images WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let current = current.ok_or(StoreError::NotFound(id))? != 0;

        update_in(&tx, id, &ImageChanges::favorite(!current))?;
        tx.commit()?;

        Ok(!current)
    }

    /// Remove a record.  Deleting an absent id is a no-op.
    pub fn delete_image(&self, id: Uuid) -> Result<bool> {
        let tx = self.conn().unchecked_transaction()?;
        delete_labels(&tx, LabelTable::Tags, id)?;
        delete_labels(&tx, LabelTable::Collections, id)?;
        let affected = tx.execute("DELETE FROM images WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        Ok(affected > 0)
    }

    /// Remove every record.  Returns how many were deleted.
    pub fn clear_images(&self) -> Result<usize> {
        let tx = self.conn().unchecked_transaction()?;
        tx.execute("DELETE FROM image_tags", [])?;
        tx.execute("DELETE FROM image_collections", [])?;
        let affected = tx.execute("DELETE FROM images", [])?;
        tx.commit()?;

        tracing::info!(deleted = affected, "image history cleared");
        Ok(affected)
    }

    pub fn count_images(&self) -> Result<u64> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

// ---------------------------------------------------------------------------
// Helpers shared with the query, view and backup modules
// ---------------------------------------------------------------------------

pub(crate) fn fetch_image(conn: &Connection, id: Uuid) -> Result<Option<ImageRecord>> {
    let sql = format!("SELECT {IMAGE_COLUMNS} FROM images i WHERE i.id = ?1");
    let record = conn
        .query_row(&sql, params![id.to_string()], row_to_image)
        .optional()?;

    match record {
        Some(mut rec) => {
            load_labels(conn, &mut rec)?;
            Ok(Some(rec))
        }
        None => Ok(None),
    }
}

/// Fill `tags` and `collections` for a record read by [`row_to_image`].
pub(crate) fn load_labels(conn: &Connection, record: &mut ImageRecord) -> Result<()> {
    record.tags = read_labels(conn, LabelTable::Tags, record.id)?;
    record.collections = read_labels(conn, LabelTable::Collections, record.id)?;
    Ok(())
}

/// Decode one row selected with [`IMAGE_COLUMNS`].  Labels are left empty.
pub(crate) fn row_to_image(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageRecord> {
    let id_str: String = row.get(0)?;
    let prompt: String = row.get(1)?;
    let model_used: String = row.get(2)?;
    let is_favorite_int: i32 = row.get(3)?;
    let image_mime: String = row.get(4)?;
    let image_bytes: Vec<u8> = row.get(5)?;
    let width: Option<u32> = row.get(6)?;
    let height: Option<u32> = row.get(7)?;
    let suggested_prompt: Option<String> = row.get(8)?;
    let artistic_style: String = row.get(9)?;
    let aspect_ratio: String = row.get(10)?;
    let image_quality: String = row.get(11)?;
    let created_str: String = row.get(12)?;
    let updated_str: String = row.get(13)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at = decode_timestamp(&created_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let updated_at = decode_timestamp(&updated_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(13, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ImageRecord {
        id,
        image: ImageData {
            mime_type: image_mime,
            bytes: image_bytes,
        },
        prompt,
        tags: Vec::new(),
        collections: Vec::new(),
        suggested_prompt,
        model_used,
        is_favorite: is_favorite_int != 0,
        params: GenerationParams {
            artistic_style,
            aspect_ratio,
            image_quality,
        },
        width,
        height,
        created_at,
        updated_at,
    })
}

/// Trim labels, drop blanks and keep the first occurrence of duplicates.
pub(crate) fn normalize_labels(labels: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim();
        if !label.is_empty() && !out.iter().any(|l| l == label) {
            out.push(label.to_string());
        }
    }
    out
}

fn validate(record: &ImageRecord) -> Result<()> {
    if record.prompt.trim().is_empty() {
        return Err(StoreError::validation("prompt must not be empty"));
    }
    if record.image.is_empty() {
        return Err(StoreError::validation("image data must not be empty"));
    }
    if record.image.mime_type.trim().is_empty() {
        return Err(StoreError::validation("image MIME type must not be empty"));
    }
    Ok(())
}

fn prepare_insert(record: &ImageRecord) -> Result<ImageRecord> {
    validate(record)?;

    let mut record = record.clone();
    record.tags = normalize_labels(&record.tags);
    record.collections = normalize_labels(&record.collections);
    record.params = record.params.normalized();
    record.suggested_prompt = record
        .suggested_prompt
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    record.created_at = truncate_to_micros(record.created_at);
    record.updated_at = truncate_to_micros(record.updated_at).max(record.created_at);
    Ok(record)
}

/// `updated_at` for a mutation: now, or one microsecond past the previous
/// stamp if the clock has not moved beyond it.
fn next_updated_at(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = truncate_to_micros(Utc::now());
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Validate, normalise and insert inside the caller's transaction.
///
/// A duplicate id or a validation failure returns before anything is
/// written, so the transaction stays usable.
pub(crate) fn insert_in(conn: &Connection, record: &ImageRecord) -> Result<Uuid> {
    let record = prepare_insert(record)?;

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO images (id, prompt, model_used, is_favorite, image_mime,
                                       image_bytes, width, height, suggested_prompt,
                                       artistic_style, aspect_ratio, image_quality,
                                       created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            record.id.to_string(),
            record.prompt,
            record.model_used,
            record.is_favorite as i32,
            record.image.mime_type,
            record.image.bytes,
            record.width,
            record.height,
            record.suggested_prompt,
            record.params.artistic_style,
            record.params.aspect_ratio,
            record.params.image_quality,
            encode_timestamp(&record.created_at),
            encode_timestamp(&record.updated_at),
        ],
    )?;
    if inserted == 0 {
        return Err(StoreError::DuplicateId(record.id));
    }

    write_labels(conn, LabelTable::Tags, record.id, &record.tags)?;
    write_labels(conn, LabelTable::Collections, record.id, &record.collections)?;

    tracing::debug!(id = %record.id, size = record.image.len(), "image added");
    Ok(record.id)
}

/// Read-modify-write inside the caller's transaction.
fn update_in(conn: &Connection, id: Uuid, changes: &ImageChanges) -> Result<usize> {
    let mut record = fetch_image(conn, id)?.ok_or(StoreError::NotFound(id))?;

    changes.apply_to(&mut record);
    validate(&record)?;
    record.tags = normalize_labels(&record.tags);
    record.collections = normalize_labels(&record.collections);
    record.params = record.params.normalized();
    record.updated_at = next_updated_at(record.updated_at);

    let affected = conn.execute(
        "UPDATE images
         SET prompt = ?2, model_used = ?3, is_favorite = ?4, image_mime = ?5, image_bytes = ?6,
             width = ?7, height = ?8, suggested_prompt = ?9, artistic_style = ?10,
             aspect_ratio = ?11, image_quality = ?12, updated_at = ?13
         WHERE id = ?1",
        params![
            id.to_string(),
            record.prompt,
            record.model_used,
            record.is_favorite as i32,
            record.image.mime_type,
            record.image.bytes,
            record.width,
            record.height,
            record.suggested_prompt,
            record.params.artistic_style,
            record.params.aspect_ratio,
            record.params.image_quality,
            encode_timestamp(&record.updated_at),
        ],
    )?;

    if changes.tags.is_some() {
        delete_labels(conn, LabelTable::Tags, id)?;
        write_labels(conn, LabelTable::Tags, id, &record.tags)?;
    }
    if changes.collections.is_some() {
        delete_labels(conn, LabelTable::Collections, id)?;
        write_labels(conn, LabelTable::Collections, id, &record.collections)?;
    }

    Ok(affected)
}

fn read_labels(conn: &Connection, kind: LabelTable, id: Uuid) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE image_id = ?1 ORDER BY position",
        kind.column(),
        kind.table()
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;

    let mut labels = Vec::new();
    for row in rows {
        labels.push(row?);
    }
    Ok(labels)
}

fn write_labels(conn: &Connection, kind: LabelTable, id: Uuid, labels: &[String]) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (image_id, position, {}) VALUES (?1, ?2, ?3)",
        kind.table(),
        kind.column()
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    for (position, label) in labels.iter().enumerate() {
        stmt.execute(params![id.to_string(), position as i64, label])?;
    }
    Ok(())
}

fn delete_labels(conn: &Connection, kind: LabelTable, id: Uuid) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE image_id = ?1", kind.table());
    conn.execute(&sql, params![id.to_string()])?;
    Ok(())
}
