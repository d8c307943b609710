//! JSON export/import of the whole image history.
//!
//! The file is a JSON array of [`ExportedImage`].  Image bytes travel as
//! base64 `data:` URIs and timestamps as RFC 3339 strings.  Import never
//! overwrites: elements whose id already exists are skipped, and elements
//! that fail validation are rejected with a reason.

use chrono::Utc;
use imagina_shared::transcode::{decode_data_uri, encode_data_uri};
use imagina_shared::GenerationParams;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::database::{decode_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::images::{insert_in, load_labels, row_to_image, IMAGE_COLUMNS};
use crate::models::ImageRecord;

/// Model id recorded for imported elements that lack one.
const UNKNOWN_MODEL: &str = "unknown";

/// One exported record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedImage {
    pub id: String,
    /// `data:<mime>;base64,...`
    pub image_data: String,
    pub prompt: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_prompt: Option<String>,
    pub model_used: String,
    pub is_favorite: bool,
    pub artistic_style: String,
    pub aspect_ratio: String,
    pub image_quality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ImageRecord> for ExportedImage {
    fn from(rec: &ImageRecord) -> Self {
        Self {
            id: rec.id.to_string(),
            image_data: encode_data_uri(&rec.image),
            prompt: rec.prompt.clone(),
            tags: rec.tags.clone(),
            collections: rec.collections.clone(),
            suggested_prompt: rec.suggested_prompt.clone(),
            model_used: rec.model_used.clone(),
            is_favorite: rec.is_favorite,
            artistic_style: rec.params.artistic_style.clone(),
            aspect_ratio: rec.params.aspect_ratio.clone(),
            image_quality: rec.params.image_quality.clone(),
            width: rec.width,
            height: rec.height,
            created_at: rec.created_at.to_rfc3339(),
            updated_at: rec.updated_at.to_rfc3339(),
        }
    }
}

/// Why an import element was not accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("element is not a JSON object")]
    NotAnObject,

    #[error("malformed element: {0}")]
    Malformed(String),

    #[error("missing or empty field '{0}'")]
    MissingField(&'static str),

    #[error("invalid id '{0}'")]
    InvalidId(String),

    #[error("invalid image data: {0}")]
    InvalidImageData(String),

    #[error("{0}")]
    Store(String),
}

/// Result of validating one untyped import element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportCandidate {
    Valid(Box<ImageRecord>),
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRejection {
    /// Position of the element in the imported array.
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub imported: usize,
    /// Duplicates plus rejected elements.
    pub skipped: usize,
    pub duplicates: usize,
    pub rejected: Vec<ImportRejection>,
}

/// Lenient view of an import element.  Every field is optional here; the
/// required ones are checked in [`validate_import`].
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ImportFields {
    id: Option<String>,
    image_data: Option<String>,
    prompt: Option<String>,
    tags: Option<Vec<String>>,
    collections: Option<Vec<String>>,
    suggested_prompt: Option<String>,
    model_used: Option<String>,
    is_favorite: Option<bool>,
    artistic_style: Option<String>,
    aspect_ratio: Option<String>,
    image_quality: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> std::result::Result<String, RejectReason> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(RejectReason::MissingField(field))
}

/// Turn one untyped JSON element into a record, or explain why not.
pub fn validate_import(value: &Value) -> ImportCandidate {
    match try_validate(value) {
        Ok(record) => ImportCandidate::Valid(Box::new(record)),
        Err(reason) => ImportCandidate::Rejected(reason),
    }
}

fn try_validate(value: &Value) -> std::result::Result<ImageRecord, RejectReason> {
    if !value.is_object() {
        return Err(RejectReason::NotAnObject);
    }
    let fields: ImportFields = serde_json::from_value(value.clone())
        .map_err(|e| RejectReason::Malformed(e.to_string()))?;

    let id_str = required(fields.id, "id")?;
    let prompt = required(fields.prompt, "prompt")?;
    let image_uri = required(fields.image_data, "imageData")?;

    let id = Uuid::parse_str(id_str.trim()).map_err(|_| RejectReason::InvalidId(id_str.clone()))?;
    let image =
        decode_data_uri(&image_uri).map_err(|e| RejectReason::InvalidImageData(e.to_string()))?;
    if image.is_empty() {
        return Err(RejectReason::InvalidImageData("empty payload".into()));
    }

    let now = Utc::now();
    let created_at = fields
        .created_at
        .as_deref()
        .and_then(|s| decode_timestamp(s).ok())
        .unwrap_or(now);
    let updated_at = fields
        .updated_at
        .as_deref()
        .and_then(|s| decode_timestamp(s).ok())
        .unwrap_or(created_at)
        .max(created_at);

    let defaults = GenerationParams::default();
    let params = GenerationParams {
        artistic_style: fields.artistic_style.unwrap_or(defaults.artistic_style),
        aspect_ratio: fields.aspect_ratio.unwrap_or(defaults.aspect_ratio),
        image_quality: fields.image_quality.unwrap_or(defaults.image_quality),
    }
    .normalized();

    Ok(ImageRecord {
        id,
        image,
        prompt,
        tags: fields.tags.unwrap_or_default(),
        collections: fields.collections.unwrap_or_default(),
        suggested_prompt: fields.suggested_prompt,
        model_used: fields
            .model_used
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_MODEL.to_string()),
        is_favorite: fields.is_favorite.unwrap_or(false),
        params,
        width: fields.width,
        height: fields.height,
        created_at,
        updated_at,
    })
}

impl Database {
    /// Every record, newest first, in export form.
    pub fn export_images(&self) -> Result<Vec<ExportedImage>> {
        let tx = self.conn().unchecked_transaction()?;
        let mut exported = Vec::new();
        {
            let mut stmt = tx.prepare(&format!(
                "SELECT {IMAGE_COLUMNS} FROM images i ORDER BY i.created_at DESC, i.rowid DESC"
            ))?;
            let rows = stmt.query_map([], row_to_image)?;
            for row in rows {
                let mut record = row?;
                load_labels(&tx, &mut record)?;
                exported.push(ExportedImage::from(&record));
            }
        }
        tx.commit()?;
        Ok(exported)
    }

    /// Pretty-printed JSON array of [`ExportedImage`].
    pub fn export_json(&self) -> Result<String> {
        let images = self.export_images()?;
        tracing::info!(images = images.len(), "history exported");
        Ok(serde_json::to_string_pretty(&images)?)
    }

    /// Import an export file.  The top level must be a JSON array.
    pub fn import_json(&self, json: &str) -> Result<ImportStats> {
        let value: Value = serde_json::from_str(json)?;
        match value {
            Value::Array(items) => self.import_values(&items),
            _ => Err(StoreError::validation(
                "import file must contain a JSON array",
            )),
        }
    }

    /// Import already-parsed elements, skipping invalid and duplicate ones.
    ///
    /// All-or-nothing: a storage failure rolls back every element written so
    /// far and is returned as the error.
    pub fn import_values(&self, items: &[Value]) -> Result<ImportStats> {
        let mut stats = ImportStats::default();
        let tx = self.conn().unchecked_transaction()?;

        for (index, item) in items.iter().enumerate() {
            let record = match validate_import(item) {
                ImportCandidate::Valid(record) => record,
                ImportCandidate::Rejected(reason) => {
                    tracing::debug!(index, %reason, "import element rejected");
                    stats.reject(index, reason);
                    continue;
                }
            };

            match insert_in(&tx, &record) {
                Ok(_) => stats.imported += 1,
                Err(StoreError::DuplicateId(id)) => {
                    tracing::debug!(index, id = %id, "import element already present");
                    stats.duplicates += 1;
                    stats.skipped += 1;
                }
                Err(StoreError::Validation(msg)) => {
                    stats.reject(index, RejectReason::Store(msg));
                }
                Err(other) => {
                    tracing::warn!(index, error = %other, "import aborted, rolling back");
                    return Err(other);
                }
            }
        }
        tx.commit()?;

        tracing::info!(
            imported = stats.imported,
            skipped = stats.skipped,
            "history imported"
        );
        Ok(stats)
    }
}

impl ImportStats {
    fn reject(&mut self, index: usize, reason: RejectReason) {
        self.skipped += 1;
        self.rejected.push(ImportRejection {
            index,
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::tests::sample;
    use serde_json::json;

    #[test]
    fn test_export_import_round_trip() {
        let source = Database::open_in_memory().unwrap();
        let mut rec = sample("a red fox", &["animal"]);
        rec.collections = vec!["Nature".into()];
        rec.suggested_prompt = Some("a fox in snow".into());
        rec.is_favorite = true;
        rec.width = Some(3);
        rec.height = Some(4);
        source.add_image(&rec).unwrap();
        source.add_image(&sample("a red car", &["vehicle"])).unwrap();

        let json = source.export_json().unwrap();

        let target = Database::open_in_memory().unwrap();
        let stats = target.import_json(&json).unwrap();
        assert_eq!(stats.imported, 2);
        assert_eq!(stats.skipped, 0);

        let restored = target.get_image(rec.id).unwrap().unwrap();
        let original = source.get_image(rec.id).unwrap().unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_import_skips_existing_id() {
        let db = Database::open_in_memory().unwrap();
        let existing = sample("keep me", &["original"]);
        db.add_image(&existing).unwrap();

        let mut colliding = ExportedImage::from(&sample("replacement", &["new"]));
        colliding.id = existing.id.to_string();
        let file = serde_json::to_string(&vec![
            ExportedImage::from(&sample("one", &[])),
            colliding,
            ExportedImage::from(&sample("two", &[])),
        ])
        .unwrap();

        let stats = db.import_json(&file).unwrap();
        assert_eq!(stats.imported, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.duplicates, 1);

        let kept = db.get_image(existing.id).unwrap().unwrap();
        assert_eq!(kept.prompt, "keep me");
        assert_eq!(kept.tags, vec!["original".to_string()]);
        assert_eq!(db.count_images().unwrap(), 3);
    }

    #[test]
    fn test_import_rejects_incomplete_elements() {
        let db = Database::open_in_memory().unwrap();
        let good = ExportedImage::from(&sample("fine", &[]));
        let items = vec![
            serde_json::to_value(&good).unwrap(),
            json!({ "id": Uuid::new_v4().to_string(), "prompt": "no image" }),
            json!({ "id": "", "prompt": "x", "imageData": good.image_data }),
            json!({ "id": "not-a-uuid", "prompt": "x", "imageData": good.image_data }),
            json!({ "id": Uuid::new_v4().to_string(), "prompt": "x", "imageData": "nope" }),
            json!({ "id": Uuid::new_v4().to_string(), "prompt": "x",
                    "imageData": good.image_data, "tags": 5 }),
            json!("just a string"),
        ];

        let stats = db.import_values(&items).unwrap();
        assert_eq!(stats.imported, 1);
        assert_eq!(stats.skipped, 6);
        let indices: Vec<usize> = stats.rejected.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_validate_fills_defaults() {
        let good = ExportedImage::from(&sample("minimal", &[]));
        let id = Uuid::new_v4();
        let value = json!({
            "id": id.to_string(),
            "prompt": "minimal",
            "imageData": good.image_data,
            "createdAt": "2024-03-01T12:00:00Z",
            "updatedAt": "2023-01-01T00:00:00Z",
        });

        let ImportCandidate::Valid(record) = validate_import(&value) else {
            panic!("expected a valid candidate");
        };
        assert_eq!(record.id, id);
        assert_eq!(record.model_used, "unknown");
        assert_eq!(record.params, GenerationParams::default());
        assert!(record.collections.is_empty());
        // updatedAt is clamped to createdAt
        assert_eq!(record.updated_at, record.created_at);
    }

    #[test]
    fn test_import_requires_array() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.import_json(r#"{"id": "x"}"#),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(db.import_json("not json"), Err(StoreError::Json(_))));
    }

    #[test]
    fn test_round_trip_keeps_unusual_media_types() {
        let source = Database::open_in_memory().unwrap();
        let mimes = ["image/svg+xml; charset=utf-8", " image/png", "image/x,odd"];
        let mut ids = Vec::new();
        for mime in mimes {
            let mut rec = sample("odd media type", &[]);
            rec.image.mime_type = mime.to_string();
            ids.push(source.add_image(&rec).unwrap());
        }

        let target = Database::open_in_memory().unwrap();
        let stats = target.import_json(&source.export_json().unwrap()).unwrap();
        assert_eq!(stats.imported, 3);
        assert!(stats.rejected.is_empty());

        for (id, mime) in ids.into_iter().zip(mimes) {
            let restored = target.get_image(id).unwrap().unwrap();
            assert_eq!(restored.image.mime_type, mime);
        }
    }

    #[test]
    fn test_import_failure_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        db.add_image(&sample("already here", &[])).unwrap();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER fail_insert BEFORE INSERT ON images
                 WHEN NEW.prompt = 'explode'
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let file: Vec<ExportedImage> = [
            sample("first", &["kept?"]),
            sample("explode", &[]),
            sample("third", &[]),
        ]
        .iter()
        .map(ExportedImage::from)
        .collect();
        let json = serde_json::to_string(&file).unwrap();

        assert!(matches!(db.import_json(&json), Err(StoreError::Sqlite(_))));
        assert_eq!(db.count_images().unwrap(), 1);
        let tags: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM image_tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tags, 0);
    }
}
