//! Domain model persisted in the local image database.

use chrono::{DateTime, Utc};
use imagina_shared::{GenerationParams, ImageData};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ImageRecord
// ---------------------------------------------------------------------------

/// One generated image and its metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRecord {
    /// Primary key, assigned by the caller before insert.
    pub id: Uuid,
    /// Encoded image bytes and MIME type.
    pub image: ImageData,
    /// The prompt the image was generated from.
    pub prompt: String,
    /// Manual labels entered by the user.
    pub tags: Vec<String>,
    /// AI-suggested labels. Never merged into `tags`.
    pub collections: Vec<String>,
    /// AI-proposed alternative prompt.
    pub suggested_prompt: Option<String>,
    /// Identifier of the generation backend/model.
    pub model_used: String,
    pub is_favorite: bool,
    pub params: GenerationParams,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Set once at insert.
    pub created_at: DateTime<Utc>,
    /// Rewritten on every mutation.
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// A fresh record stamped with the current time and default metadata.
    pub fn new(
        id: Uuid,
        image: ImageData,
        prompt: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            image,
            prompt: prompt.into(),
            tags: Vec::new(),
            collections: Vec::new(),
            suggested_prompt: None,
            model_used: model_used.into(),
            is_favorite: false,
            params: GenerationParams::default(),
            width: None,
            height: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// ImageChanges
// ---------------------------------------------------------------------------

/// A partial update. `None` leaves the field untouched.
///
/// `id` and `created_at` are immutable, and `updated_at` is always stamped by
/// the store, so none of them appear here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageChanges {
    pub image: Option<ImageData>,
    pub prompt: Option<String>,
    pub tags: Option<Vec<String>>,
    pub collections: Option<Vec<String>>,
    /// `Some(None)` clears the suggestion.
    pub suggested_prompt: Option<Option<String>>,
    pub model_used: Option<String>,
    pub is_favorite: Option<bool>,
    pub params: Option<GenerationParams>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageChanges {
    pub fn favorite(is_favorite: bool) -> Self {
        Self {
            is_favorite: Some(is_favorite),
            ..Default::default()
        }
    }

    pub fn tags(tags: Vec<String>) -> Self {
        Self {
            tags: Some(tags),
            ..Default::default()
        }
    }

    /// Image replacement used by resize.
    pub fn resized(image: ImageData, width: u32, height: u32) -> Self {
        Self {
            image: Some(image),
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    /// Apply the changes to an in-memory record. Timestamps are left alone.
    pub fn apply_to(&self, record: &mut ImageRecord) {
        if let Some(image) = &self.image {
            record.image = image.clone();
        }
        if let Some(prompt) = &self.prompt {
            record.prompt = prompt.clone();
        }
        if let Some(tags) = &self.tags {
            record.tags = tags.clone();
        }
        if let Some(collections) = &self.collections {
            record.collections = collections.clone();
        }
        if let Some(suggested) = &self.suggested_prompt {
            record.suggested_prompt = suggested.clone();
        }
        if let Some(model) = &self.model_used {
            record.model_used = model.clone();
        }
        if let Some(fav) = self.is_favorite {
            record.is_favorite = fav;
        }
        if let Some(params) = &self.params {
            record.params = params.clone();
        }
        if let Some(width) = self.width {
            record.width = Some(width);
        }
        if let Some(height) = self.height {
            record.height = Some(height);
        }
    }
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// One page of a filtered query, plus the total over the whole store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePage {
    pub items: Vec<ImageRecord>,
    /// Records matching the filters across every page.
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl ImagePage {
    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ImageRecord {
        ImageRecord::new(
            Uuid::new_v4(),
            ImageData::new("image/png", vec![1]),
            "a red fox",
            "test-model",
        )
    }

    #[test]
    fn test_new_record_defaults() {
        let rec = record();
        assert!(!rec.is_favorite);
        assert!(rec.collections.is_empty());
        assert_eq!(rec.params, GenerationParams::default());
        assert_eq!(rec.created_at, rec.updated_at);
    }

    #[test]
    fn test_apply_changes_keeps_tags_and_collections_apart() {
        let mut rec = record().with_tags(["animal"]);
        let changes = ImageChanges {
            collections: Some(vec!["Nature".into()]),
            suggested_prompt: Some(Some("a fox at dusk".into())),
            ..Default::default()
        };
        changes.apply_to(&mut rec);
        assert_eq!(rec.tags, vec!["animal".to_string()]);
        assert_eq!(rec.collections, vec!["Nature".to_string()]);
        assert_eq!(rec.suggested_prompt.as_deref(), Some("a fox at dusk"));

        ImageChanges {
            suggested_prompt: Some(None),
            ..Default::default()
        }
        .apply_to(&mut rec);
        assert_eq!(rec.suggested_prompt, None);
    }

    #[test]
    fn test_total_pages() {
        let page = ImagePage {
            items: Vec::new(),
            total: 25,
            page: 1,
            page_size: 12,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
