use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ARTISTIC_STYLE, DEFAULT_ASPECT_RATIO, DEFAULT_IMAGE_QUALITY};

/// Raw encoded image bytes together with their MIME type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// image payloads can be megabytes; keep Debug output readable
impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Parameters a record was generated with, stored for "regenerate".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationParams {
    pub artistic_style: String,
    pub aspect_ratio: String,
    pub image_quality: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            artistic_style: DEFAULT_ARTISTIC_STYLE.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            image_quality: DEFAULT_IMAGE_QUALITY.to_string(),
        }
    }
}

impl GenerationParams {
    /// Trim every field and replace blank ones with their default.
    pub fn normalized(&self) -> Self {
        fn or_default(value: &str, default: &str) -> String {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed.to_string()
            }
        }

        Self {
            artistic_style: or_default(&self.artistic_style, DEFAULT_ARTISTIC_STYLE),
            aspect_ratio: or_default(&self.aspect_ratio, DEFAULT_ASPECT_RATIO),
            image_quality: or_default(&self.image_quality, DEFAULT_IMAGE_QUALITY),
        }
    }
}
