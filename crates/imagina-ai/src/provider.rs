//! Provider-facing types and the traits the gallery depends on.

use std::sync::Arc;

use async_trait::async_trait;
use imagina_shared::{GenerationParams, ImageData};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub params: GenerationParams,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            prompt: prompt.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub image: ImageData,
    /// Identifier of the model that produced the image.
    pub model_used: String,
}

/// Output of the suggestion provider, already cleaned up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions {
    pub collections: Vec<String>,
    pub suggested_prompt: Option<String>,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Produce one image for the request.
    ///
    /// A refusal by the provider's safety filtering is reported as
    /// [`AiError::Blocked`](crate::AiError::Blocked), never as a generic
    /// failure.
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage>;
}

#[async_trait]
pub trait TagSuggester: Send + Sync {
    /// Suggest collections and an alternate prompt for `prompt`.
    async fn suggest(&self, prompt: &str) -> Result<Suggestions>;
}

#[async_trait]
impl<T: ImageGenerator + ?Sized> ImageGenerator for Arc<T> {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        (**self).generate(request).await
    }
}

#[async_trait]
impl<T: TagSuggester + ?Sized> TagSuggester for Arc<T> {
    async fn suggest(&self, prompt: &str) -> Result<Suggestions> {
        (**self).suggest(prompt).await
    }
}
