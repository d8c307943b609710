//! Generation workflow on top of the store and the AI providers.
//!
//! [`Gallery`] is the only place that talks to both.  Store calls are
//! synchronous SQLite work and run on the blocking pool behind a mutex, so
//! calls from one client complete in the order they were issued.

use std::sync::{Arc, Mutex};

use imagina_ai::{GenerationRequest, ImageGenerator, TagSuggester};
use imagina_shared::constants::MAX_PROMPT_CHARS;
use imagina_shared::{raster, GenerationParams};
use imagina_store::{
    Database, GalleryStats, ImageChanges, ImagePage, ImageQuery, ImageRecord, ImportStats,
    StoreError,
};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ServerError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// A generation request as submitted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInput {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub params: GenerationParams,
}

pub struct Gallery<G, S> {
    db: Arc<Mutex<Database>>,
    generator: G,
    suggester: S,
}

impl<G, S> Gallery<G, S>
where
    G: ImageGenerator,
    S: TagSuggester,
{
    pub fn new(db: Database, generator: G, suggester: S) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            generator,
            suggester,
        }
    }

    /// Run `f` against the database on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> imagina_store::Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| ServerError::Internal("database lock poisoned".to_string()))?;
            f(&*guard).map_err(ServerError::from)
        })
        .await?
    }

    // -----------------------------------------------------------------------
    // Store passthroughs
    // -----------------------------------------------------------------------

    pub async fn list(&self, query: ImageQuery) -> Result<ImagePage> {
        self.with_db(move |db| db.query_images(&query)).await
    }

    pub async fn get(&self, id: Uuid) -> Result<ImageRecord> {
        self.with_db(move |db| require(db, id)).await
    }

    /// Apply `changes` and return the stored result.
    pub async fn update(&self, id: Uuid, changes: ImageChanges) -> Result<ImageRecord> {
        self.with_db(move |db| {
            db.update_image(id, &changes)?;
            require(db, id)
        })
        .await
    }

    pub async fn toggle_favorite(&self, id: Uuid) -> Result<bool> {
        self.with_db(move |db| db.toggle_favorite(id)).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        self.with_db(move |db| db.delete_image(id)).await
    }

    pub async fn clear(&self) -> Result<usize> {
        self.with_db(|db| db.clear_images()).await
    }

    pub async fn stats(&self) -> Result<GalleryStats> {
        self.with_db(|db| db.gallery_stats()).await
    }

    pub async fn export_json(&self) -> Result<String> {
        self.with_db(|db| db.export_json()).await
    }

    pub async fn import_json(&self, json: String) -> Result<ImportStats> {
        self.with_db(move |db| db.import_json(&json)).await
    }

    // -----------------------------------------------------------------------
    // Generation flow
    // -----------------------------------------------------------------------

    /// Generate, persist, then suggest.
    ///
    /// Nothing is written unless the generator succeeds.  Suggestions are
    /// best effort: when they fail the image is kept without collections.
    pub async fn generate(&self, input: GenerateInput) -> Result<ImageRecord> {
        let prompt = validate_prompt(&input.prompt)?;
        let params = input.params.normalized();
        let request = GenerationRequest::new(prompt, params);

        let generated = self.generator.generate(&request).await?;
        if generated.image.is_empty() {
            return Err(ServerError::Provider("generator returned no image data".to_string()));
        }

        let mut record = ImageRecord::new(
            Uuid::new_v4(),
            generated.image,
            request.prompt.clone(),
            generated.model_used,
        )
        .with_tags(input.tags);
        record.params = request.params.clone();
        match raster::probe_dimensions(&record.image) {
            Ok((width, height)) => {
                record.width = Some(width);
                record.height = Some(height);
            }
            Err(e) => warn!(error = %e, "could not read generated image dimensions"),
        }

        info!(
            id = %record.id,
            model = %record.model_used,
            size = record.image.len(),
            "image generated"
        );
        let id = self.with_db(move |db| db.add_image(&record)).await?;

        if let Err(err) = self.apply_suggestions(id, &request.prompt).await {
            warn!(%id, error = %err, "suggestions failed, keeping image without them");
        }

        self.get(id).await
    }

    /// Generate a new record from an existing one's prompt, tags and params.
    pub async fn regenerate(&self, id: Uuid) -> Result<ImageRecord> {
        let source = self.get(id).await?;
        debug!(%id, "regenerating");
        self.generate(GenerateInput {
            prompt: source.prompt,
            tags: source.tags,
            params: source.params,
        })
        .await
    }

    /// Ask the suggester again and overwrite collections and the suggested
    /// prompt.  Errors propagate, unlike during [`Gallery::generate`].
    pub async fn refresh_suggestions(&self, id: Uuid) -> Result<ImageRecord> {
        let record = self.get(id).await?;
        self.apply_suggestions(id, &record.prompt).await
    }

    async fn apply_suggestions(&self, id: Uuid, prompt: &str) -> Result<ImageRecord> {
        let suggestions = self.suggester.suggest(prompt).await?;
        debug!(%id, collections = suggestions.collections.len(), "suggestions received");

        let changes = ImageChanges {
            collections: Some(suggestions.collections),
            suggested_prompt: Some(suggestions.suggested_prompt),
            ..ImageChanges::default()
        };
        self.update(id, changes).await
    }

    // -----------------------------------------------------------------------
    // Resizing
    // -----------------------------------------------------------------------

    /// Resample the stored image to exactly `width` x `height`.
    pub async fn resize(&self, id: Uuid, width: u32, height: u32) -> Result<ImageRecord> {
        let record = self.get(id).await?;
        let image = record.image;

        let resized =
            tokio::task::spawn_blocking(move || raster::resize(&image, width, height)).await??;

        info!(%id, width, height, "image resized");
        self.update(id, ImageChanges::resized(resized, width, height))
            .await
    }

    /// Resize with one side given; the other keeps the current aspect ratio.
    pub async fn resize_proportional(
        &self,
        id: Uuid,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<ImageRecord> {
        let (width, height) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => {
                let (orig_w, orig_h) = self.dimensions(id).await?;
                (w, raster::scale_to_width(orig_w, orig_h, w).ok_or_else(unknown_size)?)
            }
            (None, Some(h)) => {
                let (orig_w, orig_h) = self.dimensions(id).await?;
                (raster::scale_to_height(orig_w, orig_h, h).ok_or_else(unknown_size)?, h)
            }
            (None, None) => {
                return Err(ServerError::BadRequest(
                    "width or height is required".to_string(),
                ))
            }
        };
        self.resize(id, width, height).await
    }

    async fn dimensions(&self, id: Uuid) -> Result<(u32, u32)> {
        let record = self.get(id).await?;
        match (record.width, record.height) {
            (Some(w), Some(h)) => Ok((w, h)),
            _ => Ok(raster::probe_dimensions(&record.image)?),
        }
    }
}

fn require(db: &Database, id: Uuid) -> imagina_store::Result<ImageRecord> {
    db.get_image(id)?.ok_or(StoreError::NotFound(id))
}

fn unknown_size() -> ServerError {
    ServerError::BadRequest("current image size is unknown".to_string())
}

/// Trimmed prompt, 1 to `MAX_PROMPT_CHARS` characters.
fn validate_prompt(prompt: &str) -> Result<String> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ServerError::BadRequest("prompt is required".to_string()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ServerError::BadRequest(format!(
            "prompt must be at most {MAX_PROMPT_CHARS} characters"
        )));
    }
    Ok(prompt.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use imagina_ai::{AiError, GeneratedImage, Suggestions};
    use imagina_shared::ImageData;

    pub(crate) fn png(width: u32, height: u32) -> ImageData {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 120, 200, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        ImageData::new("image/png", out.into_inner())
    }

    #[derive(Default)]
    pub(crate) struct FakeGenerator {
        pub(crate) blocked: bool,
        pub(crate) failing: bool,
        pub(crate) calls: AtomicUsize,
        pub(crate) last: Mutex<Option<GenerationRequest>>,
    }

    #[async_trait]
    impl ImageGenerator for FakeGenerator {
        async fn generate(&self, request: &GenerationRequest) -> imagina_ai::Result<GeneratedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request.clone());
            if self.blocked {
                return Err(AiError::Blocked("SAFETY".into()));
            }
            if self.failing {
                return Err(AiError::Provider("upstream said: quota exceeded for key abc".into()));
            }
            Ok(GeneratedImage {
                image: png(16, 8),
                model_used: "fake/image-model".into(),
            })
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeSuggester {
        pub(crate) failing: bool,
    }

    #[async_trait]
    impl TagSuggester for FakeSuggester {
        async fn suggest(&self, prompt: &str) -> imagina_ai::Result<Suggestions> {
            if self.failing {
                return Err(AiError::Provider("suggestion output did not contain a tag list".into()));
            }
            Ok(Suggestions {
                collections: vec!["Animals".into(), "Nature".into()],
                suggested_prompt: Some(format!("{prompt}, at dawn")),
            })
        }
    }

    fn gallery(
        generator: FakeGenerator,
        suggester: FakeSuggester,
    ) -> Gallery<FakeGenerator, FakeSuggester> {
        Gallery::new(Database::open_in_memory().unwrap(), generator, suggester)
    }

    fn input(prompt: &str) -> GenerateInput {
        GenerateInput {
            prompt: prompt.into(),
            tags: vec![" animal ".into(), "animal".into(), "red".into()],
            params: GenerationParams {
                artistic_style: "Watercolor".into(),
                aspect_ratio: "".into(),
                image_quality: "high".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_generate_persists_with_suggestions() {
        let g = gallery(FakeGenerator::default(), FakeSuggester::default());
        let record = g.generate(input("  a red fox ")).await.unwrap();

        assert_eq!(record.prompt, "a red fox");
        assert_eq!(record.tags, vec!["animal", "red"]);
        assert_eq!(record.collections, vec!["Animals", "Nature"]);
        assert_eq!(record.suggested_prompt.as_deref(), Some("a red fox, at dawn"));
        assert_eq!(record.model_used, "fake/image-model");
        assert_eq!((record.width, record.height), (Some(16), Some(8)));
        assert_eq!(record.params.artistic_style, "Watercolor");
        assert_eq!(record.params.aspect_ratio, "1:1");

        let sent = g.generator.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.prompt, "a red fox");
        assert_eq!(sent.params.aspect_ratio, "1:1");

        assert_eq!(g.get(record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_invalid_prompt_never_reaches_provider() {
        let g = gallery(FakeGenerator::default(), FakeSuggester::default());

        let too_long = "x".repeat(MAX_PROMPT_CHARS + 1);
        for prompt in ["", "   ", too_long.as_str()] {
            let err = g.generate(input(prompt)).await.unwrap_err();
            assert!(matches!(err, ServerError::BadRequest(_)), "{prompt:?}");
        }
        assert_eq!(g.generator.calls.load(Ordering::SeqCst), 0);

        // exactly at the limit is fine, counted in characters
        let long = "é".repeat(MAX_PROMPT_CHARS);
        assert!(g.generate(input(&long)).await.is_ok());
    }

    #[tokio::test]
    async fn test_blocked_generation_persists_nothing() {
        let generator = FakeGenerator {
            blocked: true,
            ..Default::default()
        };
        let g = gallery(generator, FakeSuggester::default());

        let err = g.generate(input("something forbidden")).await.unwrap_err();
        assert!(matches!(err, ServerError::Blocked(_)));
        assert_eq!(g.list(ImageQuery::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_failing_suggester_keeps_image() {
        let suggester = FakeSuggester { failing: true };
        let g = gallery(FakeGenerator::default(), suggester);

        let record = g.generate(input("a blue fox")).await.unwrap();
        assert!(record.collections.is_empty());
        assert_eq!(record.suggested_prompt, None);
        assert_eq!(g.list(ImageQuery::default()).await.unwrap().total, 1);

        // an explicit refresh does surface the failure
        let err = g.refresh_suggestions(record.id).await.unwrap_err();
        assert!(matches!(err, ServerError::Provider(_)));
    }

    #[tokio::test]
    async fn test_regenerate_reuses_source_settings() {
        let g = gallery(FakeGenerator::default(), FakeSuggester::default());
        let first = g.generate(input("a red car")).await.unwrap();

        let second = g.regenerate(first.id).await.unwrap();
        assert_ne!(second.id, first.id);
        assert_eq!(second.prompt, first.prompt);
        assert_eq!(second.tags, first.tags);
        assert_eq!(second.params, first.params);
        assert_eq!(g.generator.calls.load(Ordering::SeqCst), 2);

        let missing = g.regenerate(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(missing, ServerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resize() {
        let g = gallery(FakeGenerator::default(), FakeSuggester::default());
        let record = g.generate(input("a red fox")).await.unwrap();

        let resized = g.resize(record.id, 8, 4).await.unwrap();
        assert_eq!((resized.width, resized.height), (Some(8), Some(4)));
        assert_eq!(raster::probe_dimensions(&resized.image).unwrap(), (8, 4));
        assert!(resized.updated_at > record.updated_at);

        // 8x4 scaled to width 4 keeps 2:1
        let scaled = g.resize_proportional(record.id, Some(4), None).await.unwrap();
        assert_eq!((scaled.width, scaled.height), (Some(4), Some(2)));

        let err = g.resize(record.id, 0, 10).await.unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
        let err = g.resize_proportional(record.id, None, None).await.unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let g = gallery(FakeGenerator::default(), FakeSuggester::default());
        let err = g
            .update(Uuid::new_v4(), ImageChanges::favorite(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }
}
