use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use imagina_ai::{ImageGenerator, TagSuggester};
use imagina_shared::constants::DEFAULT_PAGE_SIZE;
use imagina_store::{GalleryStats, ImageChanges, ImagePage, ImageQuery, ImageRecord, ImportStats};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::error::ServerError;
use crate::gallery::{GenerateInput, Gallery};

pub type SharedGallery = Gallery<Arc<dyn ImageGenerator>, Arc<dyn TagSuggester>>;

#[derive(Clone)]
pub struct AppState {
    pub gallery: Arc<SharedGallery>,
}

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/images", get(list_images).delete(clear_images))
        .route("/images/generate", post(generate_image))
        .route(
            "/images/:id",
            get(get_image).patch(update_image).delete(delete_image),
        )
        .route("/images/:id/data", get(image_data))
        .route("/images/:id/favorite", post(toggle_favorite))
        .route("/images/:id/resize", post(resize_image))
        .route("/images/:id/regenerate", post(regenerate_image))
        .route("/images/:id/suggestions", post(refresh_suggestions))
        .route("/export", get(export_images))
        .route("/import", post(import_images))
        .route("/stats", get(stats))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Wire types ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// A record as the client sees it.  Image bytes are served separately from
/// `imageUrl`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageView {
    id: Uuid,
    prompt: String,
    tags: Vec<String>,
    collections: Vec<String>,
    suggested_prompt: Option<String>,
    model_used: String,
    is_favorite: bool,
    artistic_style: String,
    aspect_ratio: String,
    image_quality: String,
    width: Option<u32>,
    height: Option<u32>,
    mime_type: String,
    byte_size: usize,
    image_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ImageRecord> for ImageView {
    fn from(record: ImageRecord) -> Self {
        Self {
            image_url: format!("/images/{}/data", record.id),
            id: record.id,
            prompt: record.prompt,
            tags: record.tags,
            collections: record.collections,
            suggested_prompt: record.suggested_prompt,
            model_used: record.model_used,
            is_favorite: record.is_favorite,
            artistic_style: record.params.artistic_style,
            aspect_ratio: record.params.aspect_ratio,
            image_quality: record.params.image_quality,
            width: record.width,
            height: record.height,
            byte_size: record.image.len(),
            mime_type: record.image.mime_type,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageResponse {
    items: Vec<ImageView>,
    total: u64,
    page: u32,
    page_size: u32,
    total_pages: u32,
}

impl From<ImagePage> for PageResponse {
    fn from(page: ImagePage) -> Self {
        Self {
            total_pages: page.total_pages(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            items: page.items.into_iter().map(ImageView::from).collect(),
        }
    }
}

/// `GET /images` query string.  `tags` is comma separated.
#[derive(Debug, Default, Deserialize)]
struct ListParams {
    favorites: Option<bool>,
    search: Option<String>,
    tags: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

impl ListParams {
    fn into_query(self) -> ImageQuery {
        let required_tags = self
            .tags
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        ImageQuery {
            // the gallery only offers "all" and "favorites only"
            is_favorite: self.favorites.filter(|f| *f),
            search_term: self.search.filter(|s| !s.trim().is_empty()),
            required_tags,
            page: self.page.unwrap_or(1),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }
}

/// Editable metadata.  An empty `suggestedPrompt` clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagePatch {
    tags: Option<Vec<String>>,
    collections: Option<Vec<String>>,
    suggested_prompt: Option<String>,
    is_favorite: Option<bool>,
}

impl From<ImagePatch> for ImageChanges {
    fn from(patch: ImagePatch) -> Self {
        ImageChanges {
            tags: patch.tags,
            collections: patch.collections,
            suggested_prompt: patch.suggested_prompt.map(|p| {
                let p = p.trim();
                (!p.is_empty()).then(|| p.to_string())
            }),
            is_favorite: patch.is_favorite,
            ..ImageChanges::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResizeRequest {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteResponse {
    is_favorite: bool,
}

// ─── Handlers ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_images(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<PageResponse>, ServerError> {
    let page = state.gallery.list(params.into_query()).await?;
    Ok(Json(page.into()))
}

async fn generate_image(
    State(state): State<AppState>,
    Json(input): Json<GenerateInput>,
) -> Result<(StatusCode, Json<ImageView>), ServerError> {
    let record = state.gallery.generate(input).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageView>, ServerError> {
    Ok(Json(state.gallery.get(id).await?.into()))
}

async fn update_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ImagePatch>,
) -> Result<Json<ImageView>, ServerError> {
    let record = state.gallery.update(id, patch.into()).await?;
    Ok(Json(record.into()))
}

async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let deleted = state.gallery.delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

async fn clear_images(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let deleted = state.gallery.clear().await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

async fn image_data(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServerError> {
    let image = state.gallery.get(id).await?.image;
    Ok(([(header::CONTENT_TYPE, image.mime_type)], image.bytes))
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FavoriteResponse>, ServerError> {
    let is_favorite = state.gallery.toggle_favorite(id).await?;
    Ok(Json(FavoriteResponse { is_favorite }))
}

async fn resize_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResizeRequest>,
) -> Result<Json<ImageView>, ServerError> {
    let record = state
        .gallery
        .resize_proportional(id, req.width, req.height)
        .await?;
    Ok(Json(record.into()))
}

async fn regenerate_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ImageView>), ServerError> {
    let record = state.gallery.regenerate(id).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

async fn refresh_suggestions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageView>, ServerError> {
    let record = state.gallery.refresh_suggestions(id).await?;
    Ok(Json(record.into()))
}

async fn export_images(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let json = state.gallery.export_json().await?;
    let filename = format!("imagina-export-{}.json", Utc::now().format("%Y-%m-%d"));
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        json,
    ))
}

async fn import_images(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportStats>, ServerError> {
    let stats = state.gallery.import_json(body).await?;
    info!(
        imported = stats.imported,
        skipped = stats.skipped,
        "history imported via API"
    );
    Ok(Json(stats))
}

async fn stats(State(state): State<AppState>) -> Result<Json<GalleryStats>, ServerError> {
    Ok(Json(state.gallery.stats().await?))
}

pub async fn serve(
    state: AppState,
    addr: std::net::SocketAddr,
    max_body_bytes: usize,
) -> anyhow::Result<()> {
    let app = build_router(state, max_body_bytes);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
