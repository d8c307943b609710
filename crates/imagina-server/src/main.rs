//! # imagina-server
//!
//! HTTP backend for the Imagina image gallery.
//!
//! This binary provides:
//! - **Generation** through the Gemini API, with best-effort tag and prompt
//!   suggestions
//! - **History** stored in a local SQLite database: filtering, pagination,
//!   favorites, metadata edits and resizing
//! - **Backup** as a JSON export/import of the whole history
//! - **Statistics** over tags, collections and styles

mod api;
mod config;
mod error;
mod gallery;

use std::sync::Arc;

use imagina_ai::{GeminiClient, ImageGenerator, TagSuggester};
use imagina_shared::constants::APP_NAME;
use imagina_store::Database;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::gallery::Gallery;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,imagina_server=debug,imagina_store=info")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.google_api_key.is_none() {
        warn!("GOOGLE_API_KEY is not set; generation and suggestions will fail");
    }

    // -----------------------------------------------------------------------
    // 3. Open the database (runs migrations)
    // -----------------------------------------------------------------------
    let db_path = config.database_path.clone();
    let db = tokio::task::spawn_blocking(move || -> imagina_store::Result<Database> {
        match db_path {
            Some(path) => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir)?;
                }
                Database::open_at(&path)
            }
            None => Database::new(),
        }
    })
    .await??;
    if let Some(path) = db.path() {
        info!(path = %path.display(), "Database ready");
    }

    // -----------------------------------------------------------------------
    // 4. Providers and gallery
    // -----------------------------------------------------------------------
    let gemini = Arc::new(GeminiClient::new(config.gemini())?);
    let generator: Arc<dyn ImageGenerator> = gemini.clone();
    let suggester: Arc<dyn TagSuggester> = gemini;

    let state = AppState {
        gallery: Arc::new(Gallery::new(db, generator, suggester)),
    };

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, config.http_addr, config.max_body_bytes) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
