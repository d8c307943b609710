//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.  Generation needs `GOOGLE_API_KEY`.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use imagina_ai::gemini::{DEFAULT_API_BASE, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};
use imagina_ai::GeminiConfig;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `127.0.0.1:9002`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `None`, i.e. the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Env: `GOOGLE_API_KEY`
    pub google_api_key: Option<String>,

    /// Env: `GEMINI_API_BASE`
    pub gemini_api_base: String,

    /// Env: `IMAGE_MODEL`
    pub image_model: String,

    /// Env: `TEXT_MODEL`
    pub text_model: String,

    /// Largest accepted request body, mostly relevant for `/import`.
    /// Env: `MAX_BODY_BYTES`
    /// Default: 64 MiB
    pub max_body_bytes: usize,

    /// Env: `PROVIDER_TIMEOUT_SECS`
    /// Default: 120
    pub provider_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([127, 0, 0, 1], 9002).into(),
            database_path: None,
            google_api_key: None,
            gemini_api_base: DEFAULT_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            max_body_bytes: 64 * 1024 * 1024, // 64 MiB
            provider_timeout: Duration::from_secs(120),
        }
    }
}

// The API key must never end up in logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field(
                "google_api_key",
                &self.google_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("gemini_api_base", &self.gemini_api_base)
            .field("image_model", &self.image_model)
            .field("text_model", &self.text_model)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("provider_timeout", &self.provider_timeout)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = var("DATABASE_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(key) = var("GOOGLE_API_KEY") {
            if !key.trim().is_empty() {
                config.google_api_key = Some(key.trim().to_string());
            }
        }

        if let Some(base) = var("GEMINI_API_BASE").filter(|b| !b.trim().is_empty()) {
            config.gemini_api_base = base;
        }

        if let Some(model) = var("IMAGE_MODEL").filter(|m| !m.trim().is_empty()) {
            config.image_model = model;
        }

        if let Some(model) = var("TEXT_MODEL").filter(|m| !m.trim().is_empty()) {
            config.text_model = model;
        }

        if let Some(val) = var("MAX_BODY_BYTES") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_body_bytes = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_BODY_BYTES, using default"),
            }
        }

        if let Some(val) = var("PROVIDER_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(n) if n > 0 => config.provider_timeout = Duration::from_secs(n),
                _ => tracing::warn!(value = %val, "Invalid PROVIDER_TIMEOUT_SECS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Settings for the Gemini client.
    pub fn gemini(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.google_api_key.clone(),
            api_base: self.gemini_api_base.clone(),
            image_model: self.image_model.clone(),
            text_model: self.text_model.clone(),
            timeout: self.provider_timeout,
        }
    }
}
