use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error, e.g. disk full or a locked database.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller-supplied input failed a required-field or shape check.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// An insert collided with an existing primary key.
    #[error("An image with id {0} already exists")]
    DuplicateId(Uuid),

    /// The operation requires a record that does not exist.
    #[error("Image {0} not found")]
    NotFound(Uuid),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored value could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// JSON (de)serialization failure at the export/import boundary.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
