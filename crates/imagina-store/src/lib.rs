//! # imagina-store
//!
//! Local storage for generated images, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for the image history:
//! CRUD, favorite toggling, filtered pagination, statistics and JSON
//! export/import.  Every logical operation runs in a single transaction.

pub mod backup;
pub mod database;
pub mod images;
pub mod migrations;
pub mod models;
pub mod query;
pub mod stats;
pub mod view;

mod error;

pub use backup::{ExportedImage, ImportCandidate, ImportRejection, ImportStats, RejectReason};
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use query::ImageQuery;
pub use stats::{GalleryStats, LabelCount};
pub use view::{PageView, PendingEdit};
