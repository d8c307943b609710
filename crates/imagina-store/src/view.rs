//! In-memory page of records with optimistic, two-phase edits.
//!
//! A client applies an edit to its local copy first ([`PageView::apply_local`])
//! and then either confirms it against the store or rolls it back.  When the
//! store rejects a confirmed edit the page is reloaded, so the store is
//! always the source of truth after a failure.

use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::{ImageChanges, ImagePage, ImageRecord};
use crate::query::ImageQuery;

/// An edit applied locally but not yet written to the store.
#[derive(Debug, Clone)]
#[must_use = "a pending edit must be confirmed or rolled back"]
pub struct PendingEdit {
    id: Uuid,
    changes: ImageChanges,
    snapshot: ImageRecord,
}

impl PendingEdit {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct PageView {
    query: ImageQuery,
    page: ImagePage,
}

impl PageView {
    pub fn load(db: &Database, query: ImageQuery) -> Result<Self> {
        let page = db.query_images(&query)?;
        Ok(Self { query, page })
    }

    /// Re-run the current query against the store.
    pub fn refresh(&mut self, db: &Database) -> Result<()> {
        self.page = db.query_images(&self.query)?;
        Ok(())
    }

    /// Switch to another query (filters or page) and load it.
    pub fn set_query(&mut self, db: &Database, query: ImageQuery) -> Result<()> {
        self.page = db.query_images(&query)?;
        self.query = query;
        Ok(())
    }

    pub fn query(&self) -> &ImageQuery {
        &self.query
    }

    pub fn page(&self) -> &ImagePage {
        &self.page
    }

    pub fn get(&self, id: Uuid) -> Option<&ImageRecord> {
        self.page.items.iter().find(|r| r.id == id)
    }

    /// Phase one: patch the local copy.  `None` if the record is not on
    /// this page.
    pub fn apply_local(&mut self, id: Uuid, changes: ImageChanges) -> Option<PendingEdit> {
        let record = self.page.items.iter_mut().find(|r| r.id == id)?;
        let snapshot = record.clone();
        changes.apply_to(record);
        Some(PendingEdit {
            id,
            changes,
            snapshot,
        })
    }

    /// Optimistic favorite flip.
    pub fn toggle_favorite_local(&mut self, id: Uuid) -> Option<PendingEdit> {
        let current = self.get(id)?.is_favorite;
        self.apply_local(id, ImageChanges::favorite(!current))
    }

    /// Phase two: write the edit.  On failure the page is reloaded from the
    /// store and the store's error is returned.
    pub fn confirm(&mut self, db: &Database, edit: PendingEdit) -> Result<usize> {
        match db.update_image(edit.id, &edit.changes) {
            Ok(affected) => {
                // pick up the store-stamped updated_at and normalised labels;
                // the write already landed, so a failed re-read keeps the local copy
                match db.get_image(edit.id) {
                    Ok(Some(fresh)) => self.replace(fresh),
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(id = %edit.id, error = %err, "re-read after edit failed");
                    }
                }
                Ok(affected)
            }
            Err(err) => {
                tracing::warn!(id = %edit.id, error = %err, "optimistic edit failed, reloading");
                if let Err(reload_err) = self.refresh(db) {
                    tracing::warn!(error = %reload_err, "reload after failed edit also failed");
                    self.replace(edit.snapshot);
                }
                Err(err)
            }
        }
    }

    /// Discard a local edit without touching the store.
    pub fn rollback(&mut self, edit: PendingEdit) {
        self.replace(edit.snapshot);
    }

    fn replace(&mut self, record: ImageRecord) {
        if let Some(slot) = self.page.items.iter_mut().find(|r| r.id == record.id) {
            *slot = record;
        }
    }
}
