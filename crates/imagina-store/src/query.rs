//! Filter & paginate over the image history.
//!
//! Ordering is always `created_at` descending.  Filters compose with AND:
//! favorite equality, then a case-insensitive substring search over the
//! prompt, tags and collections, then a required-tags intersection.  The
//! total and the page are read in one transaction so they always agree.

use imagina_shared::constants::DEFAULT_PAGE_SIZE;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::database::{Database, CONTAINS_CI};
use crate::error::{Result, StoreError};
use crate::images::{load_labels, normalize_labels, row_to_image, IMAGE_COLUMNS};
use crate::models::ImagePage;

/// Query options.  Absent fields impose no constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageQuery {
    /// Keep only records whose favorite flag equals this value.
    pub is_favorite: Option<bool>,
    /// Matched against prompt, tags and collections; ignored when blank.
    pub search_term: Option<String>,
    /// Every one of these must be among the record's tags.
    pub required_tags: Vec<String>,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for ImageQuery {
    fn default() -> Self {
        Self {
            is_favorite: None,
            search_term: None,
            required_tags: Vec::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ImageQuery {
    pub fn favorites_only() -> Self {
        Self {
            is_favorite: Some(true),
            ..Default::default()
        }
    }

    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search_term: Some(term.into()),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// WHERE clause (possibly empty) plus its positional parameters.
    fn filter_clause(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(fav) = self.is_favorite {
            clauses.push("i.is_favorite = ?".to_string());
            values.push(Value::Integer(fav as i64));
        }

        if let Some(term) = self.search_term.as_deref().map(str::trim) {
            if !term.is_empty() {
                clauses.push(format!(
                    "({f}(i.prompt, ?)
                      OR EXISTS (SELECT 1 FROM image_tags t
                                 WHERE t.image_id = i.id AND {f}(t.tag, ?))
                      OR EXISTS (SELECT 1 FROM image_collections c
                                 WHERE c.image_id = i.id AND {f}(c.label, ?)))",
                    f = CONTAINS_CI
                ));
                for _ in 0..3 {
                    values.push(Value::Text(term.to_string()));
                }
            }
        }

        let required = normalize_labels(&self.required_tags);
        if !required.is_empty() {
            let placeholders = vec!["?"; required.len()].join(", ");
            clauses.push(format!(
                "(SELECT COUNT(DISTINCT t.tag) FROM image_tags t
                  WHERE t.image_id = i.id AND t.tag IN ({placeholders})) = {}",
                required.len()
            ));
            values.extend(required.into_iter().map(Value::Text));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

impl Database {
    /// Run a filtered, paginated query.
    ///
    /// A page past the end yields an empty `items` list with the correct
    /// `total`; it is not an error.
    pub fn query_images(&self, query: &ImageQuery) -> Result<ImagePage> {
        if query.page == 0 {
            return Err(StoreError::validation("page numbers start at 1"));
        }
        if query.page_size == 0 {
            return Err(StoreError::validation("page size must be positive"));
        }

        let (where_sql, mut values) = query.filter_clause();

        let tx = self.conn().unchecked_transaction()?;

        let total: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM images i {where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let offset = (query.page as i64 - 1) * query.page_size as i64;
        values.push(Value::Integer(query.page_size as i64));
        values.push(Value::Integer(offset));

        let sql = format!(
            "SELECT {IMAGE_COLUMNS} FROM images i {where_sql}
             ORDER BY i.created_at DESC, i.rowid DESC
             LIMIT ? OFFSET ?"
        );
        let mut items = Vec::new();
        {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), row_to_image)?;
            for row in rows {
                let mut record = row?;
                load_labels(&tx, &mut record)?;
                items.push(record);
            }
        }
        tx.commit()?;

        tracing::debug!(
            total,
            returned = items.len(),
            page = query.page,
            "image query"
        );

        Ok(ImagePage {
            items,
            total: total as u64,
            page: query.page,
            page_size: query.page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::images::tests::sample;
    use crate::models::ImageRecord;

    /// Insert records with strictly increasing `created_at`, oldest first.
    fn seed(db: &Database, records: Vec<ImageRecord>) -> Vec<ImageRecord> {
        let base = Utc::now() - Duration::hours(1);
        records
            .into_iter()
            .enumerate()
            .map(|(i, mut rec)| {
                rec.created_at = base + Duration::seconds(i as i64);
                rec.updated_at = rec.created_at;
                db.add_image(&rec).unwrap();
                rec
            })
            .collect()
    }

    fn ids(page: &ImagePage) -> Vec<Uuid> {
        page.items.iter().map(|r| r.id).collect()
    }

    fn fox_fixture(db: &Database) -> Vec<ImageRecord> {
        seed(
            db,
            vec![
                sample("a red fox", &["animal"]),
                sample("a blue fox", &["animal"]),
                sample("a red car", &["vehicle"]),
            ],
        )
    }

    #[test]
    fn test_unfiltered_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let recs = seed(&db, vec![sample("first", &[]), sample("second", &[])]);

        let page = db.query_images(&ImageQuery::default()).unwrap();
        assert_eq!(ids(&page), vec![recs[1].id, recs[0].id]);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_search_term() {
        let db = Database::open_in_memory().unwrap();
        let recs = fox_fixture(&db);

        let page = db.query_images(&ImageQuery::search("RED")).unwrap();
        assert_eq!(ids(&page), vec![recs[2].id, recs[0].id]);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_search_matches_tags_and_collections() {
        let db = Database::open_in_memory().unwrap();
        let mut with_collection = sample("untitled", &[]);
        with_collection.collections = vec!["Futuristic City".into()];
        let recs = seed(
            &db,
            vec![with_collection, sample("plain", &["cityscape"]), sample("other", &[])],
        );

        let page = db.query_images(&ImageQuery::search("city")).unwrap();
        assert_eq!(ids(&page), vec![recs[1].id, recs[0].id]);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        fox_fixture(&db);
        let page = db.query_images(&ImageQuery::search("   ")).unwrap();
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_required_tags_intersection() {
        let db = Database::open_in_memory().unwrap();
        let recs = fox_fixture(&db);

        let page = db
            .query_images(&ImageQuery::default().with_tags(["animal"]))
            .unwrap();
        assert_eq!(ids(&page), vec![recs[1].id, recs[0].id]);

        let none = db
            .query_images(&ImageQuery::default().with_tags(["animal", "vehicle"]))
            .unwrap();
        assert_eq!(none.total, 0);
        assert!(none.items.is_empty());
    }

    #[test]
    fn test_favorites_only() {
        let db = Database::open_in_memory().unwrap();
        let recs = seed(&db, (0..5).map(|i| sample(&format!("p{i}"), &[])).collect());
        db.toggle_favorite(recs[1].id).unwrap();
        db.toggle_favorite(recs[3].id).unwrap();

        let page = db.query_images(&ImageQuery::favorites_only()).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(ids(&page), vec![recs[3].id, recs[1].id]);
    }

    #[test]
    fn test_filters_compose() {
        let db = Database::open_in_memory().unwrap();
        let recs = fox_fixture(&db);
        db.toggle_favorite(recs[0].id).unwrap();
        db.toggle_favorite(recs[2].id).unwrap();

        let query = ImageQuery {
            is_favorite: Some(true),
            search_term: Some("red".into()),
            required_tags: vec!["animal".into()],
            ..Default::default()
        };
        let page = db.query_images(&query).unwrap();
        assert_eq!(ids(&page), vec![recs[0].id]);
    }

    #[test]
    fn test_pagination_covers_everything_once() {
        let db = Database::open_in_memory().unwrap();
        let recs = seed(&db, (0..29).map(|i| sample(&format!("p{i}"), &[])).collect());

        let k = 12;
        let mut seen = HashSet::new();
        let mut returned = 0;
        for page in 1..=3 {
            let result = db
                .query_images(&ImageQuery::default().with_page(page, k))
                .unwrap();
            assert_eq!(result.total, 29);
            assert_eq!(result.total_pages(), 3);
            returned += result.items.len();
            seen.extend(ids(&result));
        }
        assert_eq!(returned, 29);
        assert_eq!(seen.len(), 29);
        assert!(recs.iter().all(|r| seen.contains(&r.id)));
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let db = Database::open_in_memory().unwrap();
        fox_fixture(&db);
        let page = db
            .query_images(&ImageQuery::default().with_page(5, 12))
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_zero_page_is_invalid() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.query_images(&ImageQuery::default().with_page(0, 12)),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.query_images(&ImageQuery::default().with_page(1, 0)),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_query_is_repeatable() {
        let db = Database::open_in_memory().unwrap();
        fox_fixture(&db);
        let query = ImageQuery::search("fox");
        assert_eq!(
            db.query_images(&query).unwrap(),
            db.query_images(&query).unwrap()
        );
    }
}
