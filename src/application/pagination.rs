//! Cursor pagination over the two listing dimensions.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::application::repos::{Direction, Document, Query, StartAfter};
use crate::domain::types::SortDimension;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ListingCursorPayload {
    dimension: SortDimension,
    sort_value: Value,
    id: String,
}

/// Position just after the last document of a loaded listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingCursor {
    dimension: SortDimension,
    sort_value: Value,
    id: String,
}

impl ListingCursor {
    pub fn new(dimension: SortDimension, sort_value: Value, id: impl Into<String>) -> Self {
        Self {
            dimension,
            sort_value,
            id: id.into(),
        }
    }

    pub fn from_document(dimension: SortDimension, document: &Document) -> Self {
        Self::new(
            dimension,
            document
                .get(dimension.field())
                .cloned()
                .unwrap_or(Value::Null),
            document.id.clone(),
        )
    }

    pub fn dimension(&self) -> SortDimension {
        self.dimension
    }

    pub fn sort_value(&self) -> &Value {
        &self.sort_value
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_after(&self) -> StartAfter {
        StartAfter {
            values: vec![self.sort_value.clone()],
            id: self.id.clone(),
        }
    }

    pub fn encode(&self) -> Result<String, PaginationError> {
        let payload = ListingCursorPayload {
            dimension: self.dimension,
            sort_value: self.sort_value.clone(),
            id: self.id.clone(),
        };
        let serialized = serde_json::to_vec(&payload)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(serialized))
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: ListingCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            dimension: payload.dimension,
            sort_value: payload.sort_value,
            id: payload.id,
        })
    }
}

/// Cursor-aware pagination request.
#[derive(Debug, Clone)]
pub struct PageRequest<C> {
    pub limit: u32,
    pub cursor: Option<C>,
}

impl<C> PageRequest<C> {
    pub fn new(limit: u32, cursor: Option<C>) -> Self {
        Self { limit, cursor }
    }
}

/// Cursor-aware page result.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub page: u32,
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    pub fn new(page: u32, items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self {
            page,
            items,
            next_cursor,
        }
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("no `{}` page has been loaded yet", dimension.as_str())]
    NoCursor { dimension: SortDimension },
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

/// Remote query for one listing page: sort field descending, id descending.
pub fn listing_query(
    collection: &str,
    dimension: SortDimension,
    request: &PageRequest<ListingCursor>,
) -> Query {
    let query = Query::collection(collection)
        .order_by(dimension.field(), Direction::Descending)
        .limit(request.limit);
    match &request.cursor {
        Some(cursor) => query.start_after(cursor.start_after()),
        None => query,
    }
}

/// Loaded ids and page position for one sort dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionTracker {
    ids: Vec<String>,
    page: u32,
    cursor: Option<ListingCursor>,
}

impl DimensionTracker {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn cursor(&self) -> Option<&ListingCursor> {
        self.cursor.as_ref()
    }

    pub fn last_id(&self) -> Option<&str> {
        self.ids.last().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|tracked| tracked == id)
    }

    /// Replace everything with a freshly loaded first page.
    pub fn reset(&mut self, ids: Vec<String>, cursor: Option<ListingCursor>) {
        let mut seen = HashSet::new();
        self.ids = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        self.page = 1;
        self.cursor = cursor;
    }

    /// Append a following page, skipping ids that are already tracked.
    ///
    /// Returns how many ids were new. The page advances even when none were.
    pub fn append(&mut self, ids: Vec<String>, cursor: Option<ListingCursor>) -> usize {
        let mut seen: HashSet<String> = self.ids.iter().cloned().collect();
        let before = self.ids.len();
        self.ids
            .extend(ids.into_iter().filter(|id| seen.insert(id.clone())));
        self.page += 1;
        if cursor.is_some() {
            self.cursor = cursor;
        }
        self.ids.len() - before
    }

    /// Step back one page, never below the first.
    pub fn retreat(&mut self) -> u32 {
        self.page = self.page.saturating_sub(1).max(1);
        self.page
    }

    pub fn prepend(&mut self, id: &str) {
        if !self.contains(id) {
            self.ids.insert(0, id.to_string());
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|tracked| tracked != id);
        before != self.ids.len()
    }

    /// Ids in the window of the current page.
    pub fn page_ids(&self, page_size: NonZeroU32) -> &[String] {
        if self.page == 0 {
            return &[];
        }
        let size = page_size.get() as usize;
        let start = ((self.page - 1) as usize).saturating_mul(size);
        if start >= self.ids.len() {
            return &[];
        }
        let end = start.saturating_add(size).min(self.ids.len());
        &self.ids[start..end]
    }
}

/// Tracks both listing dimensions with a shared page size.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationTracker {
    page_size: NonZeroU32,
    dimensions: HashMap<SortDimension, DimensionTracker>,
}

impl PaginationTracker {
    pub fn new(page_size: NonZeroU32) -> Self {
        Self {
            page_size,
            dimensions: SortDimension::ALL
                .into_iter()
                .map(|dimension| (dimension, DimensionTracker::default()))
                .collect(),
        }
    }

    pub fn page_size(&self) -> NonZeroU32 {
        self.page_size
    }

    pub fn dimension(&self, dimension: SortDimension) -> &DimensionTracker {
        self.dimensions
            .get(&dimension)
            .unwrap_or(&EMPTY_DIMENSION)
    }

    pub fn dimension_mut(&mut self, dimension: SortDimension) -> &mut DimensionTracker {
        self.dimensions.entry(dimension).or_default()
    }

    pub fn current_page_ids(&self, dimension: SortDimension) -> &[String] {
        self.dimension(dimension).page_ids(self.page_size)
    }

    /// Drop an id from every dimension.
    pub fn remove_everywhere(&mut self, id: &str) {
        for tracker in self.dimensions.values_mut() {
            tracker.remove(id);
        }
    }

    pub fn request(
        &self,
        dimension: SortDimension,
        cursor: Option<ListingCursor>,
    ) -> PageRequest<ListingCursor> {
        debug_assert!(cursor.as_ref().is_none_or(|c| c.dimension() == dimension));
        PageRequest::new(self.page_size.get(), cursor)
    }
}

static EMPTY_DIMENSION: DimensionTracker = DimensionTracker {
    ids: Vec::new(),
    page: 0,
    cursor: None,
};
