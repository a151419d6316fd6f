//! In-memory implementations of the backend collaborator traits.
//!
//! Queries follow hosted document-store semantics: documents missing an
//! ordered field are excluded, range filters only match values of the same
//! type, and results are tie-broken by document id.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use serde_json::{Number, Value};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{
    Direction, Document, DocumentStore, FieldUpdate, FieldValue, Fields, Filter, ObjectStore,
    OrderBy, Query, RepoError, WriteFields,
};
use crate::domain::timestamp::to_millis;

type Collection = BTreeMap<String, Fields>;

#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    last_timestamp: AtomicI64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `(collection, document)` pairs.
    pub fn with_documents<I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (String, Document)>,
    {
        let mut collections: HashMap<String, Collection> = HashMap::new();
        for (collection, document) in documents {
            collections
                .entry(collection)
                .or_default()
                .insert(document.id, document.fields);
        }
        Self {
            collections: RwLock::new(collections),
            last_timestamp: AtomicI64::new(0),
        }
    }

    pub async fn insert(&self, collection: &str, document: Document) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(document.id, document.fields);
    }

    /// Every document of a collection, ordered by id.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Strictly increasing wall-clock milliseconds.
    fn server_timestamp(&self) -> i64 {
        let now = to_millis(OffsetDateTime::now_utc());
        let mut previous = self.last_timestamp.load(AtomicOrdering::Relaxed);
        loop {
            let next = now.max(previous + 1);
            match self.last_timestamp.compare_exchange_weak(
                previous,
                next,
                AtomicOrdering::SeqCst,
                AtomicOrdering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }

    fn resolve(&self, fields: WriteFields) -> Fields {
        let mut now = None;
        fields
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    FieldValue::Value(value) => value,
                    FieldValue::ServerTimestamp => {
                        Value::from(*now.get_or_insert_with(|| self.server_timestamp()))
                    }
                };
                (key, value)
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RepoError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn add(&self, collection: &str, fields: WriteFields) -> Result<Document, RepoError> {
        let id = Uuid::new_v4().simple().to_string();
        self.set(collection, &id, fields).await
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
    ) -> Result<Document, RepoError> {
        let fields = self.resolve(fields);
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields.clone());
        debug!(target = "bidhall::memory", collection, id, "document written");
        Ok(Document::new(id, fields))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), RepoError> {
        let mut collections = self.collections.write().await;
        let fields = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| RepoError::not_found(collection, id))?;

        // Applied to a copy so a failing update leaves the document intact.
        let mut next = fields.clone();
        for update in updates {
            apply_update(&mut next, update, || self.server_timestamp())
                .map_err(|message| RepoError::invalid_document(collection, id, message))?;
        }
        *fields = next;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RepoError> {
        if let Some(documents) = self.collections.write().await.get_mut(collection) {
            documents.remove(id);
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, RepoError> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<(Vec<Value>, Document)> = documents
            .iter()
            .filter(|(_, fields)| query.filters.iter().all(|filter| matches(fields, filter)))
            .filter_map(|(id, fields)| {
                let key = query
                    .order_by
                    .iter()
                    .map(|order| fields.get(&order.field).cloned())
                    .collect::<Option<Vec<_>>>()?;
                Some((key, Document::new(id.clone(), fields.clone())))
            })
            .collect();

        rows.sort_by(|(left, left_doc), (right, right_doc)| {
            compare_keys(left, &left_doc.id, right, &right_doc.id, &query.order_by)
        });

        if let Some(cursor) = &query.start_after {
            rows.retain(|(key, document)| {
                compare_keys(key, &document.id, &cursor.values, &cursor.id, &query.order_by)
                    == Ordering::Greater
            });
        }

        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|(_, document)| document)
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<u64, RepoError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map_or(0, |documents| documents.len() as u64))
    }
}

fn apply_update(
    fields: &mut Fields,
    update: FieldUpdate,
    now: impl Fn() -> i64,
) -> Result<(), String> {
    match update {
        FieldUpdate::Set { field, value } => {
            let value = match value {
                FieldValue::Value(value) => value,
                FieldValue::ServerTimestamp => Value::from(now()),
            };
            fields.insert(field, value);
        }
        FieldUpdate::ArrayUnion { field, values } => {
            let entry = fields.entry(field).or_insert_with(|| Value::Array(Vec::new()));
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            if let Value::Array(items) = entry {
                for value in values {
                    if !items.contains(&value) {
                        items.push(value);
                    }
                }
            }
        }
        FieldUpdate::ArrayRemove { field, values } => {
            if let Some(Value::Array(items)) = fields.get_mut(&field) {
                items.retain(|item| !values.contains(item));
            }
        }
        FieldUpdate::Increment { field, by } => {
            let next = match fields.get(&field) {
                Some(Value::Number(current)) => increment(current, by)
                    .ok_or_else(|| format!("`{field}` cannot be incremented by {by}"))?,
                _ => Number::from(by),
            };
            fields.insert(field, Value::Number(next));
        }
    }
    Ok(())
}

fn increment(current: &Number, by: i64) -> Option<Number> {
    if let Some(value) = current.as_u64() {
        return if by >= 0 {
            value.checked_add(by as u64).map(Number::from)
        } else {
            i64::try_from(value)
                .ok()
                .and_then(|value| value.checked_add(by))
                .map(Number::from)
        };
    }
    if let Some(value) = current.as_i64() {
        return value.checked_add(by).map(Number::from);
    }
    current
        .as_f64()
        .and_then(|value| Number::from_f64(value + by as f64))
}

fn matches(fields: &Fields, filter: &Filter) -> bool {
    match filter {
        Filter::Eq { field, value } => fields
            .get(field)
            .is_some_and(|current| same_kind(current, value) && compare_values(current, value).is_eq()),
        Filter::Gte { field, value } => fields
            .get(field)
            .is_some_and(|current| same_kind(current, value) && compare_values(current, value).is_ge()),
        Filter::Lt { field, value } => fields
            .get(field)
            .is_some_and(|current| same_kind(current, value) && compare_values(current, value).is_lt()),
        Filter::ArrayContains { field, value } => fields
            .get(field)
            .and_then(Value::as_array)
            .is_some_and(|items| items.contains(value)),
    }
}

fn compare_keys(
    left: &[Value],
    left_id: &str,
    right: &[Value],
    right_id: &str,
    order_by: &[OrderBy],
) -> Ordering {
    for ((left, right), order) in left.iter().zip(right).zip(order_by) {
        let ordering = directed(compare_values(left, right), order.direction);
        if ordering.is_ne() {
            return ordering;
        }
    }
    let tiebreak = order_by
        .last()
        .map_or(Direction::Ascending, |order| order.direction);
    directed(left_id.cmp(right_id), tiebreak)
}

fn directed(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Ascending => ordering,
        Direction::Descending => ordering.reverse(),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn same_kind(left: &Value, right: &Value) -> bool {
    kind_rank(left) == kind_rank(right)
}

/// Total order over JSON values: by kind first, then by value.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
        (Value::Number(left), Value::Number(right)) => compare_numbers(left, right),
        (Value::String(left), Value::String(right)) => left.cmp(right),
        (Value::Array(left), Value::Array(right)) => left
            .iter()
            .zip(right)
            .map(|(left, right)| compare_values(left, right))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| left.len().cmp(&right.len())),
        _ => kind_rank(left).cmp(&kind_rank(right)),
    }
}

fn compare_numbers(left: &Number, right: &Number) -> Ordering {
    match (left.as_i64(), right.as_i64()) {
        (Some(left), Some(right)) => left.cmp(&right),
        _ => left
            .as_f64()
            .unwrap_or(f64::NAN)
            .total_cmp(&right.as_f64().unwrap_or(f64::NAN)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Blob store keeping objects in memory and handing out synthetic urls.
pub struct InMemoryObjectStore {
    base_url: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://objects")
    }
}

impl InMemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub async fn object(&self, blob_id: &str) -> Option<StoredObject> {
        self.objects.read().await.get(blob_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        blob_id: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RepoError> {
        self.objects.write().await.insert(
            blob_id.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), blob_id))
    }

    async fn delete(&self, blob_id: &str) -> Result<(), RepoError> {
        if self.objects.write().await.remove(blob_id).is_none() {
            debug!(target = "bidhall::memory", blob_id, "deleting absent object");
        }
        Ok(())
    }
}
