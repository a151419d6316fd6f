//! Collaborator traits describing the hosted backend.
//!
//! The storefront never talks to a concrete database. Everything goes through
//! a schemaless [`DocumentStore`], an [`ObjectStore`] for image blobs and an
//! [`IdentityProvider`] for the signed-in user.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::entities::User;

/// Raw document body, keyed by field name.
pub type Fields = Map<String, Value>;

/// Field payload accepted by `add` and `set`.
pub type WriteFields = BTreeMap<String, FieldValue>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("document `{collection}/{id}` not found")]
    NotFound { collection: String, id: String },
    #[error("document `{collection}/{id}` is malformed: {message}")]
    InvalidDocument {
        collection: String,
        id: String,
        message: String,
    },
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_document(collection: &str, id: &str, err: impl std::fmt::Display) -> Self {
        Self::InvalidDocument {
            collection: collection.to_string(),
            id: id.to_string(),
            message: err.to_string(),
        }
    }
}

/// A stored document together with its backend-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Decode into an entity whose `id` field is filled from the document id.
    pub fn decode<T: DeserializeOwned>(&self, collection: &str) -> Result<T, RepoError> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(fields))
            .map_err(|err| RepoError::invalid_document(collection, &self.id, err))
    }
}

pub fn decode_all<T: DeserializeOwned>(
    documents: &[Document],
    collection: &str,
) -> Result<Vec<T>, RepoError> {
    documents
        .iter()
        .map(|document| document.decode(collection))
        .collect()
}

/// Serialize an entity into write fields, dropping its `id`.
pub fn encode_fields<T: Serialize>(value: &T) -> Result<WriteFields, RepoError> {
    match serde_json::to_value(value).map_err(RepoError::from_persistence)? {
        Value::Object(map) => Ok(map
            .into_iter()
            .filter(|(key, _)| key != "id")
            .map(|(key, value)| (key, FieldValue::Value(value)))
            .collect()),
        other => Err(RepoError::Persistence(format!(
            "expected an object payload, got `{other}`"
        ))),
    }
}

/// A field value in a write; the backend resolves sentinels on commit.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    ServerTimestamp,
}

impl<T: Into<Value>> From<T> for FieldValue {
    fn from(value: T) -> Self {
        FieldValue::Value(value.into())
    }
}

/// Partial update applied atomically by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Set { field: String, value: FieldValue },
    ArrayUnion { field: String, values: Vec<Value> },
    ArrayRemove { field: String, values: Vec<Value> },
    Increment { field: String, by: i64 },
}

impl FieldUpdate {
    pub fn set(field: &str, value: impl Into<FieldValue>) -> Self {
        Self::Set {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn array_union(field: &str, value: impl Into<Value>) -> Self {
        Self::ArrayUnion {
            field: field.to_string(),
            values: vec![value.into()],
        }
    }

    pub fn array_remove(field: &str, value: impl Into<Value>) -> Self {
        Self::ArrayRemove {
            field: field.to_string(),
            values: vec![value.into()],
        }
    }

    pub fn increment(field: &str, by: i64) -> Self {
        Self::Increment {
            field: field.to_string(),
            by,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    Gte { field: String, value: Value },
    Lt { field: String, value: Value },
    ArrayContains { field: String, value: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Exclusive query cursor: the ordered field values of a document plus its id.
#[derive(Debug, Clone, PartialEq)]
pub struct StartAfter {
    pub values: Vec<Value>,
    pub id: String,
}

impl StartAfter {
    pub fn from_document(document: &Document, order_by: &[OrderBy]) -> Self {
        Self {
            values: order_by
                .iter()
                .map(|order| document.get(&order.field).cloned().unwrap_or(Value::Null))
                .collect(),
            id: document.id.clone(),
        }
    }
}

/// Query against a single collection.
///
/// Results are ordered by `order_by`, then by document id in the direction of
/// the last ordering, so cursors never land between equal sort values.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub start_after: Option<StartAfter>,
}

impl Query {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            start_after: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: StartAfter) -> Self {
        self.start_after = Some(cursor);
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RepoError>;

    /// Insert a document under a backend-assigned id and return it as stored.
    async fn add(&self, collection: &str, fields: WriteFields) -> Result<Document, RepoError>;

    /// Create or overwrite a document under a caller-chosen id.
    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
    ) -> Result<Document, RepoError>;

    /// Apply partial updates; fails with `NotFound` when the document is absent.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), RepoError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RepoError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, RepoError>;

    async fn count(&self, collection: &str) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a blob and return its public url.
    async fn put(
        &self,
        blob_id: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RepoError>;

    async fn delete(&self, blob_id: &str) -> Result<(), RepoError>;
}

pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<User>;
}
