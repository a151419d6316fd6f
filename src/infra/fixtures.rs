//! JSON fixtures used to seed the in-memory backend.
//!
//! A fixture is one object keyed by collection name, each holding an array of
//! documents with a string `id`:
//!
//! ```json
//! { "items": [{ "id": "a1", "name": "Oak table", ... }], "questions": [], "offers": [] }
//! ```

use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::application::context::Collections;
use crate::application::repos::Document;
use crate::infra::error::InfraError;
use crate::infra::memory::InMemoryDocumentStore;

/// Read a fixture file and build a document store from it.
pub async fn load(path: &Path, collections: &Collections) -> Result<InMemoryDocumentStore, InfraError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let store = parse(&raw, collections)?;
    info!(
        target = "bidhall::fixtures",
        path = %path.display(),
        "fixture loaded"
    );
    Ok(store)
}

/// Parse fixture text. Collections absent from the fixture start empty.
pub fn parse(raw: &str, collections: &Collections) -> Result<InMemoryDocumentStore, InfraError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| InfraError::fixture(format!("invalid JSON: {err}")))?;
    let Value::Object(mut root) = value else {
        return Err(InfraError::fixture("fixture root must be an object"));
    };

    let mut documents = Vec::new();
    for name in [&collections.items, &collections.questions, &collections.offers] {
        let Some(entries) = root.remove(name.as_str()) else {
            continue;
        };
        let Value::Array(entries) = entries else {
            return Err(InfraError::fixture(format!(
                "collection `{name}` must be an array"
            )));
        };
        for (index, entry) in entries.into_iter().enumerate() {
            documents.push((name.clone(), document(name, index, entry)?));
        }
    }

    Ok(InMemoryDocumentStore::with_documents(documents))
}

fn document(collection: &str, index: usize, entry: Value) -> Result<Document, InfraError> {
    let Value::Object(mut fields) = entry else {
        return Err(InfraError::fixture(format!(
            "`{collection}[{index}]` must be an object"
        )));
    };
    match fields.remove("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(Document::new(id, fields)),
        _ => Err(InfraError::fixture(format!(
            "`{collection}[{index}]` needs a non-empty string `id`"
        ))),
    }
}
