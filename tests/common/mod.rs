//! Shared harness for storefront integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use bidhall::application::Storefront;
use bidhall::application::context::ServiceOptions;
use bidhall::application::repos::{
    Document, DocumentStore, FieldUpdate, Query, RepoError, WriteFields,
};
use bidhall::domain::entities::{Item, Question, User};
use bidhall::infra::memory::{InMemoryDocumentStore, InMemoryObjectStore};

/// In-memory store whose reads, writes, counts or individual deletes can be
/// made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryDocumentStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_counts: AtomicBool,
    failing_deletes: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new(inner: InMemoryDocumentStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &InMemoryDocumentStore {
        &self.inner
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_counts(&self, fail: bool) {
        self.fail_counts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete_of(&self, id: &str) {
        self.failing_deletes
            .lock()
            .expect("failing deletes lock")
            .insert(id.to_string());
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), RepoError> {
        if flag.load(Ordering::SeqCst) {
            Err(RepoError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RepoError> {
        self.check(&self.fail_reads)?;
        self.inner.get(collection, id).await
    }

    async fn add(&self, collection: &str, fields: WriteFields) -> Result<Document, RepoError> {
        self.check(&self.fail_writes)?;
        self.inner.add(collection, fields).await
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: WriteFields,
    ) -> Result<Document, RepoError> {
        self.check(&self.fail_writes)?;
        self.inner.set(collection, id, fields).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), RepoError> {
        self.check(&self.fail_writes)?;
        self.inner.update(collection, id, updates).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RepoError> {
        self.check(&self.fail_writes)?;
        if self
            .failing_deletes
            .lock()
            .expect("failing deletes lock")
            .contains(id)
        {
            return Err(RepoError::Unavailable(format!("cannot delete `{id}`")));
        }
        self.inner.delete(collection, id).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, RepoError> {
        self.check(&self.fail_reads)?;
        self.inner.query(query).await
    }

    async fn count(&self, collection: &str) -> Result<u64, RepoError> {
        self.check(&self.fail_reads)?;
        self.check(&self.fail_counts)?;
        self.inner.count(collection).await
    }
}

pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub objects: Arc<InMemoryObjectStore>,
    pub storefront: Storefront,
}

impl Harness {
    pub fn new(documents: Vec<(String, Document)>, page_size: u32) -> Self {
        let store = Arc::new(FlakyStore::new(InMemoryDocumentStore::with_documents(
            documents,
        )));
        let objects = Arc::new(InMemoryObjectStore::new("https://cdn.test"));
        let options = ServiceOptions {
            page_size: NonZeroU32::new(page_size).expect("non-zero page size"),
            ..ServiceOptions::default()
        };
        let storefront = Storefront::new(store.clone(), objects.clone(), &options);
        Self {
            store,
            objects,
            storefront,
        }
    }

    pub fn sign_in(&self, id: &str) -> User {
        let user = user(id);
        self.storefront.state().identity().sign_in(user.clone());
        user
    }

    pub fn sign_out(&self) {
        self.storefront.state().identity().sign_out();
    }
}

pub fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@example.test"),
    }
}

fn document(collection: &str, id: &str, fields: Value) -> (String, Document) {
    let fields = fields.as_object().cloned().expect("object fields");
    (collection.to_string(), Document::new(id, fields))
}

/// Item document with sensible defaults; `created` is unix millis.
pub fn item(id: &str, name: &str, views: u64, created: i64, owner: &str) -> (String, Document) {
    item_with(id, name, views, created, owner, json!({}))
}

/// Item document whose defaults are overridden by the fields in `extra`.
pub fn item_with(
    id: &str,
    name: &str,
    views: u64,
    created: i64,
    owner: &str,
    extra: Value,
) -> (String, Document) {
    let mut fields = json!({
        "name": name,
        "nameLowerCase": name.to_lowercase(),
        "description": format!("{name} in good condition"),
        "minPrice": 5.0,
        "categories": ["Home"],
        "createdAt": created,
        "userId": owner,
        "views": views,
        "questions": [],
        "offers": [],
    });
    if let (Some(base), Some(extra)) = (fields.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    document("items", id, fields)
}

pub fn question(id: &str, text: &str, asker: &str, owner: &str, created: i64) -> (String, Document) {
    document(
        "questions",
        id,
        json!({
            "text": text,
            "answer": null,
            "createdAt": created,
            "userId": asker,
            "itemCreatorId": owner,
            "updated": false,
        }),
    )
}

pub fn offer(item_id: &str, bidder: &str, amount: f64) -> (String, Document) {
    document(
        "offers",
        &format!("{item_id}_{bidder}"),
        json!({
            "email": format!("{bidder}@example.test"),
            "userId": bidder,
            "amount": amount,
        }),
    )
}

/// `count` items named `item-00`, `item-01`, ... created one second apart,
/// with views equal to their index.
pub fn catalogue(count: u64, owner: &str) -> Vec<(String, Document)> {
    (0..count)
        .map(|index| {
            item(
                &format!("item-{index:02}"),
                &format!("Item {index:02}"),
                index,
                1_700_000_000_000 + (index as i64) * 1_000,
                owner,
            )
        })
        .collect()
}

pub fn item_ids(items: &[Item]) -> Vec<&str> {
    items.iter().map(|item| item.id.as_str()).collect()
}

pub fn question_ids(questions: &[Question]) -> Vec<&str> {
    questions.iter().map(|question| question.id.as_str()).collect()
}
