//! Copy-on-write document maps.
//!
//! Every mutation clones the current map, applies the change and publishes the
//! new `Arc` through a watch channel. Readers holding an older snapshot keep
//! seeing exactly what they had.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;

pub type Snapshot<T> = Arc<HashMap<String, T>>;

pub struct DocumentCache<T> {
    tx: watch::Sender<Snapshot<T>>,
}

impl<T> Default for DocumentCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DocumentCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(HashMap::new()));
        Self { tx }
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.tx.subscribe()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.tx.borrow().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tx.borrow().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Insert or overwrite every entry; nothing is removed.
    pub fn merge<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, T)>,
    {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return;
        }
        self.tx.send_modify(|current| {
            let mut next = HashMap::clone(current);
            next.extend(entries);
            *current = Arc::new(next);
        });
    }

    pub fn upsert_one(&self, id: impl Into<String>, entity: T) {
        let id = id.into();
        self.tx.send_modify(|current| {
            let mut next = HashMap::clone(current);
            next.insert(id, entity);
            *current = Arc::new(next);
        });
    }

    /// Remove an entry; absent ids leave the snapshot untouched.
    pub fn remove(&self, id: &str) -> Option<T> {
        let mut removed = None;
        self.tx.send_if_modified(|current| {
            if !current.contains_key(id) {
                return false;
            }
            let mut next = HashMap::clone(current);
            removed = next.remove(id);
            *current = Arc::new(next);
            true
        });
        removed
    }

    pub fn remove_many<'a, I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut count = 0;
        self.tx.send_if_modified(|current| {
            let mut next = HashMap::clone(current);
            for id in ids {
                if next.remove(id).is_some() {
                    count += 1;
                }
            }
            if count == 0 {
                return false;
            }
            *current = Arc::new(next);
            true
        });
        count
    }

    /// Apply `edit` to a cached entry in place of a full upsert.
    ///
    /// Returns `false` without republishing when the id is not cached.
    pub fn update<F>(&self, id: &str, edit: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        self.tx.send_if_modified(|current| {
            let Some(existing) = current.get(id) else {
                return false;
            };
            let mut entity = existing.clone();
            edit(&mut entity);
            let mut next = HashMap::clone(current);
            next.insert(id.to_string(), entity);
            *current = Arc::new(next);
            true
        })
    }
}
