//! Shared read model behind every storefront service.

use std::num::NonZeroU32;

use tokio::sync::watch;

use crate::application::pagination::PaginationTracker;
use crate::cache::{DocumentCache, IdentityCache};
use crate::domain::entities::{Item, Offer, Question};

/// Owns the caches, trackers and the selected-item slot.
///
/// Services share one instance through `Arc`; observers subscribe to the
/// individual channels.
pub struct AppState {
    identity: IdentityCache,
    items: DocumentCache<Item>,
    questions: DocumentCache<Question>,
    offers: DocumentCache<Offer>,
    pagination: watch::Sender<PaginationTracker>,
    selected_item: watch::Sender<Option<Item>>,
    published_count: watch::Sender<u64>,
}

impl AppState {
    pub fn new(page_size: NonZeroU32) -> Self {
        let (pagination, _) = watch::channel(PaginationTracker::new(page_size));
        let (selected_item, _) = watch::channel(None);
        let (published_count, _) = watch::channel(0);
        Self {
            identity: IdentityCache::new(),
            items: DocumentCache::new(),
            questions: DocumentCache::new(),
            offers: DocumentCache::new(),
            pagination,
            selected_item,
            published_count,
        }
    }

    pub fn identity(&self) -> &IdentityCache {
        &self.identity
    }

    pub fn items(&self) -> &DocumentCache<Item> {
        &self.items
    }

    pub fn questions(&self) -> &DocumentCache<Question> {
        &self.questions
    }

    pub fn offers(&self) -> &DocumentCache<Offer> {
        &self.offers
    }

    pub fn pagination(&self) -> PaginationTracker {
        self.pagination.borrow().clone()
    }

    pub fn subscribe_pagination(&self) -> watch::Receiver<PaginationTracker> {
        self.pagination.subscribe()
    }

    pub(crate) fn update_pagination(&self, edit: impl FnOnce(&mut PaginationTracker)) {
        self.pagination.send_modify(edit);
    }

    pub fn selected_item(&self) -> Option<Item> {
        self.selected_item.borrow().clone()
    }

    pub fn subscribe_selected_item(&self) -> watch::Receiver<Option<Item>> {
        self.selected_item.subscribe()
    }

    pub fn select(&self, item: Item) {
        self.selected_item.send_replace(Some(item));
    }

    pub fn clear_selection(&self) {
        self.selected_item.send_replace(None);
    }

    pub fn published_count(&self) -> u64 {
        *self.published_count.borrow()
    }

    pub fn subscribe_published_count(&self) -> watch::Receiver<u64> {
        self.published_count.subscribe()
    }

    pub(crate) fn set_published_count(&self, count: u64) {
        self.published_count.send_replace(count);
    }

    /// Apply the same edit to the cached item and, if it is selected, the
    /// selected copy.
    pub(crate) fn edit_item<F>(&self, id: &str, edit: F)
    where
        F: Fn(&mut Item),
    {
        self.items.update(id, &edit);
        self.selected_item.send_if_modified(|selected| match selected {
            Some(item) if item.id == id => {
                edit(item);
                true
            }
            _ => false,
        });
    }

    /// Store an item in the cache and refresh the selected copy if it is the
    /// same item.
    pub(crate) fn store_item(&self, item: Item) {
        self.selected_item.send_if_modified(|selected| match selected {
            Some(current) if current.id == item.id => {
                *current = item.clone();
                true
            }
            _ => false,
        });
        self.items.upsert_one(item.id.clone(), item);
    }

    /// Forget an item everywhere it is referenced locally.
    pub(crate) fn forget_item(&self, id: &str) {
        self.update_pagination(|tracker| tracker.remove_everywhere(id));
        self.items.remove(id);
        self.selected_item.send_if_modified(|selected| {
            if selected.as_ref().is_some_and(|item| item.id == id) {
                *selected = None;
                true
            } else {
                false
            }
        });
    }
}
