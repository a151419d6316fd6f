use std::num::NonZeroU32;
use std::sync::Arc;

use crate::application::error::{AppError, operation_failed};
use crate::application::repos::{DocumentStore, IdentityProvider, ObjectStore};
use crate::application::state::AppState;
use crate::domain::entities::{Item, User};

/// Remote collection names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub items: String,
    pub questions: String,
    pub offers: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            items: "items".to_string(),
            questions: "questions".to_string(),
            offers: "offers".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub collections: Collections,
    pub page_size: NonZeroU32,
    pub image_prefix: String,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            collections: Collections::default(),
            page_size: NonZeroU32::new(9).unwrap_or(NonZeroU32::MIN),
            image_prefix: "images".to_string(),
        }
    }
}

impl From<&crate::config::Settings> for ServiceOptions {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            collections: Collections {
                items: settings.collections.items.clone(),
                questions: settings.collections.questions.clone(),
                offers: settings.collections.offers.clone(),
            },
            page_size: settings.listing.page_size,
            image_prefix: settings.storage.image_prefix.clone(),
        }
    }
}

/// Everything a service needs: shared state plus remote collaborators.
#[derive(Clone)]
pub struct ServiceContext {
    pub state: Arc<AppState>,
    pub documents: Arc<dyn DocumentStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub collections: Collections,
    pub image_prefix: String,
}

impl ServiceContext {
    pub fn new(
        state: Arc<AppState>,
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        options: &ServiceOptions,
    ) -> Self {
        Self {
            state,
            documents,
            objects,
            collections: options.collections.clone(),
            image_prefix: options.image_prefix.clone(),
        }
    }

    pub(crate) fn require_user(&self, action: &str) -> Result<User, AppError> {
        self.state
            .identity()
            .current_user()
            .ok_or_else(|| AppError::precondition(format!("sign in to {action}")))
    }

    pub(crate) fn require_selected(&self, action: &str) -> Result<Item, AppError> {
        self.state
            .selected_item()
            .ok_or_else(|| AppError::precondition(format!("select an item to {action}")))
    }

    /// Read an item straight from the backend.
    pub(crate) async fn fetch_item(
        &self,
        id: &str,
        operation: &'static str,
    ) -> Result<Item, AppError> {
        let collection = &self.collections.items;
        let document = self
            .documents
            .get(collection, id)
            .await
            .map_err(operation_failed(operation))?
            .ok_or_else(|| AppError::not_found("item", id))?;
        document
            .decode(collection)
            .map_err(operation_failed(operation))
    }
}
