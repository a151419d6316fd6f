use std::sync::Arc;

use crate::application::context::{ServiceContext, ServiceOptions};
use crate::application::items::ItemService;
use crate::application::offers::OfferService;
use crate::application::questions::QuestionService;
use crate::application::repos::{DocumentStore, ObjectStore};
use crate::application::search::SearchService;
use crate::application::state::AppState;

/// Every storefront service wired over one shared [`AppState`].
#[derive(Clone)]
pub struct Storefront {
    pub items: ItemService,
    pub offers: OfferService,
    pub questions: QuestionService,
    pub search: SearchService,
    state: Arc<AppState>,
}

impl Storefront {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        options: &ServiceOptions,
    ) -> Self {
        let state = Arc::new(AppState::new(options.page_size));
        let ctx = ServiceContext::new(state.clone(), documents, objects, options);
        Self {
            items: ItemService::new(ctx.clone()),
            offers: OfferService::new(ctx.clone()),
            questions: QuestionService::new(ctx.clone()),
            search: SearchService::new(ctx),
            state,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}
