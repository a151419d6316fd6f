use futures::try_join;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::cleanup::{PendingCleanup, spawn_item_cleanup};
use crate::application::context::ServiceContext;
use crate::application::error::{AppError, operation_failed};
use crate::application::pagination::{CursorPage, ListingCursor, PaginationError, listing_query};
use crate::application::repos::{FieldUpdate, FieldValue, RepoError, decode_all, encode_fields};
use crate::domain::entities::{Item, ItemFields, ItemImage, search_key};
use crate::domain::types::{PageDirection, SortDimension};

/// Replacement image supplied with an item edit.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewItemDocument<'a> {
    name: &'a str,
    name_lower_case: String,
    description: &'a str,
    min_price: f64,
    categories: &'a [String],
    user_id: &'a str,
    views: u64,
    questions: Vec<String>,
    offers: Vec<String>,
}

struct FetchedPage {
    items: Vec<Item>,
    cursor: Option<ListingCursor>,
}

impl FetchedPage {
    fn ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}

#[derive(Clone)]
pub struct ItemService {
    ctx: ServiceContext,
}

impl ItemService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Refresh the published count and the first page of both listings.
    pub async fn load_storefront(&self) -> Result<(), AppError> {
        let count = async {
            self.ctx
                .documents
                .count(&self.ctx.collections.items)
                .await
                .map_err(operation_failed("count_items"))
        };
        let (count, hottest, latest) = try_join!(
            count,
            self.fetch_page(SortDimension::Hottest, None),
            self.fetch_page(SortDimension::Latest, None),
        )?;

        self.ctx.state.set_published_count(count);
        self.apply_initial(SortDimension::Hottest, hottest);
        self.apply_initial(SortDimension::Latest, latest);

        info!(
            target = "bidhall::listing",
            published = count,
            "storefront loaded"
        );
        Ok(())
    }

    pub async fn load_page(
        &self,
        dimension: SortDimension,
        direction: PageDirection,
    ) -> Result<CursorPage<Item>, AppError> {
        debug!(
            target = "bidhall::listing",
            dimension = dimension.as_str(),
            direction = direction.as_str(),
            "loading page"
        );

        match direction {
            PageDirection::Initial => {
                let page = self.fetch_page(dimension, None).await?;
                self.apply_initial(dimension, page);
            }
            PageDirection::Next => {
                let last_id = self
                    .ctx
                    .state
                    .pagination()
                    .dimension(dimension)
                    .last_id()
                    .map(str::to_string)
                    .ok_or(PaginationError::NoCursor { dimension })?;
                let collection = &self.ctx.collections.items;
                let anchor = self
                    .ctx
                    .documents
                    .get(collection, &last_id)
                    .await
                    .map_err(operation_failed("load_page"))?
                    .ok_or_else(|| AppError::not_found("item", &last_id))?;
                let cursor = ListingCursor::from_document(dimension, &anchor);
                let page = self.fetch_page(dimension, Some(cursor)).await?;
                self.apply_next(dimension, page);
            }
            PageDirection::Prev => self.ctx.state.update_pagination(|tracker| {
                tracker.dimension_mut(dimension).retreat();
            }),
        }

        self.current_page(dimension)
    }

    /// Items of the current page window, read from the cache.
    pub fn current_page(&self, dimension: SortDimension) -> Result<CursorPage<Item>, AppError> {
        let tracker = self.ctx.state.pagination();
        let snapshot = self.ctx.state.items().snapshot();
        let items = tracker
            .current_page_ids(dimension)
            .iter()
            .map(|id| {
                snapshot.get(id).cloned().ok_or_else(|| {
                    AppError::consistency(format!("tracked item `{id}` is missing from the cache"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let position = tracker.dimension(dimension);
        let next_cursor = position
            .cursor()
            .map(ListingCursor::encode)
            .transpose()?;
        Ok(CursorPage::new(position.page(), items, next_cursor))
    }

    pub async fn create_item(&self, fields: ItemFields) -> Result<Item, AppError> {
        let user = self.ctx.require_user("create an item")?;
        fields.validate()?;

        let collection = &self.ctx.collections.items;
        let document = NewItemDocument {
            name: &fields.name,
            name_lower_case: search_key(&fields.name),
            description: &fields.description,
            min_price: fields.min_price,
            categories: &fields.categories,
            user_id: &user.id,
            views: 0,
            questions: Vec::new(),
            offers: Vec::new(),
        };
        let mut write = encode_fields(&document).map_err(operation_failed("create_item"))?;
        write.insert("createdAt".to_string(), FieldValue::ServerTimestamp);

        let stored = self
            .ctx
            .documents
            .add(collection, write)
            .await
            .map_err(operation_failed("create_item"))?;
        let item: Item = stored
            .decode(collection)
            .map_err(operation_failed("create_item"))?;

        self.ctx.state.items().upsert_one(item.id.clone(), item.clone());
        self.ctx.state.update_pagination(|tracker| {
            let latest = tracker.dimension_mut(SortDimension::Latest);
            if !latest.is_empty() {
                latest.prepend(&item.id);
            }
        });
        self.ctx
            .state
            .set_published_count(self.ctx.state.published_count() + 1);

        info!(
            target = "bidhall::items",
            item_id = %item.id,
            user_id = %user.id,
            "item created"
        );
        Ok(item)
    }

    /// Save edits to the selected item, optionally replacing its image.
    pub async fn update_item(
        &self,
        id: &str,
        fields: ItemFields,
        image: Option<ImageUpload>,
    ) -> Result<Item, AppError> {
        let user = self.ctx.require_user("edit an item")?;
        let selected = self.ctx.require_selected("edit an item")?;
        if selected.id != id {
            return Err(AppError::precondition(format!(
                "item `{id}` is not the selected item"
            )));
        }
        if !selected.is_owned_by(&user.id) {
            return Err(AppError::precondition("only the owner can edit this item"));
        }
        fields.validate()?;

        let mut updated = selected.clone();
        updated.apply_fields(fields);

        let mut updates = vec![
            FieldUpdate::set("name", updated.name.clone()),
            FieldUpdate::set("nameLowerCase", updated.name_lower_case.clone()),
            FieldUpdate::set("description", updated.description.clone()),
            FieldUpdate::set("minPrice", updated.min_price),
            FieldUpdate::set("categories", updated.categories.clone()),
        ];

        let uploaded = match image {
            Some(upload) => {
                let image = self.upload_image(&selected, upload).await?;
                let encoded = serde_json::to_value(&image).map_err(RepoError::from_persistence);
                match encoded {
                    Ok(encoded) => updates.push(FieldUpdate::set("image", encoded)),
                    Err(err) => {
                        self.discard_image(&image).await;
                        return Err(operation_failed("update_item")(err));
                    }
                }
                updated.image = Some(image.clone());
                Some(image)
            }
            None => None,
        };

        if let Err(err) = self
            .ctx
            .documents
            .update(&self.ctx.collections.items, id, updates)
            .await
        {
            if let Some(image) = &uploaded {
                self.discard_image(image).await;
            }
            return Err(operation_failed("update_item")(err));
        }

        // The old image goes only once nothing references it.
        if uploaded.is_some()
            && let Some(old) = &selected.image
        {
            self.discard_image(old).await;
        }

        self.ctx.state.store_item(updated.clone());

        info!(target = "bidhall::items", item_id = %id, "item updated");
        Ok(updated)
    }

    /// Delete an owned item. Its questions and offers are removed in the
    /// background; the returned handle reports how that went.
    ///
    /// The dependent ids come from a fresh remote read, never the cache.
    pub async fn delete_item(&self, id: &str) -> Result<PendingCleanup, AppError> {
        let user = self.ctx.require_user("delete an item")?;
        let item = self.ctx.fetch_item(id, "delete_item").await?;
        if !item.is_owned_by(&user.id) {
            return Err(AppError::precondition("only the owner can delete this item"));
        }

        let delete_document = self.ctx.documents.delete(&self.ctx.collections.items, id);
        let delete_image = async {
            match &item.image {
                Some(image) => self.ctx.objects.delete(&image.storage_id).await,
                None => Ok(()),
            }
        };
        try_join!(delete_document, delete_image).map_err(operation_failed("delete_item"))?;

        self.ctx.state.forget_item(id);
        self.ctx
            .state
            .set_published_count(self.ctx.state.published_count().saturating_sub(1));

        info!(
            target = "bidhall::items",
            item_id = %id,
            questions = item.questions.len(),
            offers = item.offers.len(),
            "item deleted"
        );
        Ok(spawn_item_cleanup(&self.ctx, &item))
    }

    /// Read an item for display, counting the view.
    ///
    /// The returned copy already includes the new view; the remote increment
    /// runs in the background and only logs failures.
    pub async fn load_item(&self, id: &str) -> Result<Item, AppError> {
        let mut item = self.ctx.fetch_item(id, "load_item").await?;
        item.views += 1;

        self.ctx.state.items().upsert_one(item.id.clone(), item.clone());
        self.ctx.state.select(item.clone());
        self.spawn_view_increment(item.id.clone());
        Ok(item)
    }

    /// Select an already cached item without a remote read.
    pub fn select_item(&self, id: &str) -> Result<Item, AppError> {
        let item = self
            .ctx
            .state
            .items()
            .get(id)
            .ok_or_else(|| AppError::not_found("item", id))?;
        self.ctx.state.select(item.clone());
        Ok(item)
    }

    pub fn clear_selection(&self) {
        self.ctx.state.clear_selection();
    }

    pub fn published_count(&self) -> u64 {
        self.ctx.state.published_count()
    }

    async fn fetch_page(
        &self,
        dimension: SortDimension,
        cursor: Option<ListingCursor>,
    ) -> Result<FetchedPage, AppError> {
        let collection = &self.ctx.collections.items;
        let request = self.ctx.state.pagination().request(dimension, cursor);
        let query = listing_query(collection, dimension, &request);

        let documents = self
            .ctx
            .documents
            .query(&query)
            .await
            .map_err(operation_failed("load_page"))?;
        let cursor = documents
            .last()
            .map(|document| ListingCursor::from_document(dimension, document));
        let items = decode_all(&documents, collection).map_err(operation_failed("load_page"))?;
        Ok(FetchedPage { items, cursor })
    }

    fn apply_initial(&self, dimension: SortDimension, page: FetchedPage) {
        let ids = page.ids();
        self.merge_items(page.items);
        self.ctx.state.update_pagination(|tracker| {
            tracker.dimension_mut(dimension).reset(ids, page.cursor);
        });
    }

    fn apply_next(&self, dimension: SortDimension, page: FetchedPage) {
        let ids = page.ids();
        self.merge_items(page.items);
        self.ctx.state.update_pagination(|tracker| {
            let added = tracker.dimension_mut(dimension).append(ids, page.cursor);
            debug!(
                target = "bidhall::listing",
                dimension = dimension.as_str(),
                added,
                "page appended"
            );
        });
    }

    fn merge_items(&self, items: Vec<Item>) {
        self.ctx
            .state
            .items()
            .merge(items.into_iter().map(|item| (item.id.clone(), item)));
    }

    async fn upload_image(&self, item: &Item, upload: ImageUpload) -> Result<ItemImage, AppError> {
        let storage_id = format!("{}/{}/{}", self.ctx.image_prefix, item.id, Uuid::new_v4());
        let url = self
            .ctx
            .objects
            .put(&storage_id, upload.bytes, &upload.content_type)
            .await
            .map_err(operation_failed("update_item"))?;
        Ok(ItemImage { url, storage_id })
    }

    /// Best-effort blob removal; a leftover blob is only logged.
    async fn discard_image(&self, image: &ItemImage) {
        if let Err(err) = self.ctx.objects.delete(&image.storage_id).await {
            warn!(
                target = "bidhall::items",
                storage_id = %image.storage_id,
                error = %err,
                "image blob was not deleted"
            );
        }
    }

    fn spawn_view_increment(&self, id: String) {
        let documents = self.ctx.documents.clone();
        let collection = self.ctx.collections.items.clone();
        tokio::spawn(async move {
            if let Err(err) = documents
                .update(&collection, &id, vec![FieldUpdate::increment("views", 1)])
                .await
            {
                warn!(
                    target = "bidhall::items",
                    item_id = %id,
                    error = %err,
                    "view increment failed"
                );
            }
        });
    }
}
