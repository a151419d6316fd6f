use std::cmp::Ordering;

use futures::{future::try_join_all, try_join};
use tracing::{info, warn};

use crate::application::context::ServiceContext;
use crate::application::error::{AppError, operation_failed};
use crate::application::repos::{FieldUpdate, encode_fields};
use crate::domain::entities::{Item, Offer};
use crate::domain::error::DomainError;

#[derive(Clone)]
pub struct OfferService {
    ctx: ServiceContext,
}

impl OfferService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Place or raise the signed-in user's offer on the selected item.
    pub async fn set_offer(&self, amount: f64) -> Result<Offer, AppError> {
        let user = self.ctx.require_user("make an offer")?;
        let item = self.ctx.require_selected("make an offer")?;
        if item.is_owned_by(&user.id) {
            return Err(AppError::precondition(
                "owners cannot make offers on their own item",
            ));
        }
        if item.accepted_offer.is_some() {
            return Err(AppError::precondition("this item already accepted an offer"));
        }
        if !amount.is_finite() || amount < item.min_price {
            return Err(DomainError::validation(format!(
                "offer must be at least the minimum price of {}",
                item.min_price
            ))
            .into());
        }

        let offer = Offer {
            id: Offer::id_for(&item.id, &user.id),
            email: user.email.clone(),
            user_id: user.id.clone(),
            amount,
        };
        let fields = encode_fields(&offer).map_err(operation_failed("set_offer"))?;

        let write_offer = self
            .ctx
            .documents
            .set(&self.ctx.collections.offers, &offer.id, fields);
        let link_offer = self.ctx.documents.update(
            &self.ctx.collections.items,
            &item.id,
            vec![FieldUpdate::array_union("offers", offer.id.clone())],
        );
        try_join!(write_offer, link_offer).map_err(operation_failed("set_offer"))?;

        self.ctx
            .state
            .offers()
            .upsert_one(offer.id.clone(), offer.clone());
        let offer_id = offer.id.clone();
        self.ctx.state.edit_item(&item.id, move |cached| {
            if !cached.offers.contains(&offer_id) {
                cached.offers.push(offer_id.clone());
            }
        });

        info!(
            target = "bidhall::offers",
            item_id = %item.id,
            offer_id = %offer.id,
            amount,
            "offer placed"
        );
        Ok(offer)
    }

    /// Fetch every offer referenced by an item and merge them into the cache.
    pub async fn load_item_offers(&self, item_id: &str) -> Result<Vec<Offer>, AppError> {
        let remote = self.ctx.fetch_item(item_id, "load_offers").await?;
        let collection = &self.ctx.collections.offers;

        let documents = try_join_all(
            remote
                .offers
                .iter()
                .map(|offer_id| self.ctx.documents.get(collection, offer_id)),
        )
        .await
        .map_err(operation_failed("load_offers"))?;

        let mut offers = Vec::with_capacity(documents.len());
        for (offer_id, document) in remote.offers.iter().zip(documents) {
            match document {
                Some(document) => offers.push(
                    document
                        .decode::<Offer>(collection)
                        .map_err(operation_failed("load_offers"))?,
                ),
                None => warn!(
                    target = "bidhall::offers",
                    item_id,
                    offer_id = %offer_id,
                    "item references a missing offer"
                ),
            }
        }

        self.ctx.state.offers().merge(
            offers
                .iter()
                .map(|offer| (offer.id.clone(), offer.clone())),
        );
        if self.cached_item(item_id).is_some() {
            let ids = remote.offers.clone();
            let accepted = remote.accepted_offer.clone();
            self.ctx.state.edit_item(item_id, move |cached| {
                cached.offers = ids.clone();
                cached.accepted_offer = accepted.clone();
            });
        } else {
            // Keep the offer ids readable through `item_offers`.
            self.ctx.state.items().upsert_one(remote.id.clone(), remote);
        }

        offers.sort_by(compare_offers);
        Ok(offers)
    }

    /// Cached offers of an item, highest amount first.
    pub fn item_offers(&self, item_id: &str) -> Vec<Offer> {
        let Some(item) = self.cached_item(item_id) else {
            return Vec::new();
        };
        let snapshot = self.ctx.state.offers().snapshot();
        let mut offers: Vec<Offer> = item
            .offers
            .iter()
            .filter_map(|offer_id| snapshot.get(offer_id).cloned())
            .collect();
        offers.sort_by(compare_offers);
        offers
    }

    /// Owner accepts one of the offers on the selected item.
    pub async fn accept_offer(&self, offer_id: &str) -> Result<Item, AppError> {
        let user = self.ctx.require_user("accept an offer")?;
        let item = self.ctx.require_selected("accept an offer")?;
        if !item.is_owned_by(&user.id) {
            return Err(AppError::precondition("only the owner can accept offers"));
        }
        if !item.offers.iter().any(|candidate| candidate == offer_id) {
            return Err(AppError::not_found("offer", offer_id));
        }

        self.ctx
            .documents
            .update(
                &self.ctx.collections.items,
                &item.id,
                vec![FieldUpdate::set("acceptedOffer", offer_id)],
            )
            .await
            .map_err(operation_failed("accept_offer"))?;

        let accepted = offer_id.to_string();
        self.ctx.state.edit_item(&item.id, move |cached| {
            cached.accepted_offer = Some(accepted.clone());
        });

        info!(
            target = "bidhall::offers",
            item_id = %item.id,
            offer_id,
            "offer accepted"
        );
        Ok(Item {
            accepted_offer: Some(offer_id.to_string()),
            ..item
        })
    }

    fn cached_item(&self, item_id: &str) -> Option<Item> {
        self.ctx.state.items().get(item_id).or_else(|| {
            self.ctx
                .state
                .selected_item()
                .filter(|selected| selected.id == item_id)
        })
    }
}

fn compare_offers(left: &Offer, right: &Offer) -> Ordering {
    right
        .amount
        .total_cmp(&left.amount)
        .then_with(|| left.id.cmp(&right.id))
}
