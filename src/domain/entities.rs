//! Domain entities mirrored from the remote document store.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Authenticated storefront user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemImage {
    pub url: String,
    pub storage_id: String,
}

/// User-editable subset of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFields {
    pub name: String,
    pub description: String,
    pub min_price: f64,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub name_lower_case: String,
    pub description: String,
    pub min_price: f64,
    pub categories: Vec<String>,
    #[serde(with = "crate::domain::timestamp")]
    pub created_at: OffsetDateTime,
    pub user_id: String,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub offers: Vec<String>,
    #[serde(default)]
    pub image: Option<ItemImage>,
    #[serde(default)]
    pub accepted_offer: Option<String>,
}

impl Item {
    pub fn fields(&self) -> ItemFields {
        ItemFields {
            name: self.name.clone(),
            description: self.description.clone(),
            min_price: self.min_price,
            categories: self.categories.clone(),
        }
    }

    /// Copy editable fields over this item, recomputing the search key.
    pub fn apply_fields(&mut self, fields: ItemFields) {
        self.name_lower_case = search_key(&fields.name);
        self.name = fields.name;
        self.description = fields.description;
        self.min_price = fields.min_price;
        self.categories = fields.categories;
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(default)]
    pub id: String,
    pub email: String,
    pub user_id: String,
    pub amount: f64,
}

impl Offer {
    /// One offer per bidder and item; re-offering overwrites the amount.
    pub fn id_for(item_id: &str, bidder_id: &str) -> String {
        format!("{item_id}_{bidder_id}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(with = "crate::domain::timestamp")]
    pub created_at: OffsetDateTime,
    pub user_id: String,
    pub item_creator_id: String,
    #[serde(default)]
    pub updated: bool,
}

/// Lowercased form of an item name used for prefix search.
pub fn search_key(name: &str) -> String {
    name.to_lowercase()
}
