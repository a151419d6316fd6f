//! Field validation for user-editable item data.

use std::fmt;

use serde::Serialize;

use crate::domain::entities::ItemFields;
use crate::domain::error::DomainError;

/// Lowest accepted minimum price for a listing.
pub const MIN_PRICE_FLOOR: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemField {
    Name,
    Description,
    MinPrice,
    Categories,
}

impl ItemField {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemField::Name => "name",
            ItemField::Description => "description",
            ItemField::MinPrice => "min_price",
            ItemField::Categories => "categories",
        }
    }
}

/// Every field that failed validation, plus the positions of blank categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    pub fields: Vec<ItemField>,
    pub invalid_categories: Vec<usize>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: ItemField) -> bool {
        self.fields.contains(&field)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fields.iter().map(|field| field.as_str()).collect();
        write!(f, "{}", names.join(", "))?;
        if !self.invalid_categories.is_empty() {
            write!(f, " (blank categories at {:?})", self.invalid_categories)?;
        }
        Ok(())
    }
}

impl ItemFields {
    /// Collect every validation failure instead of stopping at the first one.
    pub fn check(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();

        if self.name.trim().is_empty() {
            errors.fields.push(ItemField::Name);
        }
        if self.description.trim().is_empty() {
            errors.fields.push(ItemField::Description);
        }
        if !self.min_price.is_finite() || self.min_price < MIN_PRICE_FLOOR {
            errors.fields.push(ItemField::MinPrice);
        }

        errors.invalid_categories = self
            .categories
            .iter()
            .enumerate()
            .filter(|(_, category)| category.trim().is_empty())
            .map(|(index, _)| index)
            .collect();
        if self.categories.is_empty() || !errors.invalid_categories.is_empty() {
            errors.fields.push(ItemField::Categories);
        }

        errors
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let errors = self.check();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::InvalidFields(errors))
        }
    }
}
