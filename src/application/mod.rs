//! Storefront services and the read model they maintain.

pub mod cleanup;
pub mod context;
pub mod error;
pub mod items;
pub mod offers;
pub mod pagination;
pub mod questions;
pub mod repos;
pub mod search;
pub mod state;
pub mod storefront;

pub use storefront::Storefront;
