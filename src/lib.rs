//! Client-side data layer for an auction storefront: cached items, offers and
//! questions kept in sync with a hosted document store.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
