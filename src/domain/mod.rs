//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod timestamp;
pub mod types;
pub mod validation;
