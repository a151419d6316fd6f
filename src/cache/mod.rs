//! In-memory read model.
//!
//! - [`DocumentCache`]: id-keyed entity maps published as immutable snapshots
//! - [`IdentityCache`]: the signed-in user

mod documents;
mod identity;

pub use documents::{DocumentCache, Snapshot};
pub use identity::IdentityCache;
