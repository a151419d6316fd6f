//! Current signed-in user.

use tokio::sync::watch;
use tracing::info;

use crate::application::repos::IdentityProvider;
use crate::domain::entities::User;

/// Holds the authenticated user pushed in by the auth collaborator.
pub struct IdentityCache {
    tx: watch::Sender<Option<User>>,
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityCache {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn sign_in(&self, user: User) {
        info!(target = "bidhall::identity", user_id = %user.id, "signed in");
        self.tx.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            info!(target = "bidhall::identity", "signed out");
        }
    }

    pub fn current(&self) -> Option<User> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.tx.subscribe()
    }
}

impl IdentityProvider for IdentityCache {
    fn current_user(&self) -> Option<User> {
        self.current()
    }
}
