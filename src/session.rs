use std::sync::{Arc, OnceLock, RwLock};

use crate::SessionIdentity;

/// Contract the sign-in flow requires of the application's session state.
///
/// The coordinator calls [`SessionStore::login`] exactly once per successful
/// flow and never touches the store otherwise.
pub trait SessionStore: Send + Sync {
    fn login(&self, identity: SessionIdentity);
    fn logout(&self);
    fn is_authenticated(&self) -> bool;
    fn user(&self) -> Option<SessionIdentity>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    user: RwLock<Option<SessionIdentity>>,
}

static GLOBAL_SESSION: OnceLock<Arc<InMemorySessionStore>> = OnceLock::new();

impl InMemorySessionStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Process-wide session.
    pub fn global() -> Arc<Self> {
        GLOBAL_SESSION.get_or_init(Self::shared).clone()
    }
}

impl SessionStore for InMemorySessionStore {
    fn login(&self, identity: SessionIdentity) {
        tracing::info!(user = %identity.external_id, provider = %identity.provider, "Logged in.");
        *self.user.write().unwrap_or_else(|p| p.into_inner()) = Some(identity);
    }

    fn logout(&self) {
        tracing::info!("Logged out.");
        *self.user.write().unwrap_or_else(|p| p.into_inner()) = None;
    }

    fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    fn user(&self) -> Option<SessionIdentity> {
        self.user.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
