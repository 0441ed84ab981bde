//! Shared application state for handlers and middleware.

use tessera_auth::PermissionResolver;
use tessera_config::ConfigStore;

/// Dependencies shared by every request.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub(crate) store: ConfigStore,
    pub(crate) permissions: PermissionResolver,
}

impl ApiState {
    /// State over a store and a permission resolver.
    #[must_use]
    pub const fn new(store: ConfigStore, permissions: PermissionResolver) -> Self {
        Self { store, permissions }
    }

    /// Settings store.
    #[must_use]
    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Permission resolver.
    #[must_use]
    pub const fn permissions(&self) -> &PermissionResolver {
        &self.permissions
    }
}
