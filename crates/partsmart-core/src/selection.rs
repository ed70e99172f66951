use crate::store::{
    AUTH_TOKEN_KEY, ENVIRONMENTS_BLOB_KEY, KeyValueStore, NETWORK_CONFIG_KEY,
    SELECTED_ENVIRONMENT_KEY, StoreError,
};
use crate::types::ResolvedConfig;

use std::sync::Arc;

/// Typed view over the device key-value store.
///
/// The `try_*` methods report storage failures. The plain methods apply the
/// soft-fail policy: failures are logged and read as "nothing stored".
#[derive(Clone)]
pub struct SelectionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SelectionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn try_selected_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .store
            .get(SELECTED_ENVIRONMENT_KEY)?
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()))
    }

    pub fn selected_id(&self) -> Option<String> {
        soften("read selected environment", self.try_selected_id()).flatten()
    }

    pub fn try_set_selected_id(&self, id: &str) -> Result<(), StoreError> {
        self.store.set(SELECTED_ENVIRONMENT_KEY, id)
    }

    pub fn set_selected_id(&self, id: &str) {
        soften("persist selected environment", self.try_set_selected_id(id));
    }

    /// Forget the selection and every cached network blob. The auth token is kept.
    pub fn try_clear(&self) -> Result<(), StoreError> {
        self.store.remove(SELECTED_ENVIRONMENT_KEY)?;
        self.store.remove(NETWORK_CONFIG_KEY)?;
        self.store.remove(ENVIRONMENTS_BLOB_KEY)?;
        Ok(())
    }

    pub fn clear(&self) {
        soften("clear environment selection", self.try_clear());
    }

    pub fn try_cached_network(&self) -> Result<Option<ResolvedConfig>, StoreError> {
        match self.store.get(NETWORK_CONFIG_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn cached_network(&self) -> Option<ResolvedConfig> {
        soften("read cached network config", self.try_cached_network()).flatten()
    }

    pub fn save_cached_network(&self, config: &ResolvedConfig) {
        let result = serde_json::to_string(config)
            .map_err(StoreError::from)
            .and_then(|json| self.store.set(NETWORK_CONFIG_KEY, &json));
        soften("persist network config", result);
    }

    pub fn auth_token(&self) -> Option<String> {
        soften("read auth token", self.store.get(AUTH_TOKEN_KEY)).flatten()
    }

    pub fn set_auth_token(&self, token: &str) {
        soften("persist auth token", self.store.set(AUTH_TOKEN_KEY, token));
    }

    pub fn clear_auth_token(&self) {
        soften("remove auth token", self.store.remove(AUTH_TOKEN_KEY));
    }
}

/// Fallback policy at the storage boundary: log the failure and carry on without a value.
fn soften<T>(what: &str, result: Result<T, StoreError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Failed to {}: {}", what, e);
            None
        }
    }
}
