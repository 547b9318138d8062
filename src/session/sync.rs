use std::sync::Arc;

use super::client::StoreApi;
use crate::core::errors::ApiError;
use crate::proxy::types::resource_id;
use crate::proxy::Store;

/// Result of a store mutation once the local view has been refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncOutcome {
    /// The selected store vanished and the selection was dropped.
    pub selection_cleared: bool,
    /// The mutation succeeded but re-listing afterwards failed, so the
    /// local list may be stale.
    pub refresh_error: Option<ApiError>,
}

/// Session copy of the store list plus the current selection.
///
/// The list is only ever replaced wholesale from `list_stores`, in the
/// order the backend returns it. Every mutation refreshes before returning;
/// a delete the backend confirmed is applied locally even when that refresh
/// fails.
pub struct StoreSynchronizer {
    api: Arc<dyn StoreApi>,
    stores: Vec<Store>,
    selected: Option<String>,
}

impl StoreSynchronizer {
    pub fn new(api: Arc<dyn StoreApi>) -> Self {
        Self {
            api,
            stores: Vec::new(),
            selected: None,
        }
    }

    pub fn api(&self) -> &Arc<dyn StoreApi> {
        &self.api
    }

    pub fn stores(&self) -> &[Store] {
        &self.stores
    }

    pub fn selected(&self) -> Option<&Store> {
        let id = self.selected.as_deref()?;
        self.stores.iter().find(|store| store.id == id)
    }

    pub async fn refresh(&mut self) -> Result<SyncOutcome, ApiError> {
        let stores = self.api.list_stores().await?;
        self.stores = stores;

        let gone = self
            .selected
            .as_deref()
            .is_some_and(|id| !self.stores.iter().any(|store| store.id == id));
        if gone {
            if let Some(id) = self.selected.take() {
                tracing::debug!("Selected store {} is gone; clearing selection", id);
            }
        }
        Ok(SyncOutcome {
            selection_cleared: gone,
            refresh_error: None,
        })
    }

    pub fn select(&mut self, store_id: &str) -> Result<&Store, ApiError> {
        let store = self
            .stores
            .iter()
            .find(|store| store.id == store_id)
            .ok_or_else(|| ApiError::NotFound(format!("Store '{}' not found", store_id)))?;
        self.selected = Some(store.id.clone());
        Ok(store)
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub async fn create_store(&mut self, display_name: &str) -> Result<Store, ApiError> {
        let store = self.api.create_store(display_name).await?;
        self.refresh().await?;
        Ok(store)
    }

    /// Deletes through the backend, then refreshes.
    ///
    /// Once the backend confirms the delete the store is dropped locally
    /// (and deselected) even if the refresh fails; that failure comes back
    /// in [`SyncOutcome::refresh_error`] rather than as an error.
    pub async fn delete_store(&mut self, store_id: &str) -> Result<SyncOutcome, ApiError> {
        self.api.delete_store(store_id).await?;

        let deleted = resource_id(store_id.trim()).to_string();
        self.stores.retain(|store| store.id != deleted);
        let mut selection_cleared = false;
        if self.selected.as_deref() == Some(deleted.as_str()) {
            self.selected = None;
            selection_cleared = true;
        }

        match self.refresh().await {
            Ok(outcome) => Ok(SyncOutcome {
                selection_cleared: selection_cleared || outcome.selection_cleared,
                refresh_error: None,
            }),
            Err(err) => {
                tracing::warn!("Store {} deleted but refresh failed: {}", deleted, err);
                Ok(SyncOutcome {
                    selection_cleared,
                    refresh_error: Some(err),
                })
            }
        }
    }
}
