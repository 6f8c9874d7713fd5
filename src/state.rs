//! Shared application state for request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::nrf_cloud::NrfCloudClient;
use crate::store::LocationStore;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Contains the application configuration, the location store (which owns the
/// cached database handle) and the nRF Cloud API client.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn LocationStore>,
    pub nrf_cloud: NrfCloudClient,
}

impl AppState {
    /// Creates a new application state from the given configuration, store, and API client.
    pub fn new(config: AppConfig, store: Arc<dyn LocationStore>, nrf_cloud: NrfCloudClient) -> Self {
        Self {
            config: Arc::new(config),
            store,
            nrf_cloud,
        }
    }
}
