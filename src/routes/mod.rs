use std::sync::Arc;

use tokio::sync::RwLock;

use crate::services::queries::DashboardQueries;
use crate::services::selection::SelectionStore;

pub mod health;
pub mod life_table;
pub mod map;
pub mod metrics;
pub mod playback;
pub mod regions;
pub mod risk;
pub mod selection;

/// Shared state for the view routes.
#[derive(Clone)]
pub struct AppState {
    pub queries: Arc<DashboardQueries>,
    pub selection: Arc<SelectionStore>,
    /// Region under the pointer, if any.
    pub hovered: Arc<RwLock<Option<String>>>,
    /// Map provider token; the map is unavailable without one.
    pub map_token: Option<String>,
}

#[cfg(test)]
impl AppState {
    pub(crate) fn for_backend(base_url: &str, map_token: Option<&str>) -> Self {
        use crate::services::climate_api::ClimateApiClient;

        Self {
            queries: Arc::new(DashboardQueries::new(ClimateApiClient::new(base_url))),
            selection: Arc::new(SelectionStore::new()),
            hovered: Arc::new(RwLock::new(None)),
            map_token: map_token.map(str::to_string),
        }
    }
}
