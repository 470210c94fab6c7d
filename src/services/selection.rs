//! Selection store: the single source of truth for what the dashboard shows.
//!
//! One instance is created at start-up and shared by reference with every
//! view and with the animation scheduler. State only changes through the
//! setters below.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::metrics::DEFAULT_METRIC;

/// Map center in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MapCenter {
    pub longitude: f64,
    pub latitude: f64,
}

/// Current dashboard selection.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Selection {
    /// Selected NUTS region, if any
    pub selected_region: Option<String>,
    pub selected_metric: String,
    pub selected_year: i32,
    pub selected_week: u32,
    pub zoom: f64,
    pub center: MapCenter,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            selected_region: None,
            selected_metric: DEFAULT_METRIC.to_string(),
            selected_year: 2010,
            selected_week: 26,
            zoom: 4.0,
            // Austria / central Europe
            center: MapCenter {
                longitude: 13.0,
                latitude: 47.5,
            },
        }
    }
}

/// New value for a field: either a literal or a function of the previous
/// value. Functions run under the store's write lock, so concurrent steps
/// never lose an update.
pub enum Update<T> {
    To(T),
    With(Box<dyn FnOnce(T) -> T + Send>),
}

impl<T> Update<T> {
    pub fn with(f: impl FnOnce(T) -> T + Send + 'static) -> Self {
        Update::With(Box::new(f))
    }

    fn apply(self, previous: T) -> T {
        match self {
            Update::To(v) => v,
            Update::With(f) => f(previous),
        }
    }
}

impl<T> From<T> for Update<T> {
    fn from(value: T) -> Self {
        Update::To(value)
    }
}

#[derive(Debug, Default)]
pub struct SelectionStore {
    state: RwLock<Selection>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current selection.
    pub async fn get(&self) -> Selection {
        self.state.read().await.clone()
    }

    pub async fn set_region(&self, nuts_id: Option<String>) {
        self.state.write().await.selected_region = nuts_id;
    }

    pub async fn set_metric(&self, metric: impl Into<String>) {
        self.state.write().await.selected_metric = metric.into();
    }

    /// Returns the new year.
    pub async fn set_year(&self, update: impl Into<Update<i32>>) -> i32 {
        let mut s = self.state.write().await;
        s.selected_year = update.into().apply(s.selected_year);
        s.selected_year
    }

    /// Returns the new week.
    pub async fn set_week(&self, update: impl Into<Update<u32>>) -> u32 {
        let mut s = self.state.write().await;
        s.selected_week = update.into().apply(s.selected_week);
        s.selected_week
    }

    /// Set year and week in one step.
    pub async fn set_period(&self, update: impl FnOnce(i32, u32) -> (i32, u32)) -> (i32, u32) {
        let mut s = self.state.write().await;
        let (year, week) = update(s.selected_year, s.selected_week);
        s.selected_year = year;
        s.selected_week = week;
        (year, week)
    }

    pub async fn set_map_view(&self, zoom: f64, center: MapCenter) {
        let mut s = self.state.write().await;
        s.zoom = zoom;
        s.center = center;
    }

    /// Clear the selected region (closing the detail panel).
    pub async fn reset_selection(&self) {
        self.state.write().await.selected_region = None;
    }
}
