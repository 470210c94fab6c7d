//! Map endpoints: the choropleth view and the interactions that drive it.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::models::MetricSnapshot;
use crate::services::charts::week_label;
use crate::services::choropleth::{build_features, legend, ColorScale, FrameState, Legend, RegionFeature};
use crate::services::queries::GeometryDetail;
use crate::services::query_cache::QueryStatus;
use crate::services::selection::{MapCenter, Selection};

pub const MAP_TOKEN_MISSING: &str = "Map token not configured";

const MIN_ZOOM: f64 = 0.0;
const MAX_ZOOM: f64 = 22.0;

#[derive(Debug, Deserialize, IntoParams)]
pub struct MapQuery {
    /// Coarser geometry for small screens
    #[serde(default)]
    pub compact: bool,
    /// Re-request whatever failed to load: geometry, snapshot or range
    #[serde(default)]
    pub retry: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MapView {
    /// No map token: the rest of the dashboard still works.
    Unavailable { message: String },
    Ready { map: ChoroplethView },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChoroplethView {
    pub metric: String,
    pub year: i32,
    pub week: u32,
    pub period_label: String,
    pub zoom: f64,
    pub center: MapCenter,
    pub legend: Legend,
    pub features: Vec<RegionFeature>,
    /// Region geometry or the snapshot is still loading. Features may show
    /// the previous frame meanwhile.
    pub loading: bool,
    /// Snapshot failed; regions are shown as "no data".
    pub error: Option<String>,
    /// Metric range failed; the legend shows the default scale.
    pub scale_error: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MapViewUpdate {
    pub zoom: f64,
    pub center: MapCenter,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegionPointer {
    /// Region under the pointer; `null` when the pointer left all regions
    pub nuts_id: Option<String>,
}

/// Get the choropleth for the current selection.
///
/// Never waits on the climate API: whatever is cached is rendered and
/// missing pieces are requested in the background.
#[utoipa::path(
    get,
    path = "/api/v1/map",
    tag = "Map",
    params(MapQuery),
    responses(
        (status = 200, description = "Choropleth view, or unavailable without a map token", body = MapView),
        (status = 502, description = "Region geometry could not be loaded", body = ErrorResponse),
    )
)]
pub async fn get_map(
    State(state): State<AppState>,
    Query(params): Query<MapQuery>,
) -> Result<Json<MapView>, AppError> {
    if state.map_token.is_none() {
        return Ok(Json(MapView::Unavailable {
            message: MAP_TOKEN_MISSING.to_string(),
        }));
    }

    let sel = state.selection.get().await;
    let hovered = state.hovered.read().await.clone();
    let queries = &state.queries;

    let detail = if params.compact {
        GeometryDetail::Compact
    } else {
        GeometryDetail::Standard
    };
    if params.retry {
        queries.retry_regions(detail);
        queries.retry_snapshot(&sel.selected_metric, sel.selected_year, sel.selected_week);
        queries.retry_range(&sel.selected_metric);
    }

    let regions = queries.regions_status(detail);
    if let Some(e) = regions.error() {
        return Err(e.clone().into());
    }
    let snapshot = queries.snapshot_status(&sel.selected_metric, sel.selected_year, sel.selected_week);
    let range = queries.range_status(&sel.selected_metric);

    let scale = ColorScale::from_range(range.data());
    let empty = MetricSnapshot::new();
    let values = snapshot.data().map(|s| &**s).unwrap_or(&empty);

    let features = match regions.data() {
        Some(collection) => build_features(
            &collection.features,
            values,
            &scale,
            FrameState {
                zoom: sel.zoom,
                hovered: hovered.as_deref(),
                selected: sel.selected_region.as_deref(),
            },
        ),
        None => Vec::new(),
    };

    let error = match &snapshot {
        QueryStatus::Failed(e) => {
            tracing::warn!(
                "Snapshot {} {} failed: {}",
                sel.selected_metric,
                week_label(sel.selected_year, sel.selected_week),
                e
            );
            Some(format!("Error loading data: {}", e))
        }
        _ => None,
    };
    let scale_error = range.error().map(|e| {
        tracing::warn!("Range for {} failed, using default scale: {}", sel.selected_metric, e);
        format!("Error loading data: {}", e)
    });

    Ok(Json(MapView::Ready {
        map: ChoroplethView {
            legend: legend(&sel.selected_metric, &scale),
            period_label: week_label(sel.selected_year, sel.selected_week),
            metric: sel.selected_metric,
            year: sel.selected_year,
            week: sel.selected_week,
            zoom: sel.zoom,
            center: sel.center,
            features,
            loading: regions.is_loading() || snapshot.is_loading(),
            error,
            scale_error,
        },
    }))
}

/// Record the map camera after a pan or zoom.
#[utoipa::path(
    put,
    path = "/api/v1/map/view",
    tag = "Map",
    request_body = MapViewUpdate,
    responses(
        (status = 200, description = "Updated selection", body = Selection),
        (status = 400, description = "Zoom or center out of range", body = ErrorResponse),
    )
)]
pub async fn update_map_view(
    State(state): State<AppState>,
    Json(view): Json<MapViewUpdate>,
) -> Result<Json<Selection>, AppError> {
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&view.zoom) {
        return Err(AppError::BadRequest(format!(
            "Zoom must be between {} and {}",
            MIN_ZOOM, MAX_ZOOM
        )));
    }
    let MapCenter { longitude, latitude } = view.center;
    if !(-180.0..=180.0).contains(&longitude) || !(-90.0..=90.0).contains(&latitude) {
        return Err(AppError::BadRequest("Center out of range".to_string()));
    }

    state.selection.set_map_view(view.zoom, view.center).await;
    Ok(Json(state.selection.get().await))
}

/// Click on the map: select the region under the pointer, or clear the
/// selection when clicking outside all regions.
#[utoipa::path(
    post,
    path = "/api/v1/map/click",
    tag = "Map",
    request_body = RegionPointer,
    responses(
        (status = 200, description = "Updated selection", body = Selection),
    )
)]
pub async fn click_region(
    State(state): State<AppState>,
    Json(pointer): Json<RegionPointer>,
) -> Json<Selection> {
    state.selection.set_region(pointer.nuts_id).await;
    Json(state.selection.get().await)
}

/// Pointer moved over (or off) a region.
#[utoipa::path(
    post,
    path = "/api/v1/map/hover",
    tag = "Map",
    request_body = RegionPointer,
    responses(
        (status = 204, description = "Hover state updated"),
    )
)]
pub async fn hover_region(State(state): State<AppState>, Json(pointer): Json<RegionPointer>) -> StatusCode {
    *state.hovered.write().await = pointer.nuts_id;
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::choropleth::FillValue;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_backend(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v1/regions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "properties": { "NUTS_ID": "AT" },
                      "geometry": { "type": "Polygon", "coordinates": [] } },
                    { "type": "Feature", "properties": { "NUTS_ID": "DE" },
                      "geometry": { "type": "Polygon", "coordinates": [] } }
                ]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/snapshot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "AT": 21.5 })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/range"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
    }

    async fn settle(state: &AppState) {
        while state.queries.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    fn query() -> Query<MapQuery> {
        Query(MapQuery {
            compact: false,
            retry: false,
        })
    }

    #[tokio::test]
    async fn test_map_unavailable_without_token() {
        let state = AppState::for_backend("http://localhost:9", None);
        let Json(view) = get_map(State(state), query()).await.unwrap();
        match view {
            MapView::Unavailable { message } => assert_eq!(message, MAP_TOKEN_MISSING),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_map_renders_no_data_and_default_scale() {
        let server = MockServer::start().await;
        mount_backend(&server).await;
        let state = AppState::for_backend(&server.uri(), Some("pk.test"));

        let Json(first) = get_map(State(state.clone()), query()).await.unwrap();
        match first {
            MapView::Ready { map } => assert!(map.loading),
            other => panic!("unexpected {:?}", other),
        }
        settle(&state).await;

        let Json(view) = get_map(State(state), query()).await.unwrap();
        let MapView::Ready { map: view } = view else {
            panic!("map should be ready");
        };
        assert!(!view.loading);
        assert_eq!(view.period_label, "2010-W26");
        assert_eq!(view.legend.min_label, "-20.0°C");
        assert_eq!(view.features.len(), 2);
        assert_eq!(view.features[1].fill_color, "#1f2937");
    }

    fn ready(view: MapView) -> ChoroplethView {
        match view {
            MapView::Ready { map } => map,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_null_snapshot_value_is_no_data_for_that_region_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/regions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "properties": { "NUTS_ID": "AT" },
                      "geometry": { "type": "Polygon", "coordinates": [] } },
                    { "type": "Feature", "properties": { "NUTS_ID": "DE" },
                      "geometry": { "type": "Polygon", "coordinates": [] } }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/snapshot"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "AT": 21.5, "DE": null })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/range"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metric": "temp_era5_q50", "min_value": -20.0, "max_value": 40.0
            })))
            .mount(&server)
            .await;
        let state = AppState::for_backend(&server.uri(), Some("pk.test"));

        let _ = get_map(State(state.clone()), query()).await.unwrap();
        settle(&state).await;

        let Json(view) = get_map(State(state), query()).await.unwrap();
        let map = ready(view);
        assert_eq!(map.error, None);
        let values: Vec<(&str, FillValue)> = map.features.iter().map(|f| (f.nuts_id.as_str(), f.value)).collect();
        assert_eq!(values, vec![("AT", FillValue::Value(21.5)), ("DE", FillValue::NoData)]);
    }

    #[tokio::test]
    async fn test_failed_range_reported_and_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/regions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "FeatureCollection",
                "features": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/snapshot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/range"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/range"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metric": "temp_era5_q50", "min_value": -5.0, "max_value": 30.0
            })))
            .mount(&server)
            .await;
        let state = AppState::for_backend(&server.uri(), Some("pk.test"));

        let _ = get_map(State(state.clone()), query()).await.unwrap();
        settle(&state).await;

        let Json(view) = get_map(State(state.clone()), query()).await.unwrap();
        let map = ready(view);
        assert_eq!(map.legend.min_label, "-20.0°C");
        assert!(map.scale_error.is_some());

        let retry = || {
            Query(MapQuery {
                compact: false,
                retry: true,
            })
        };
        let _ = get_map(State(state.clone()), retry()).await.unwrap();
        settle(&state).await;

        let Json(view) = get_map(State(state), retry()).await.unwrap();
        let map = ready(view);
        assert_eq!(map.scale_error, None);
        assert_eq!(map.legend.min_label, "-5.0°C");
        assert_eq!(map.legend.max_label, "30.0°C");
    }

    #[tokio::test]
    async fn test_click_and_hover() {
        let state = AppState::for_backend("http://localhost:9", Some("pk.test"));
        let pointer = RegionPointer {
            nuts_id: Some("AT130".to_string()),
        };
        let Json(sel) = click_region(State(state.clone()), Json(pointer)).await;
        assert_eq!(sel.selected_region.as_deref(), Some("AT130"));

        let status = hover_region(
            State(state.clone()),
            Json(RegionPointer {
                nuts_id: Some("AT".to_string()),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.hovered.read().await.as_deref(), Some("AT"));

        let Json(sel) = click_region(State(state), Json(RegionPointer { nuts_id: None })).await;
        assert_eq!(sel.selected_region, None);
    }

    #[tokio::test]
    async fn test_map_view_validation() {
        let state = AppState::for_backend("http://localhost:9", Some("pk.test"));
        let bad = MapViewUpdate {
            zoom: 30.0,
            center: MapCenter {
                longitude: 0.0,
                latitude: 0.0,
            },
        };
        assert!(update_map_view(State(state.clone()), Json(bad)).await.is_err());

        let good = MapViewUpdate {
            zoom: 5.0,
            center: MapCenter {
                longitude: 16.4,
                latitude: 48.2,
            },
        };
        let Json(sel) = update_map_view(State(state), Json(good)).await.unwrap();
        assert_eq!(sel.zoom, 5.0);
    }
}
