use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::metrics::is_known_metric;
use crate::services::charts::{
    city_picker, scatter_plot, summary, time_series_chart, CityPicker, RegionSummary, ScatterPlot,
    TimeSeriesChart,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct DetailQuery {
    /// Second metric to compare against the selected one
    pub metric2: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CitiesQuery {
    /// City to keep selected if it is in the region
    pub city: Option<String>,
}

/// Region detail panel: time series, scatter and summary tabs.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegionDetail {
    pub nuts_id: String,
    pub metric1: String,
    pub metric2: Option<String>,
    pub time_series: TimeSeriesChart,
    pub scatter: ScatterPlot,
    pub summary: RegionSummary,
}

fn check_region(state: &AppState, nuts_id: &str) -> Result<(), AppError> {
    match state.queries.region_known(nuts_id) {
        Some(false) => Err(AppError::NotFound(format!("Region {} not found", nuts_id))),
        _ => Ok(()),
    }
}

/// Get the detail panel for a region, charting the selected metric.
#[utoipa::path(
    get,
    path = "/api/v1/regions/{nuts_id}/detail",
    tag = "Regions",
    params(
        ("nuts_id" = String, Path, description = "NUTS region code"),
        DetailQuery,
    ),
    responses(
        (status = 200, description = "Charts for the region", body = RegionDetail),
        (status = 400, description = "Unknown second metric", body = ErrorResponse),
        (status = 404, description = "Region not in the loaded geometry", body = ErrorResponse),
        (status = 502, description = "Error loading data", body = ErrorResponse),
    )
)]
pub async fn get_region_detail(
    State(state): State<AppState>,
    Path(nuts_id): Path<String>,
    Query(params): Query<DetailQuery>,
) -> Result<Json<RegionDetail>, AppError> {
    check_region(&state, &nuts_id)?;
    let metric2 = params.metric2.filter(|m| !m.is_empty());
    if let Some(m) = &metric2 {
        if !is_known_metric(m) {
            return Err(AppError::BadRequest(format!("Unknown metric: {}", m)));
        }
    }

    let metric1 = state.selection.get().await.selected_metric;
    let ts = state
        .queries
        .time_series(&nuts_id, &metric1, metric2.as_deref())
        .await?;

    Ok(Json(RegionDetail {
        nuts_id,
        metric1,
        metric2,
        time_series: time_series_chart(&ts),
        scatter: scatter_plot(&ts),
        summary: summary(&ts),
    }))
}

/// List the URAU cities in a region for the relative-risk tab.
#[utoipa::path(
    get,
    path = "/api/v1/regions/{nuts_id}/cities",
    tag = "Regions",
    params(
        ("nuts_id" = String, Path, description = "NUTS region code"),
        CitiesQuery,
    ),
    responses(
        (status = 200, description = "Cities with the default selection", body = CityPicker),
        (status = 404, description = "Region not in the loaded geometry", body = ErrorResponse),
        (status = 502, description = "Error loading data", body = ErrorResponse),
    )
)]
pub async fn get_region_cities(
    State(state): State<AppState>,
    Path(nuts_id): Path<String>,
    Query(params): Query<CitiesQuery>,
) -> Result<Json<CityPicker>, AppError> {
    check_region(&state, &nuts_id)?;
    let cities = state.queries.cities(Some(&nuts_id)).await?;
    Ok(Json(city_picker(&cities, params.city.as_deref())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_detail_uses_selected_metric() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/timeseries/AT130"))
            .and(query_param("metric1", "temp_era5_q50"))
            .and(query_param("metric2", "pm10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nuts_id": "AT130",
                "metric1": "temp_era5_q50",
                "metric2": "pm10",
                "data": [
                    { "year": 2010, "week": 1, "metric1_value": 1.5, "metric2_value": 20.0 },
                    { "year": 2010, "week": 2, "metric1_value": 2.5, "metric2_value": 24.0 }
                ]
            })))
            .mount(&server)
            .await;

        let state = AppState::for_backend(&server.uri(), None);
        let Json(detail) = get_region_detail(
            State(state),
            Path("AT130".to_string()),
            Query(DetailQuery {
                metric2: Some("pm10".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(detail.metric1, "temp_era5_q50");
        assert!(detail.time_series.secondary_axis);
        assert_eq!(detail.summary.point_count, 2);
        assert!(matches!(detail.scatter, ScatterPlot::Ready { .. }));
    }

    #[tokio::test]
    async fn test_detail_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/timeseries/AT130"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let state = AppState::for_backend(&server.uri(), None);
        let result = get_region_detail(
            State(state),
            Path("AT130".to_string()),
            Query(DetailQuery { metric2: None }),
        )
        .await;
        match result {
            Err(AppError::ExternalServiceError(msg)) => assert!(msg.starts_with("Error loading data")),
            other => panic!("unexpected {:?}", other.map(|j| j.0.nuts_id)),
        }
    }

    #[tokio::test]
    async fn test_empty_city_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/coefficients/cities/by-nuts/AT130"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "cities": [] })))
            .mount(&server)
            .await;

        let state = AppState::for_backend(&server.uri(), None);
        let Json(picker) = get_region_cities(
            State(state),
            Path("AT130".to_string()),
            Query(CitiesQuery { city: None }),
        )
        .await
        .unwrap();
        assert!(picker.cities.is_empty());
        assert_eq!(picker.message.as_deref(), Some("No URAU cities found for this region."));
    }
}
