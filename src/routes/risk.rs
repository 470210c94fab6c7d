//! Exposure-response endpoints: relative-risk curves and the coefficient
//! browser.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::models::{BSplineCoefficient, BSplineEvaluation};
use crate::services::charts::{
    city_picker, is_age_group, relative_risk_chart, AxisMode, CityPicker, RelativeRiskChart,
    AGE_GROUPS, DEFAULT_AGE_GROUP,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct CurveQuery {
    /// URAU city code
    pub urau_code: String,
    /// Age group; ignored when comparing all groups
    pub agegroup: Option<String>,
    /// Overlay all five age groups
    #[serde(default)]
    pub compare_all: bool,
    /// Label the x axis with temperatures or percentiles
    #[serde(default)]
    #[param(inline)]
    pub axis: AxisMode,
    /// Temperature under the pointer, for the readout
    pub hover: Option<f64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CoefficientsQuery {
    /// Only this city
    pub urau_code: Option<String>,
}

/// Relative-risk chart for a city.
///
/// In compare mode the five age-group curves are fetched concurrently and
/// drawn in fixed colors.
#[utoipa::path(
    get,
    path = "/api/v1/risk/curve",
    tag = "Risk",
    params(CurveQuery),
    responses(
        (status = 200, description = "Relative-risk chart", body = RelativeRiskChart),
        (status = 400, description = "Unknown age group or missing city", body = ErrorResponse),
        (status = 502, description = "Error loading data", body = ErrorResponse),
    )
)]
pub async fn get_risk_curve(
    State(state): State<AppState>,
    Query(params): Query<CurveQuery>,
) -> Result<Json<RelativeRiskChart>, AppError> {
    if params.urau_code.trim().is_empty() {
        return Err(AppError::BadRequest("Select a city to view the B-spline curve.".to_string()));
    }
    let agegroup = params.agegroup.as_deref().unwrap_or(DEFAULT_AGE_GROUP);
    if !is_age_group(agegroup) {
        return Err(AppError::BadRequest(format!("Unknown age group: {}", agegroup)));
    }

    let curves = if params.compare_all {
        state.queries.curves(&params.urau_code, &AGE_GROUPS).await?
    } else {
        vec![state.queries.curve(&params.urau_code, agegroup).await?]
    };
    let refs: Vec<&BSplineEvaluation> = curves.iter().map(|c| c.as_ref()).collect();

    let chart = relative_risk_chart(&refs, params.compare_all, params.axis, params.hover)?;
    Ok(Json(chart))
}

/// Raw B-spline coefficients, optionally for one city.
#[utoipa::path(
    get,
    path = "/api/v1/risk/coefficients",
    tag = "Risk",
    params(CoefficientsQuery),
    responses(
        (status = 200, description = "Coefficients per city and age group", body = Vec<BSplineCoefficient>),
        (status = 404, description = "No coefficients for the city", body = ErrorResponse),
        (status = 502, description = "Error loading data", body = ErrorResponse),
    )
)]
pub async fn get_coefficients(
    State(state): State<AppState>,
    Query(params): Query<CoefficientsQuery>,
) -> Result<Json<Vec<BSplineCoefficient>>, AppError> {
    let all = state.queries.coefficients().await?;
    let Some(code) = params.urau_code else {
        return Ok(Json(all.to_vec()));
    };

    let filtered: Vec<BSplineCoefficient> = all.iter().filter(|c| c.urau_code == code).cloned().collect();
    if filtered.is_empty() {
        return Err(AppError::NotFound(format!("No coefficients for city {}", code)));
    }
    Ok(Json(filtered))
}

/// Every city with coefficients.
#[utoipa::path(
    get,
    path = "/api/v1/risk/cities",
    tag = "Risk",
    responses(
        (status = 200, description = "All cities", body = CityPicker),
        (status = 502, description = "Error loading data", body = ErrorResponse),
    )
)]
pub async fn get_all_cities(State(state): State<AppState>) -> Result<Json<CityPicker>, AppError> {
    let cities = state.queries.cities(None).await?;
    Ok(Json(city_picker(&cities, None)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn curve_body(agegroup: &str) -> serde_json::Value {
        let data: Vec<serde_json::Value> = (0..=20)
            .map(|i| {
                let t = -5.0 + 1.5 * i as f64;
                serde_json::json!({
                    "temperature": t,
                    "percentile": i as f64 * 5.0,
                    "value": 1.0 + 0.003 * (t - 17.5) * (t - 17.5)
                })
            })
            .collect();
        serde_json::json!({
            "urau_code": "AT001C",
            "agegroup": agegroup,
            "knots": { "p10": -2.0, "p75": 17.5, "p90": 21.0 },
            "mmt": { "temperature": 17.5, "percentile": 75.0, "relative_risk": 1.0 },
            "extreme_rr": { "rr_at_p01": 1.5, "rr_at_p99": 1.2, "temp_at_p01": -5.0, "temp_at_p99": 25.0 },
            "data": data
        })
    }

    fn curve_query(compare_all: bool, agegroup: Option<&str>) -> Query<CurveQuery> {
        Query(CurveQuery {
            urau_code: "AT001C".to_string(),
            agegroup: agegroup.map(str::to_string),
            compare_all,
            axis: AxisMode::Temperature,
            hover: None,
        })
    }

    #[tokio::test]
    async fn test_compare_all_issues_five_concurrent_fetches() {
        let server = MockServer::start().await;
        for group in AGE_GROUPS {
            Mock::given(method("GET"))
                .and(path("/api/v1/bspline/evaluate"))
                .and(query_param("agegroup", group))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(curve_body(group))
                        .set_delay(Duration::from_millis(150)),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let state = AppState::for_backend(&server.uri(), None);
        let started = tokio::time::Instant::now();
        let Json(chart) = get_risk_curve(State(state), curve_query(true, None)).await.unwrap();

        // Sequential fetches would take at least 5 × 150 ms.
        assert!(started.elapsed() < Duration::from_millis(600));
        let colors: Vec<&str> = chart.series.iter().map(|s| s.color.as_str()).collect();
        assert_eq!(colors, vec!["#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6"]);
    }

    #[tokio::test]
    async fn test_single_curve_defaults_to_youngest_group() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/bspline/evaluate"))
            .and(query_param("agegroup", "20-44"))
            .respond_with(ResponseTemplate::new(200).set_body_json(curve_body("20-44")))
            .expect(1)
            .mount(&server)
            .await;

        let state = AppState::for_backend(&server.uri(), None);
        let Json(chart) = get_risk_curve(State(state), curve_query(false, None)).await.unwrap();
        assert_eq!(chart.series.len(), 1);
        assert!((chart.mmt[0].sampled_relative_risk - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_unknown_age_group_rejected() {
        let state = AppState::for_backend("http://localhost:9", None);
        let result = get_risk_curve(State(state), curve_query(false, Some("0-19"))).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_coefficients_filtered_by_city() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/coefficients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "urau_code": "AT001C", "agegroup": "20-44", "b1": 0.1, "b2": 0.2, "b3": 0.3, "b4": 0.4, "b5": 0.5 },
                { "urau_code": "DE001C", "agegroup": "20-44", "b1": 0.1, "b2": 0.2, "b3": 0.3, "b4": 0.4, "b5": 0.5 }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let state = AppState::for_backend(&server.uri(), None);
        let Json(one) = get_coefficients(
            State(state.clone()),
            Query(CoefficientsQuery {
                urau_code: Some("DE001C".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(one.len(), 1);

        let missing = get_coefficients(
            State(state),
            Query(CoefficientsQuery {
                urau_code: Some("XX999C".to_string()),
            }),
        )
        .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
