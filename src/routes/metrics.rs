use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::metrics::{metric_config, DateRange, MetricConfig, CLIMATE_METRICS, DATE_RANGE, DEFAULT_METRIC};

/// Options for the metric selector and the period slider.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetricCatalogue {
    pub metrics: Vec<MetricConfig>,
    pub default_metric: String,
    pub date_range: DateRange,
}

/// List the selectable metrics and the period range.
#[utoipa::path(
    get,
    path = "/api/v1/metrics",
    tag = "Metrics",
    responses(
        (status = 200, description = "Metric catalogue", body = MetricCatalogue),
    )
)]
pub async fn list_metrics() -> Json<MetricCatalogue> {
    Json(MetricCatalogue {
        metrics: CLIMATE_METRICS.iter().map(|id| metric_config(id)).collect(),
        default_metric: DEFAULT_METRIC.to_string(),
        date_range: DATE_RANGE,
    })
}
