//! Climate API client.
//!
//! One method per backend endpoint. Each builds its query from typed
//! parameters, issues a GET and decodes the declared JSON shape. Non-2xx
//! responses fail with `ApiError::Http` carrying the status text. There are
//! no retries and no caching here; see `query_cache` for the latter.

use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::errors::ApiError;
use crate::models::{
    BSplineCoefficient, BSplineEvaluation, CitiesResponse, City, HealthStatus, MetricRange,
    MetricSnapshot, RegionCollection, TimeSeriesResponse,
};

const API_PREFIX: [&str; 2] = ["api", "v1"];

/// Typed transport shim over the climate API.
#[derive(Debug, Clone)]
pub struct ClimateApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ClimateApiClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::Transport(format!("Invalid API base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport("API base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn api_endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let full: Vec<&str> = API_PREFIX.iter().chain(segments).copied().collect();
        self.endpoint(&full)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T, ApiError> {
        tracing::debug!("GET {} {:?}", url, query);

        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Failed to fetch {}: HTTP {}", what, status);
            return Err(ApiError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{}: {}", what, e)))
    }

    /// Fetch all regions, optionally simplified server-side.
    pub async fn get_regions(&self, tolerance: Option<f64>) -> Result<RegionCollection, ApiError> {
        let mut query = Vec::new();
        if let Some(t) = tolerance.filter(|t| *t > 0.0) {
            query.push(("tolerance", t.to_string()));
        }
        self.get_json(self.api_endpoint(&["regions"])?, &query, "regions")
            .await
    }

    /// Fetch the metric values of all regions for one (metric, year, week).
    pub async fn get_metric_snapshot(
        &self,
        metric: &str,
        year: i32,
        week: u32,
    ) -> Result<MetricSnapshot, ApiError> {
        let query = [
            ("metric", metric.to_string()),
            ("year", year.to_string()),
            ("week", week.to_string()),
        ];
        self.get_json(
            self.api_endpoint(&["metrics", "snapshot"])?,
            &query,
            "metric snapshot",
        )
        .await
    }

    /// Fetch the global min/max of a metric across all periods.
    pub async fn get_metric_range(&self, metric: &str) -> Result<MetricRange, ApiError> {
        let query = [("metric", metric.to_string())];
        self.get_json(
            self.api_endpoint(&["metrics", "range"])?,
            &query,
            "metric range",
        )
        .await
    }

    /// Fetch the time series of one or two metrics for a region.
    pub async fn get_time_series(
        &self,
        nuts_id: &str,
        metric1: &str,
        metric2: Option<&str>,
    ) -> Result<TimeSeriesResponse, ApiError> {
        let mut query = vec![("metric1", metric1.to_string())];
        if let Some(m2) = metric2 {
            query.push(("metric2", m2.to_string()));
        }
        self.get_json(
            self.api_endpoint(&["timeseries", nuts_id])?,
            &query,
            "time series",
        )
        .await
    }

    pub async fn get_coefficients(&self) -> Result<Vec<BSplineCoefficient>, ApiError> {
        self.get_json(self.api_endpoint(&["coefficients"])?, &[], "coefficients")
            .await
    }

    /// All URAU cities that have coefficients.
    pub async fn get_cities(&self) -> Result<Vec<City>, ApiError> {
        let envelope: CitiesResponse = self
            .get_json(
                self.api_endpoint(&["coefficients", "cities"])?,
                &[],
                "cities",
            )
            .await?;
        Ok(envelope.cities)
    }

    /// URAU cities located in a NUTS region.
    pub async fn get_cities_by_nuts(&self, nuts_id: &str) -> Result<Vec<City>, ApiError> {
        let envelope: CitiesResponse = self
            .get_json(
                self.api_endpoint(&["coefficients", "cities", "by-nuts", nuts_id])?,
                &[],
                "cities by region",
            )
            .await?;
        Ok(envelope.cities)
    }

    /// Evaluate the exposure-response curve for a city and age group.
    pub async fn evaluate_bspline(
        &self,
        urau_code: &str,
        agegroup: &str,
    ) -> Result<BSplineEvaluation, ApiError> {
        let query = [
            ("urau_code", urau_code.to_string()),
            ("agegroup", agegroup.to_string()),
        ];
        self.get_json(
            self.api_endpoint(&["bspline", "evaluate"])?,
            &query,
            "B-spline evaluation",
        )
        .await
    }

    pub async fn health_check(&self) -> Result<HealthStatus, ApiError> {
        self.get_json(self.endpoint(&["health-check"])?, &[], "health check")
            .await
    }
}
