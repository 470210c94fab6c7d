//! The dashboard's query layer: one cache per backend resource, each with
//! the staleness policy that resource needs.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::errors::ApiError;
use crate::models::{
    BSplineCoefficient, BSplineEvaluation, City, HealthStatus, MetricRange, MetricSnapshot,
    RegionCollection, TimeSeriesResponse,
};
use crate::services::climate_api::ClimateApiClient;
use crate::services::query_cache::{QueryCache, QueryStatus, Staleness};

/// Regions change rarely.
const REGIONS_STALE_AFTER: Duration = Duration::from_secs(60 * 60);
const SNAPSHOT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
const TIME_SERIES_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
const CURVES_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
const HEALTH_STALE_AFTER: Duration = Duration::from_secs(60);

/// Geometry detail requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryDetail {
    /// Full-size renderer.
    Standard,
    /// Small screens; coarser simplification.
    Compact,
}

impl GeometryDetail {
    pub fn tolerance(self) -> f64 {
        match self {
            GeometryDetail::Standard => 0.001,
            GeometryDetail::Compact => 0.01,
        }
    }
}

/// (metric, year, week)
pub type SnapshotKey = (String, i32, u32);
/// (nuts_id, metric1, metric2)
pub type TimeSeriesKey = (String, String, Option<String>);
/// (urau_code, agegroup)
pub type CurveKey = (String, String);

pub struct DashboardQueries {
    api: ClimateApiClient,
    regions: QueryCache<GeometryDetail, Arc<RegionCollection>>,
    snapshots: QueryCache<SnapshotKey, Arc<MetricSnapshot>>,
    ranges: QueryCache<String, MetricRange>,
    time_series: QueryCache<TimeSeriesKey, Arc<TimeSeriesResponse>>,
    /// Keyed by region; `None` lists every city.
    cities: QueryCache<Option<String>, Arc<Vec<City>>>,
    coefficients: QueryCache<(), Arc<Vec<BSplineCoefficient>>>,
    curves: QueryCache<CurveKey, Arc<BSplineEvaluation>>,
    health: QueryCache<(), HealthStatus>,
}

impl DashboardQueries {
    pub fn new(api: ClimateApiClient) -> Self {
        Self {
            api,
            regions: QueryCache::new("regions", Staleness::After(REGIONS_STALE_AFTER)),
            // Keep the last snapshot on screen while the next week loads so
            // playback does not flicker.
            snapshots: QueryCache::new("metric-snapshot", Staleness::After(SNAPSHOT_STALE_AFTER))
                .keep_previous(),
            ranges: QueryCache::new("metric-range", Staleness::Never),
            time_series: QueryCache::new("timeseries", Staleness::After(TIME_SERIES_STALE_AFTER)),
            cities: QueryCache::new("cities", Staleness::After(CURVES_STALE_AFTER)),
            coefficients: QueryCache::new("coefficients", Staleness::After(CURVES_STALE_AFTER)),
            curves: QueryCache::new("bspline", Staleness::After(CURVES_STALE_AFTER)),
            health: QueryCache::new("health-check", Staleness::After(HEALTH_STALE_AFTER)),
        }
    }

    pub fn regions_status(&self, detail: GeometryDetail) -> QueryStatus<Arc<RegionCollection>> {
        let api = self.api.clone();
        self.regions.status(detail, move || async move {
            api.get_regions(Some(detail.tolerance())).await.map(Arc::new)
        })
    }

    pub fn snapshot_status(&self, metric: &str, year: i32, week: u32) -> QueryStatus<Arc<MetricSnapshot>> {
        let api = self.api.clone();
        let m = metric.to_string();
        self.snapshots
            .status((metric.to_string(), year, week), move || async move {
                api.get_metric_snapshot(&m, year, week).await.map(Arc::new)
            })
    }

    /// Whether the snapshot for this selection is still loading.
    pub fn snapshot_is_fetching(&self, metric: &str, year: i32, week: u32) -> bool {
        self.snapshots
            .is_fetching(&(metric.to_string(), year, week))
    }

    pub fn range_status(&self, metric: &str) -> QueryStatus<MetricRange> {
        let api = self.api.clone();
        let m = metric.to_string();
        self.ranges
            .status(metric.to_string(), move || async move { api.get_metric_range(&m).await })
    }

    pub async fn time_series(
        &self,
        nuts_id: &str,
        metric1: &str,
        metric2: Option<&str>,
    ) -> Result<Arc<TimeSeriesResponse>, ApiError> {
        let key = (
            nuts_id.to_string(),
            metric1.to_string(),
            metric2.map(str::to_string),
        );
        let api = self.api.clone();
        let (n, m1, m2) = key.clone();
        self.time_series
            .fetch(key, move || async move {
                api.get_time_series(&n, &m1, m2.as_deref()).await.map(Arc::new)
            })
            .await
    }

    pub async fn cities(&self, nuts_id: Option<&str>) -> Result<Arc<Vec<City>>, ApiError> {
        let key = nuts_id.map(str::to_string);
        let api = self.api.clone();
        let region = key.clone();
        self.cities
            .fetch(key, move || async move {
                let cities = match region.as_deref() {
                    Some(id) => api.get_cities_by_nuts(id).await?,
                    None => api.get_cities().await?,
                };
                Ok(Arc::new(cities))
            })
            .await
    }

    pub async fn coefficients(&self) -> Result<Arc<Vec<BSplineCoefficient>>, ApiError> {
        let api = self.api.clone();
        self.coefficients
            .fetch((), move || async move { api.get_coefficients().await.map(Arc::new) })
            .await
    }

    pub async fn curve(&self, urau_code: &str, agegroup: &str) -> Result<Arc<BSplineEvaluation>, ApiError> {
        let key = (urau_code.to_string(), agegroup.to_string());
        let api = self.api.clone();
        let (code, group) = key.clone();
        self.curves
            .fetch(key, move || async move {
                api.evaluate_bspline(&code, &group).await.map(Arc::new)
            })
            .await
    }

    /// Fetch one curve per age group concurrently. Fails if any of them
    /// fails.
    pub async fn curves(
        &self,
        urau_code: &str,
        agegroups: &[&str],
    ) -> Result<Vec<Arc<BSplineEvaluation>>, ApiError> {
        join_all(agegroups.iter().map(|group| self.curve(urau_code, group)))
            .await
            .into_iter()
            .collect()
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let api = self.api.clone();
        self.health
            .fetch((), move || async move { api.health_check().await })
            .await
    }

    /// Whether `nuts_id` is a known region. `None` until some region
    /// geometry has loaded.
    pub fn region_known(&self, nuts_id: &str) -> Option<bool> {
        [GeometryDetail::Standard, GeometryDetail::Compact]
            .iter()
            .find_map(|detail| self.regions.peek(detail))
            .map(|regions| regions.features.iter().any(|r| r.nuts_id() == nuts_id))
    }

    /// Drop a failed snapshot so the next read requests it again.
    pub fn retry_snapshot(&self, metric: &str, year: i32, week: u32) -> bool {
        self.snapshots.forget_failure(&(metric.to_string(), year, week))
    }

    /// Drop a failed metric range. Ranges never go stale, so without this a
    /// single failure would pin the metric to the default scale.
    pub fn retry_range(&self, metric: &str) -> bool {
        self.ranges.forget_failure(&metric.to_string())
    }

    pub fn retry_regions(&self, detail: GeometryDetail) -> bool {
        self.regions.forget_failure(&detail)
    }

    /// Forget everything. Requests still in flight complete but are not
    /// cached.
    pub fn clear(&self) {
        self.regions.clear();
        self.snapshots.clear();
        self.ranges.clear();
        self.time_series.clear();
        self.cities.clear();
        self.coefficients.clear();
        self.curves.clear();
        self.health.clear();
        tracing::info!(
            "Cleared caches: {}",
            [
                self.regions.name(),
                self.snapshots.name(),
                self.ranges.name(),
                self.time_series.name(),
                self.cities.name(),
                self.coefficients.name(),
                self.curves.name(),
                self.health.name(),
            ]
            .join(", ")
        );
    }

    /// Requests in flight across all resources.
    pub fn in_flight(&self) -> usize {
        self.regions.in_flight()
            + self.snapshots.in_flight()
            + self.ranges.in_flight()
            + self.time_series.in_flight()
            + self.cities.in_flight()
            + self.coefficients.in_flight()
            + self.curves.in_flight()
            + self.health.in_flight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn curve_body(agegroup: &str) -> serde_json::Value {
        serde_json::json!({
            "urau_code": "AT001C",
            "agegroup": agegroup,
            "knots": { "p10": 0.4, "p75": 15.8, "p90": 19.9 },
            "mmt": { "temperature": 17.1, "percentile": 80.0, "relative_risk": 1.0 },
            "extreme_rr": { "rr_at_p01": 1.3, "rr_at_p99": 1.2, "temp_at_p01": -7.0, "temp_at_p99": 25.0 },
            "data": [{ "temperature": 17.1, "percentile": 80.0, "value": 1.0 }]
        })
    }

    #[tokio::test]
    async fn test_compare_mode_fetches_each_age_group_once() {
        let server = MockServer::start().await;
        for group in ["20-44", "45-64", "65-74", "75-84", "85+"] {
            Mock::given(method("GET"))
                .and(path("/api/v1/bspline/evaluate"))
                .and(query_param("agegroup", group))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(curve_body(group))
                        .set_delay(Duration::from_millis(20)),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let queries = DashboardQueries::new(ClimateApiClient::new(&server.uri()));
        let groups = ["20-44", "45-64", "65-74", "75-84", "85+"];
        let curves = queries.curves("AT001C", &groups).await.unwrap();
        assert_eq!(curves.len(), 5);
        for (curve, group) in curves.iter().zip(groups) {
            assert_eq!(curve.agegroup, group);
        }

        // Served from cache the second time; `expect(1)` is verified on drop.
        queries.curves("AT001C", &groups).await.unwrap();
    }

    #[tokio::test]
    async fn test_range_cached_forever() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/range"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metric": "pm10", "min_value": 2.0, "max_value": 80.0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let queries = DashboardQueries::new(ClimateApiClient::new(&server.uri()));
        assert!(queries.range_status("pm10").is_loading());
        while queries.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        let status = queries.range_status("pm10");
        assert_eq!(status.data().map(|r| r.max_value), Some(80.0));
    }

    #[tokio::test]
    async fn test_failed_snapshot_retried_only_on_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/snapshot"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let queries = DashboardQueries::new(ClimateApiClient::new(&server.uri()));
        let _ = queries.snapshot_status("pm10", 2010, 26);
        while queries.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(queries.snapshot_status("pm10", 2010, 26).error().is_some());
        // Still failed, no new request.
        assert!(queries.snapshot_status("pm10", 2010, 26).error().is_some());

        assert!(queries.retry_snapshot("pm10", 2010, 26));
        assert!(queries.snapshot_status("pm10", 2010, 26).is_loading());
        while queries.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn test_failed_range_retried_on_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/range"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/range"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metric": "pm10", "min_value": 0.0, "max_value": 90.0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let queries = DashboardQueries::new(ClimateApiClient::new(&server.uri()));
        let _ = queries.range_status("pm10");
        while queries.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(queries.range_status("pm10").error().is_some());

        assert!(queries.retry_range("pm10"));
        let _ = queries.range_status("pm10");
        while queries.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(queries.range_status("pm10").data().map(|r| r.max_value), Some(90.0));
        // A settled range is not dropped by a retry.
        assert!(!queries.retry_range("pm10"));
    }

    #[tokio::test]
    async fn test_region_known_after_regions_load() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/regions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": { "NUTS_ID": "AT130" },
                    "geometry": { "type": "Polygon", "coordinates": [] }
                }]
            })))
            .mount(&server)
            .await;

        let queries = DashboardQueries::new(ClimateApiClient::new(&server.uri()));
        assert_eq!(queries.region_known("AT130"), None);
        let _ = queries.regions_status(GeometryDetail::Standard);
        while queries.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(queries.region_known("AT130"), Some(true));
        assert_eq!(queries.region_known("XX999"), Some(false));

        queries.clear();
        assert_eq!(queries.region_known("AT130"), None);
    }

    #[tokio::test]
    async fn test_snapshot_in_flight_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/metrics/snapshot"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "AT": 1.0 }))
                    .set_delay(Duration::from_millis(30)),
            )
            .mount(&server)
            .await;

        let queries = DashboardQueries::new(ClimateApiClient::new(&server.uri()));
        let _ = queries.snapshot_status("pm10", 2010, 26);
        assert!(queries.snapshot_is_fetching("pm10", 2010, 26));
        assert!(!queries.snapshot_is_fetching("pm10", 2010, 27));
        while queries.snapshot_is_fetching("pm10", 2010, 26) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(matches!(queries.snapshot_status("pm10", 2010, 26), QueryStatus::Ready(_)));
    }
}
