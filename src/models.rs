//! Wire types returned by the climate API.
//!
//! Field names follow the backend's JSON exactly; anything the dashboard
//! derives from them lives in the view modules under `services`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Region code length of a NUTS 0 (country) region.
pub const NUTS_COUNTRY_LEN: usize = 2;
/// Region code length of a NUTS 3 (fine-grained) region.
pub const NUTS_FINE_LEN: usize = 5;

/// GeoJSON feature collection of NUTS regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Region>,
}

/// A single NUTS region polygon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: RegionProperties,
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

impl Region {
    pub fn nuts_id(&self) -> &str {
        &self.properties.nuts_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionProperties {
    #[serde(rename = "NUTS_ID")]
    pub nuts_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Any other properties the backend attaches (passed through untouched).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Polygon or MultiPolygon geometry. Coordinates are passed through to the
/// map engine as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: serde_json::Value,
}

/// Metric values for one (metric, year, week), keyed by NUTS_ID. The
/// backend sends `null` for regions without a reading.
pub type MetricSnapshot = HashMap<String, Option<f64>>;

/// Global value range of a metric across all periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetricRange {
    pub metric: String,
    pub min_value: f64,
    pub max_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub year: i32,
    pub week: u32,
    pub metric1_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric2_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesResponse {
    pub nuts_id: String,
    pub metric1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric2: Option<String>,
    pub data: Vec<TimeSeriesPoint>,
}

/// Raw B-spline coefficients for one city and age group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BSplineCoefficient {
    pub urau_code: String,
    pub agegroup: String,
    pub b1: f64,
    pub b2: f64,
    pub b3: f64,
    pub b4: f64,
    pub b5: f64,
}

/// Knot temperatures at the 10th, 75th and 90th percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Knots {
    pub p10: f64,
    pub p75: f64,
    pub p90: f64,
}

/// Minimum mortality temperature. `relative_risk` is 1.0 by definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Mmt {
    pub temperature: f64,
    pub percentile: f64,
    pub relative_risk: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExtremeRr {
    pub rr_at_p01: Option<f64>,
    pub rr_at_p99: Option<f64>,
    pub temp_at_p01: f64,
    pub temp_at_p99: f64,
}

/// One sample of an exposure-response curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurvePoint {
    pub temperature: f64,
    pub percentile: f64,
    /// Relative risk at this temperature.
    pub value: f64,
}

/// Evaluated B-spline curve for one city and age group, ordered by
/// ascending temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSplineEvaluation {
    pub urau_code: String,
    pub agegroup: String,
    pub knots: Knots,
    pub mmt: Mmt,
    pub extreme_rr: ExtremeRr,
    pub data: Vec<CurvePoint>,
}

/// A URAU city with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct City {
    pub code: String,
    pub name: Option<String>,
}

/// Envelope used by both city listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CitiesResponse {
    pub cities: Vec<City>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}
