//! Metric catalogue: identifiers, display labels, units and formatting.

use serde::Serialize;
use utoipa::ToSchema;

/// Metrics offered in the metric selector.
pub const CLIMATE_METRICS: [&str; 8] = [
    "temp_era5_q50",
    "temp_rcp45",
    "temp_rcp85",
    "mortality_rate",
    "pm10",
    "O3",
    "NOx",
    "population_density",
];

pub const DEFAULT_METRIC: &str = "temp_era5_q50";

/// Selectable period range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DateRange {
    pub min_year: i32,
    pub max_year: i32,
    pub min_week: u32,
    pub max_week: u32,
}

pub const DATE_RANGE: DateRange = DateRange {
    min_year: 1990,
    max_year: 2100,
    min_week: 1,
    max_week: 52,
};

/// Display configuration of a metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MetricConfig {
    pub id: String,
    pub unit: String,
    pub label: String,
    pub decimals: usize,
}

fn known(id: &str) -> Option<(&'static str, &'static str, usize)> {
    let entry = match id {
        "temp_era5_q50" => ("°C", "Mean Temperature (ERA5)", 1),
        "temp_rcp45" => ("°C", "Temperature - RCP 4.5 (Moderate Emissions)", 1),
        "temp_rcp85" => ("°C", "Temperature - RCP 8.5 (High Emissions)", 1),
        "mortality_rate" => (" per 100k", "Mortality Rate", 1),
        "pm10" => (" µg/m³", "Particulate Matter (PM10)", 1),
        "O3" => (" µg/m³", "Ozone (O₃)", 1),
        "NOx" => (" µg/m³", "Nitrogen Oxides (NOx)", 1),
        "population_density" => (" per km²", "Population Density", 0),
        _ => return None,
    };
    Some(entry)
}

/// Look up a metric's display configuration. Unknown metrics get a
/// title-cased label, no unit and two decimals.
pub fn metric_config(id: &str) -> MetricConfig {
    match known(id) {
        Some((unit, label, decimals)) => MetricConfig {
            id: id.to_string(),
            unit: unit.to_string(),
            label: label.to_string(),
            decimals,
        },
        None => MetricConfig {
            id: id.to_string(),
            unit: String::new(),
            label: title_case(id),
            decimals: 2,
        },
    }
}

pub fn is_known_metric(id: &str) -> bool {
    known(id).is_some()
}

pub fn metric_label(id: &str) -> String {
    metric_config(id).label
}

/// Format a value with the metric's decimals and unit, e.g. `12.3°C`.
pub fn format_metric_value(id: &str, value: f64) -> String {
    let config = metric_config(id);
    format!("{:.*}{}", config.decimals, value, config.unit)
}

/// `mortality_rate` → `Mortality Rate`.
fn title_case(id: &str) -> String {
    id.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
