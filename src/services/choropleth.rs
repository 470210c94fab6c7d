//! Choropleth layer: region colors, zoom cross-fade and legend.
//!
//! Country (NUTS 0) polygons are drawn when zoomed out and fine (NUTS 3)
//! polygons when zoomed in. Between `BLEND_START_ZOOM` and `BLEND_END_ZOOM`
//! the two levels cross-fade linearly instead of switching at a threshold.

use serde::Serialize;
use utoipa::ToSchema;

use crate::helpers::lerp;
use crate::metrics::{format_metric_value, metric_label};
use crate::models::{MetricRange, MetricSnapshot, Region, NUTS_COUNTRY_LEN, NUTS_FINE_LEN};

pub const BLEND_START_ZOOM: f64 = 4.5;
pub const BLEND_END_ZOOM: f64 = 5.5;

pub const BASE_OPACITY: f64 = 0.6;
pub const HOVER_OPACITY: f64 = 0.8;

const OUTLINE_COLOR: &str = "#ffffff";
const OUTLINE_WIDTH: f64 = 1.0;
const SELECTED_OUTLINE_WIDTH: f64 = 3.0;

pub const NO_DATA_COLOR: &str = "#1f2937";

/// Scale domain used when a metric has no range data.
pub const DEFAULT_SCALE_MIN: f64 = -20.0;
pub const DEFAULT_SCALE_MAX: f64 = 40.0;

/// Blue, cyan, yellow, red at 0, ⅓, ⅔ and 1 of the domain.
const STOP_COLORS: [[u8; 3]; 4] = [[0, 0, 255], [0, 255, 255], [255, 255, 0], [255, 0, 0]];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegionLevel {
    Country,
    Fine,
    /// NUTS 1/2 polygons; never drawn.
    Intermediate,
}

impl RegionLevel {
    pub fn of(nuts_id: &str) -> Self {
        match nuts_id.len() {
            NUTS_COUNTRY_LEN => RegionLevel::Country,
            NUTS_FINE_LEN => RegionLevel::Fine,
            _ => RegionLevel::Intermediate,
        }
    }
}

/// Visibility weight of a level at `zoom`, in [0, 1].
pub fn level_weight(level: RegionLevel, zoom: f64) -> f64 {
    let t = ((zoom - BLEND_START_ZOOM) / (BLEND_END_ZOOM - BLEND_START_ZOOM)).clamp(0.0, 1.0);
    match level {
        RegionLevel::Country => 1.0 - t,
        RegionLevel::Fine => t,
        RegionLevel::Intermediate => 0.0,
    }
}

/// Fill opacity of a region, bounded to [0, 1].
pub fn fill_opacity(level: RegionLevel, zoom: f64, hovered: bool) -> f64 {
    let nominal = if hovered { HOVER_OPACITY } else { BASE_OPACITY };
    (nominal * level_weight(level, zoom)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ColorStop {
    pub value: f64,
    pub color: String,
}

/// Linear four-stop color scale over a metric's domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    /// Scale over the metric's global range, or [-20, 40] without one.
    pub fn from_range(range: Option<&MetricRange>) -> Self {
        match range {
            Some(r) if r.min_value.is_finite() && r.max_value.is_finite() => Self {
                min: r.min_value,
                max: r.max_value,
            },
            _ => Self {
                min: DEFAULT_SCALE_MIN,
                max: DEFAULT_SCALE_MAX,
            },
        }
    }

    fn position(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }

    pub fn stops(&self) -> Vec<ColorStop> {
        let last = (STOP_COLORS.len() - 1) as f64;
        STOP_COLORS
            .iter()
            .enumerate()
            .map(|(i, rgb)| ColorStop {
                value: lerp(self.min, self.max, i as f64 / last),
                color: hex(*rgb),
            })
            .collect()
    }

    pub fn color_for(&self, value: f64) -> String {
        let last = STOP_COLORS.len() - 1;
        let scaled = self.position(value) * last as f64;
        let lower = (scaled.floor() as usize).min(last - 1);
        let t = scaled - lower as f64;
        let (a, b) = (STOP_COLORS[lower], STOP_COLORS[lower + 1]);
        hex([
            lerp(a[0] as f64, b[0] as f64, t).round() as u8,
            lerp(a[1] as f64, b[1] as f64, t).round() as u8,
            lerp(a[2] as f64, b[2] as f64, t).round() as u8,
        ])
    }
}

fn hex(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// A region's reading: a value from the snapshot, or explicitly none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FillValue {
    Value(f64),
    NoData,
}

impl FillValue {
    pub fn lookup(snapshot: &MetricSnapshot, nuts_id: &str) -> Self {
        match snapshot.get(nuts_id) {
            Some(Some(v)) => FillValue::Value(*v),
            _ => FillValue::NoData,
        }
    }
}

/// Render-ready region feature.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegionFeature {
    pub nuts_id: String,
    pub name: Option<String>,
    pub level: RegionLevel,
    pub value: FillValue,
    pub fill_color: String,
    pub fill_opacity: f64,
    pub outline_color: String,
    pub outline_width: f64,
    pub outline_opacity: f64,
    pub hovered: bool,
    pub selected: bool,
    /// GeoJSON geometry, passed through to the map engine
    #[schema(value_type = Object)]
    pub geometry: serde_json::Value,
}

/// Inputs that change per frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameState<'a> {
    pub zoom: f64,
    pub hovered: Option<&'a str>,
    pub selected: Option<&'a str>,
}

/// Merge regions with a snapshot and style them for the current zoom.
/// Regions invisible at this zoom are left out.
pub fn build_features(
    regions: &[Region],
    snapshot: &MetricSnapshot,
    scale: &ColorScale,
    frame: FrameState<'_>,
) -> Vec<RegionFeature> {
    regions
        .iter()
        .filter_map(|region| {
            let nuts_id = region.nuts_id();
            let level = RegionLevel::of(nuts_id);
            let weight = level_weight(level, frame.zoom);
            if weight <= 0.0 {
                return None;
            }

            let hovered = frame.hovered == Some(nuts_id);
            let selected = frame.selected == Some(nuts_id);
            let value = FillValue::lookup(snapshot, nuts_id);
            let fill_color = match value {
                FillValue::Value(v) => scale.color_for(v),
                FillValue::NoData => NO_DATA_COLOR.to_string(),
            };

            Some(RegionFeature {
                nuts_id: nuts_id.to_string(),
                name: region.properties.name.clone(),
                level,
                value,
                fill_color,
                fill_opacity: fill_opacity(level, frame.zoom, hovered),
                outline_color: OUTLINE_COLOR.to_string(),
                outline_width: if selected {
                    SELECTED_OUTLINE_WIDTH
                } else {
                    OUTLINE_WIDTH
                },
                outline_opacity: weight,
                hovered,
                selected,
                geometry: serde_json::to_value(&region.geometry).unwrap_or_default(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Legend {
    pub metric: String,
    pub label: String,
    pub min_label: String,
    pub max_label: String,
    pub stops: Vec<ColorStop>,
    pub no_data_color: String,
}

pub fn legend(metric: &str, scale: &ColorScale) -> Legend {
    Legend {
        metric: metric.to_string(),
        label: metric_label(metric),
        min_label: format_metric_value(metric, scale.min),
        max_label: format_metric_value(metric, scale.max),
        stops: scale.stops(),
        no_data_color: NO_DATA_COLOR.to_string(),
    }
}
