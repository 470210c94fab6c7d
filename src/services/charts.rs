//! Chart view models for the region detail panel: time series, scatter,
//! summary and the relative-risk curves.
//!
//! Everything here is a pure function of backend data plus the panel's
//! local toggles (axis mode, compare mode, hovered temperature).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::helpers::round_dp;
use crate::metrics::{format_metric_value, metric_config};
use crate::models::{BSplineEvaluation, City, CurvePoint, TimeSeriesResponse};
use crate::services::percentile::{
    hover_label, percentile_tick_label, ticks_for, CurveError, PercentileTick, KEY_PERCENTILES,
};

const SERIES_COLORS: [&str; 2] = ["#8884d8", "#82ca9d"];

pub const AGE_GROUPS: [&str; 5] = ["20-44", "45-64", "65-74", "75-84", "85+"];
pub const DEFAULT_AGE_GROUP: &str = "20-44";
const AGE_GROUP_COLORS: [&str; 5] = ["#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6"];

pub const RR_Y_DOMAIN: [f64; 2] = [0.5, 2.0];

const RR_LINE_COLOR: &str = "#6b7280";
const MMT_LINE_COLOR: &str = "#16a34a";
const PERCENTILE_LINE_COLOR: &str = "#d1d5db";

pub const NO_CITIES_MESSAGE: &str = "No URAU cities found for this region.";
pub const NEEDS_SECOND_METRIC_MESSAGE: &str = "Please select a second metric for scatter plot";

/// `2010-W07`
pub fn week_label(year: i32, week: u32) -> String {
    format!("{}-W{:02}", year, week)
}

// --- Time series ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AxisSide {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ChartSeries {
    pub metric: String,
    pub label: String,
    pub unit: String,
    pub color: String,
    pub axis: AxisSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TimeSeriesRow {
    pub date: String,
    pub metric1_value: f64,
    pub metric2_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TimeSeriesChart {
    pub series: Vec<ChartSeries>,
    pub rows: Vec<TimeSeriesRow>,
    /// True when the two metrics have different units.
    pub secondary_axis: bool,
}

fn series(metric: &str, color: &str, axis: AxisSide) -> ChartSeries {
    let config = metric_config(metric);
    ChartSeries {
        metric: metric.to_string(),
        label: config.label,
        unit: config.unit,
        color: color.to_string(),
        axis,
    }
}

pub fn time_series_chart(ts: &TimeSeriesResponse) -> TimeSeriesChart {
    let mut chart_series = vec![series(&ts.metric1, SERIES_COLORS[0], AxisSide::Left)];
    let mut secondary_axis = false;

    if let Some(metric2) = ts.metric2.as_deref() {
        secondary_axis = metric_config(metric2).unit != metric_config(&ts.metric1).unit;
        let side = if secondary_axis {
            AxisSide::Right
        } else {
            AxisSide::Left
        };
        chart_series.push(series(metric2, SERIES_COLORS[1], side));
    }

    let rows = ts
        .data
        .iter()
        .map(|p| TimeSeriesRow {
            date: week_label(p.year, p.week),
            metric1_value: p.metric1_value,
            metric2_value: ts.metric2.as_ref().and(p.metric2_value),
        })
        .collect();

    TimeSeriesChart {
        series: chart_series,
        rows,
        secondary_axis,
    }
}

// --- Scatter ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScatterPlot {
    Ready {
        x_metric: String,
        y_metric: String,
        points: Vec<ScatterPoint>,
    },
    NeedsSecondMetric {
        message: String,
    },
}

/// metric1 against metric2, skipping samples without a second value.
pub fn scatter_plot(ts: &TimeSeriesResponse) -> ScatterPlot {
    let Some(metric2) = ts.metric2.as_deref() else {
        return ScatterPlot::NeedsSecondMetric {
            message: NEEDS_SECOND_METRIC_MESSAGE.to_string(),
        };
    };

    let points = ts
        .data
        .iter()
        .filter_map(|p| {
            p.metric2_value.map(|y| ScatterPoint {
                x: p.metric1_value,
                y,
            })
        })
        .collect();

    ScatterPlot::Ready {
        x_metric: ts.metric1.clone(),
        y_metric: metric2.to_string(),
        points,
    }
}

// --- Summary ---

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MetricAverage {
    pub metric: String,
    pub label: String,
    pub average: Option<f64>,
    pub formatted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RegionSummary {
    pub nuts_id: String,
    pub point_count: usize,
    pub first_period: Option<String>,
    pub last_period: Option<String>,
    pub averages: Vec<MetricAverage>,
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn metric_average(metric: &str, avg: Option<f64>) -> MetricAverage {
    MetricAverage {
        metric: metric.to_string(),
        label: metric_config(metric).label,
        average: avg,
        formatted: avg.map(|v| format_metric_value(metric, v)),
    }
}

pub fn summary(ts: &TimeSeriesResponse) -> RegionSummary {
    let mut averages = vec![metric_average(
        &ts.metric1,
        average(ts.data.iter().map(|p| p.metric1_value)),
    )];
    if let Some(metric2) = ts.metric2.as_deref() {
        averages.push(metric_average(
            metric2,
            average(ts.data.iter().filter_map(|p| p.metric2_value)),
        ));
    }

    RegionSummary {
        nuts_id: ts.nuts_id.clone(),
        point_count: ts.data.len(),
        first_period: ts.data.first().map(|p| week_label(p.year, p.week)),
        last_period: ts.data.last().map(|p| week_label(p.year, p.week)),
        averages,
    }
}

// --- Cities ---

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CityPicker {
    pub cities: Vec<City>,
    /// Requested city if it is in the list, otherwise the first one.
    pub selected: Option<String>,
    pub message: Option<String>,
}

pub fn city_picker(cities: &[City], requested: Option<&str>) -> CityPicker {
    let selected = requested
        .filter(|code| cities.iter().any(|c| c.code == *code))
        .map(str::to_string)
        .or_else(|| cities.first().map(|c| c.code.clone()));

    CityPicker {
        cities: cities.to_vec(),
        selected,
        message: cities.is_empty().then(|| NO_CITIES_MESSAGE.to_string()),
    }
}

// --- Relative risk ---

pub fn is_age_group(group: &str) -> bool {
    AGE_GROUPS.contains(&group)
}

pub fn age_group_color(group: &str) -> &'static str {
    AGE_GROUPS
        .iter()
        .position(|g| *g == group)
        .map(|i| AGE_GROUP_COLORS[i])
        .unwrap_or(AGE_GROUP_COLORS[0])
}

/// What the x axis is labelled with. The data key is always temperature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AxisMode {
    #[default]
    Temperature,
    Percentile,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AxisTick {
    pub temperature: f64,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LineOrientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReferenceLine {
    pub orientation: LineOrientation,
    /// y for horizontal lines, temperature for vertical ones
    pub at: f64,
    pub stroke: String,
    pub dash: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RiskSeries {
    pub agegroup: String,
    pub name: String,
    pub color: String,
    pub points: Vec<CurvePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MmtInfo {
    pub agegroup: String,
    pub temperature: f64,
    pub percentile: f64,
    /// Curve value at the sample nearest the MMT; ≈ 1.0 for a
    /// well-formed curve.
    pub sampled_relative_risk: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ExtremeRrInfo {
    pub cold: f64,
    pub heat: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HoverReadout {
    pub label: String,
    pub relative_risk: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RelativeRiskChart {
    pub urau_code: String,
    pub compare_all: bool,
    pub axis: AxisMode,
    pub series: Vec<RiskSeries>,
    pub x_ticks: Vec<AxisTick>,
    pub y_domain: Vec<f64>,
    pub reference_lines: Vec<ReferenceLine>,
    pub mmt: Vec<MmtInfo>,
    /// Single-curve mode only, and only when both extremes are known.
    pub extreme_rr: Option<ExtremeRrInfo>,
    pub hover: Option<HoverReadout>,
}

/// Sample whose temperature is nearest `temperature`.
pub fn sample_near_temperature(samples: &[CurvePoint], temperature: f64) -> Result<&CurvePoint, CurveError> {
    let (first, rest) = samples.split_first().ok_or(CurveError::EmptyCurve)?;
    Ok(rest.iter().fold(first, |best, p| {
        if (p.temperature - temperature).abs() < (best.temperature - temperature).abs() {
            p
        } else {
            best
        }
    }))
}

fn mmt_info(curve: &BSplineEvaluation) -> Result<MmtInfo, CurveError> {
    let sampled = sample_near_temperature(&curve.data, curve.mmt.temperature)?;
    Ok(MmtInfo {
        agegroup: curve.agegroup.clone(),
        temperature: curve.mmt.temperature,
        percentile: curve.mmt.percentile,
        sampled_relative_risk: round_dp(sampled.value, 4),
        text: format!(
            "MMT: {:.2}°C ({:.1}th %ile)",
            curve.mmt.temperature, curve.mmt.percentile
        ),
    })
}

fn x_ticks(ticks: &[PercentileTick], axis: AxisMode) -> Vec<AxisTick> {
    ticks
        .iter()
        .map(|t| AxisTick {
            temperature: t.temperature,
            label: match axis {
                AxisMode::Temperature => format!("{:.1}", t.temperature),
                AxisMode::Percentile => percentile_tick_label(ticks, t.temperature),
            },
        })
        .collect()
}

fn hover_readout(samples: &[CurvePoint], temperature: f64, axis: AxisMode) -> Result<HoverReadout, CurveError> {
    let sample = sample_near_temperature(samples, temperature)?;
    Ok(HoverReadout {
        label: hover_label(samples, sample.temperature, axis == AxisMode::Percentile),
        relative_risk: format!("{:.3}", sample.value),
    })
}

/// Build the relative-risk chart from one curve, or from one curve per age
/// group when `compare_all` is set. Ticks come from the first curve.
pub fn relative_risk_chart(
    curves: &[&BSplineEvaluation],
    compare_all: bool,
    axis: AxisMode,
    hover_temperature: Option<f64>,
) -> Result<RelativeRiskChart, CurveError> {
    let first = curves.first().ok_or(CurveError::EmptyCurve)?;
    let ticks = ticks_for(&first.data, &KEY_PERCENTILES)?;

    let series = curves
        .iter()
        .map(|c| RiskSeries {
            agegroup: c.agegroup.clone(),
            name: if compare_all {
                format!("{} years", c.agegroup)
            } else {
                "Relative Risk".to_string()
            },
            color: age_group_color(&c.agegroup).to_string(),
            points: c.data.clone(),
        })
        .collect();

    let mut reference_lines = vec![ReferenceLine {
        orientation: LineOrientation::Horizontal,
        at: 1.0,
        stroke: RR_LINE_COLOR.to_string(),
        dash: "5 5".to_string(),
        label: Some("RR = 1".to_string()),
    }];
    if !compare_all {
        reference_lines.push(ReferenceLine {
            orientation: LineOrientation::Vertical,
            at: first.mmt.temperature,
            stroke: MMT_LINE_COLOR.to_string(),
            dash: "5 5".to_string(),
            label: Some(format!("MMT: {:.1}°C", first.mmt.temperature)),
        });
    }
    if axis == AxisMode::Percentile {
        reference_lines.extend(ticks.iter().map(|t| ReferenceLine {
            orientation: LineOrientation::Vertical,
            at: t.temperature,
            stroke: PERCENTILE_LINE_COLOR.to_string(),
            dash: "3 3".to_string(),
            label: None,
        }));
    }

    let mmt = curves
        .iter()
        .map(|c| mmt_info(c))
        .collect::<Result<Vec<_>, _>>()?;

    let extreme_rr = if compare_all {
        None
    } else {
        match (first.extreme_rr.rr_at_p01, first.extreme_rr.rr_at_p99) {
            (Some(cold), Some(heat)) => Some(ExtremeRrInfo {
                cold,
                heat,
                text: format!(
                    "Extreme RR: Cold (1st %ile): {:.2} • Heat (99th %ile): {:.2}",
                    cold, heat
                ),
            }),
            _ => None,
        }
    };

    let hover = hover_temperature
        .map(|t| hover_readout(&first.data, t, axis))
        .transpose()?;

    Ok(RelativeRiskChart {
        urau_code: first.urau_code.clone(),
        compare_all,
        axis,
        series,
        x_ticks: x_ticks(&ticks, axis),
        y_domain: RR_Y_DOMAIN.to_vec(),
        reference_lines,
        mmt,
        extreme_rr,
        hover,
    })
}
