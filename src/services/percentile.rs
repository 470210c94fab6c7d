//! Nearest-percentile lookup and axis tick generation for exposure-response
//! curves.
//!
//! Ticks are placed at temperatures (the x data key is always temperature)
//! and labelled with percentiles when the chart is in percentile mode.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::CurvePoint;

/// Percentiles that get an axis tick and, in percentile mode, a reference line.
pub const KEY_PERCENTILES: [f64; 5] = [1.0, 25.0, 50.0, 75.0, 99.0];

/// How close (in °C) a tick must be to a sample to borrow its percentile label.
const TICK_MATCH_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    #[error("curve has no samples")]
    EmptyCurve,
}

/// Return the sample whose percentile is closest to `target`. On ties the
/// first such sample wins. Targets outside [0, 100] are allowed.
pub fn find_closest_percentile(samples: &[CurvePoint], target: f64) -> Result<&CurvePoint, CurveError> {
    let (first, rest) = samples.split_first().ok_or(CurveError::EmptyCurve)?;

    let mut closest = first;
    let mut min_diff = (first.percentile - target).abs();
    for point in rest {
        let diff = (point.percentile - target).abs();
        if diff < min_diff {
            min_diff = diff;
            closest = point;
        }
    }
    Ok(closest)
}

/// An x-axis tick at a key percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct PercentileTick {
    /// Percentile the tick was requested for
    pub target: f64,
    /// Temperature of the closest sample (tick position)
    pub temperature: f64,
    /// Actual percentile of that sample
    pub percentile: f64,
}

/// Ticks for `targets`, in the same order.
pub fn ticks_for(samples: &[CurvePoint], targets: &[f64]) -> Result<Vec<PercentileTick>, CurveError> {
    targets
        .iter()
        .map(|&target| {
            find_closest_percentile(samples, target).map(|p| PercentileTick {
                target,
                temperature: p.temperature,
                percentile: p.percentile,
            })
        })
        .collect()
}

/// Percentile label for a tick at `temperature`, e.g. `"25"`. Empty when
/// no tick sits at that temperature.
pub fn percentile_tick_label(ticks: &[PercentileTick], temperature: f64) -> String {
    ticks
        .iter()
        .find(|t| (t.temperature - temperature).abs() < TICK_MATCH_TOLERANCE)
        .map(|t| format!("{:.0}", t.percentile))
        .unwrap_or_default()
}

/// Tooltip label for a hovered temperature: `"50.0th %ile (12.30°C)"` in
/// percentile mode when a sample matches, otherwise `"12.30°C"`.
pub fn hover_label(samples: &[CurvePoint], temperature: f64, percentile_mode: bool) -> String {
    if percentile_mode {
        if let Some(p) = samples
            .iter()
            .find(|p| (p.temperature - temperature).abs() < TICK_MATCH_TOLERANCE)
        {
            return format!("{:.1}th %ile ({:.2}°C)", p.percentile, temperature);
        }
    }
    format!("{:.2}°C", temperature)
}
