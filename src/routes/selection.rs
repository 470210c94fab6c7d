//! Selection endpoints: read and change what the dashboard shows.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::metrics::{is_known_metric, DATE_RANGE};
use crate::services::selection::{Selection, Update};

/// Partial selection update. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SelectionUpdate {
    /// NUTS region to select
    pub selected_region: Option<String>,
    pub selected_metric: Option<String>,
    pub selected_year: Option<i32>,
    pub selected_week: Option<u32>,
    /// Move the year by this many years, clamped to the range. Applied
    /// after `selected_year`.
    pub year_step: Option<i32>,
    /// Move the week by this many weeks within the year, clamped to 1..=52.
    /// Applied after `selected_week`.
    pub week_step: Option<i32>,
}

pub(crate) fn validate_period(year: Option<i32>, week: Option<u32>) -> Result<(), AppError> {
    if let Some(y) = year {
        if !(DATE_RANGE.min_year..=DATE_RANGE.max_year).contains(&y) {
            return Err(AppError::BadRequest(format!(
                "Year must be between {} and {}",
                DATE_RANGE.min_year, DATE_RANGE.max_year
            )));
        }
    }
    if let Some(w) = week {
        if !(DATE_RANGE.min_week..=DATE_RANGE.max_week).contains(&w) {
            return Err(AppError::BadRequest(format!(
                "Week must be between {} and {}",
                DATE_RANGE.min_week, DATE_RANGE.max_week
            )));
        }
    }
    Ok(())
}

/// Get the current selection.
#[utoipa::path(
    get,
    path = "/api/v1/selection",
    tag = "Selection",
    responses(
        (status = 200, description = "Current selection", body = Selection),
    )
)]
pub async fn get_selection(State(state): State<AppState>) -> Json<Selection> {
    Json(state.selection.get().await)
}

/// Update the selection.
///
/// All fields are validated before any of them is applied.
#[utoipa::path(
    put,
    path = "/api/v1/selection",
    tag = "Selection",
    request_body = SelectionUpdate,
    responses(
        (status = 200, description = "Updated selection", body = Selection),
        (status = 400, description = "Unknown metric or period out of range", body = ErrorResponse),
    )
)]
pub async fn update_selection(
    State(state): State<AppState>,
    Json(update): Json<SelectionUpdate>,
) -> Result<Json<Selection>, AppError> {
    if let Some(metric) = &update.selected_metric {
        if !is_known_metric(metric) {
            return Err(AppError::BadRequest(format!("Unknown metric: {}", metric)));
        }
    }
    validate_period(update.selected_year, update.selected_week)?;

    let store = &state.selection;
    if let Some(region) = update.selected_region {
        store.set_region(Some(region)).await;
    }
    if let Some(metric) = update.selected_metric {
        store.set_metric(metric).await;
    }
    if let Some(year) = update.selected_year {
        store.set_year(year).await;
    }
    if let Some(week) = update.selected_week {
        store.set_week(week).await;
    }
    if let Some(step) = update.year_step {
        store
            .set_year(Update::with(move |y: i32| {
                y.saturating_add(step)
                    .clamp(DATE_RANGE.min_year, DATE_RANGE.max_year)
            }))
            .await;
    }
    if let Some(step) = update.week_step {
        store
            .set_week(Update::with(move |w: u32| {
                (i64::from(w) + i64::from(step))
                    .clamp(i64::from(DATE_RANGE.min_week), i64::from(DATE_RANGE.max_week)) as u32
            }))
            .await;
    }

    Ok(Json(store.get().await))
}

/// Clear the selected region (close the detail panel).
#[utoipa::path(
    delete,
    path = "/api/v1/selection/region",
    tag = "Selection",
    responses(
        (status = 200, description = "Selection without a region", body = Selection),
    )
)]
pub async fn reset_region(State(state): State<AppState>) -> Json<Selection> {
    state.selection.reset_selection().await;
    Json(state.selection.get().await)
}
