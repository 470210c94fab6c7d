//! Playback HTTP endpoints.
//!
//! GET /api/v1/playback returns the scheduler state; play and pause toggle
//! it. The scheduler itself runs in the background (see
//! `services::animation`).

use axum::extract::State;
use axum::Json;

use crate::services::animation::{PlaybackState, Player};

/// Get the current playback state.
///
/// Includes counters for advanced frames and for ticks skipped because the
/// current snapshot was still loading.
#[utoipa::path(
    get,
    path = "/api/v1/playback",
    tag = "Playback",
    responses(
        (status = 200, description = "Current playback state", body = PlaybackState),
    )
)]
pub async fn get_playback(State(player): State<Player>) -> Json<PlaybackState> {
    Json(player.state().await)
}

/// Start advancing the selected week.
#[utoipa::path(
    post,
    path = "/api/v1/playback/play",
    tag = "Playback",
    responses(
        (status = 200, description = "Playback state after starting", body = PlaybackState),
    )
)]
pub async fn play(State(player): State<Player>) -> Json<PlaybackState> {
    Json(player.play().await)
}

#[utoipa::path(
    post,
    path = "/api/v1/playback/pause",
    tag = "Playback",
    responses(
        (status = 200, description = "Playback state after pausing", body = PlaybackState),
    )
)]
pub async fn pause(State(player): State<Player>) -> Json<PlaybackState> {
    Json(player.pause().await)
}
