//! Playback scheduler for the week-by-week map animation.
//!
//! Architecture:
//! - A background task ticks on a fixed interval (800 ms by default)
//! - While playing, each tick advances (year, week) by one week, but only
//!   if the snapshot for the current period has finished loading; otherwise
//!   the tick is counted as skipped so frames never tear
//! - After an advance, the next snapshot is requested right away so the
//!   following tick has something to wait on
//! - Playing past the last week of the last year wraps to the first period
//!   and stops
//! - State is in-memory (`Arc<RwLock<PlaybackState>>`) and exposed through
//!   the playback endpoints

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use utoipa::ToSchema;

use crate::metrics::DATE_RANGE;
use crate::services::queries::DashboardQueries;
use crate::services::selection::SelectionStore;

// ---------------------------------------------------------------------------
// Playback state (in-memory, shared via Arc<RwLock<>>)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlaybackState {
    pub playing: bool,
    pub interval_ms: u64,
    /// Ticks observed while playing.
    pub ticks: u64,
    pub frames_advanced: u64,
    /// Ticks that found the current snapshot still loading.
    pub skipped_ticks: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub last_advanced_at: Option<DateTime<Utc>>,
}

impl PlaybackState {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            playing: false,
            interval_ms,
            ticks: 0,
            frames_advanced: 0,
            skipped_ticks: 0,
            started_at: None,
            last_advanced_at: None,
        }
    }
}

pub type SharedPlaybackState = Arc<RwLock<PlaybackState>>;

// ---------------------------------------------------------------------------
// Stepping
// ---------------------------------------------------------------------------

/// The period after (year, week), and whether playback ran off the end of
/// the range (in which case the period is the first one).
pub fn next_period(year: i32, week: u32) -> (i32, u32, bool) {
    if week < DATE_RANGE.max_week {
        return (year, week + 1, false);
    }
    if year < DATE_RANGE.max_year {
        return (year + 1, DATE_RANGE.min_week, false);
    }
    (DATE_RANGE.min_year, DATE_RANGE.min_week, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing.
    Idle,
    /// Snapshot still loading; period unchanged.
    Skipped,
    Advanced { year: i32, week: u32 },
    /// Wrapped to the first period and stopped.
    Finished,
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Player {
    selection: Arc<SelectionStore>,
    queries: Arc<DashboardQueries>,
    state: SharedPlaybackState,
}

impl Player {
    pub fn new(
        selection: Arc<SelectionStore>,
        queries: Arc<DashboardQueries>,
        interval_ms: u64,
    ) -> Self {
        Self {
            selection,
            queries,
            state: Arc::new(RwLock::new(PlaybackState::new(interval_ms))),
        }
    }

    pub async fn state(&self) -> PlaybackState {
        self.state.read().await.clone()
    }

    pub async fn play(&self) -> PlaybackState {
        let mut s = self.state.write().await;
        if !s.playing {
            s.playing = true;
            s.started_at = Some(Utc::now());
            tracing::info!("Playback started");
        }
        s.clone()
    }

    pub async fn pause(&self) -> PlaybackState {
        let mut s = self.state.write().await;
        if s.playing {
            s.playing = false;
            tracing::info!(
                "Playback paused after {} frames ({} ticks skipped)",
                s.frames_advanced,
                s.skipped_ticks
            );
        }
        s.clone()
    }

    /// Run one scheduler tick.
    pub async fn tick(&self) -> TickOutcome {
        if !self.state.read().await.playing {
            return TickOutcome::Idle;
        }

        let current = self.selection.get().await;
        let metric = current.selected_metric;

        if self.queries.snapshot_is_fetching(&metric, current.selected_year, current.selected_week) {
            let mut s = self.state.write().await;
            s.ticks += 1;
            s.skipped_ticks += 1;
            tracing::debug!(
                "Playback: snapshot {} {}-W{:02} still loading, skipping tick",
                metric,
                current.selected_year,
                current.selected_week
            );
            return TickOutcome::Skipped;
        }

        let mut finished = false;
        let (year, week) = self.selection.set_period(|y, w| {
            let (y, w, done) = next_period(y, w);
            finished = done;
            (y, w)
        }).await;

        // Request the new frame now so the next tick can gate on it.
        let _ = self.queries.snapshot_status(&metric, year, week);

        let mut s = self.state.write().await;
        s.ticks += 1;
        s.frames_advanced += 1;
        s.last_advanced_at = Some(Utc::now());

        if finished {
            s.playing = false;
            tracing::info!("Playback reached the end of the range, wrapped to {}-W{:02}", year, week);
            return TickOutcome::Finished;
        }
        tracing::debug!("Playback: advanced to {}-W{:02}", year, week);
        TickOutcome::Advanced { year, week }
    }
}

/// Main scheduler loop. Runs forever.
pub async fn run_player(player: Player) {
    // tokio::time::interval panics on a zero period.
    let interval_ms = player.state.read().await.interval_ms.max(1);
    tracing::info!("Playback scheduler started ({}ms interval)", interval_ms);

    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        player.tick().await;
    }
}
