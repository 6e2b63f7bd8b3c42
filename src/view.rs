//! Presentation adapter.
//!
//! Maps a [`SchedulerState`] and the latest [`FetchResult`] onto what the
//! screen shows.  Pure: nothing here mutates scheduler state.

use std::fmt;

use chrono::Local;

use crate::scheduler::SchedulerState;
use crate::source::{Citation, FetchError, FetchResult, TrendItem};

/// Headline status, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Cooldown(u32),
    Syncing,
    Live,
    Manual,
    KeyRequired,
    Offline,
}

impl StatusLabel {
    pub fn from_state(state: &SchedulerState) -> Self {
        if state.quota_blocked {
            StatusLabel::Cooldown(state.cooldown_seconds_remaining)
        } else if state.loading {
            StatusLabel::Syncing
        } else if state.active && state.live_mode {
            StatusLabel::Live
        } else if state.active {
            StatusLabel::Manual
        } else if matches!(state.last_error, Some(FetchError::AuthMissing)) {
            StatusLabel::KeyRequired
        } else {
            StatusLabel::Offline
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLabel::Cooldown(secs) => write!(f, "COOLDOWN {secs}s"),
            StatusLabel::Syncing => f.write_str("SYNCING"),
            StatusLabel::Live => f.write_str("LIVE"),
            StatusLabel::Manual => f.write_str("MANUAL"),
            StatusLabel::KeyRequired => f.write_str("KEY REQUIRED"),
            StatusLabel::Offline => f.write_str("OFFLINE"),
        }
    }
}

/// Stable sort by descending heat; ties keep backend order.
pub fn sort_by_heat(items: &[TrendItem]) -> Vec<&TrendItem> {
    let mut sorted: Vec<&TrendItem> = items.iter().collect();
    sorted.sort_by(|a, b| b.volume_score.cmp(&a.volume_score));
    sorted
}

/// `remaining / interval`, clamped to `[0, 1]`.
pub fn progress_ratio(remaining: u32, interval: u32) -> f64 {
    if interval == 0 {
        return 0.0;
    }
    (f64::from(remaining) / f64::from(interval)).clamp(0.0, 1.0)
}

/// User-facing wording for the last error.
pub fn error_message(err: &FetchError) -> String {
    match err {
        FetchError::AuthMissing => "API key missing. Configure a key, then press c.".to_string(),
        FetchError::QuotaExceeded(_) => "Quota exhausted. Feed paused while cooling down.".to_string(),
        FetchError::Transient(msg) => format!("Signal lost ({msg}). Retrying."),
    }
}

/// Everything one frame needs, borrowed from the latest batch.
#[derive(Debug, Clone)]
pub struct DashboardView<'a> {
    pub items: Vec<&'a TrendItem>,
    pub status: StatusLabel,
    /// Fraction of the refresh (or cooldown) interval still to go.
    pub progress: f64,
    /// `"17s"` while counting, `"PAUSED"` otherwise.
    pub countdown: String,
    /// Local wall-clock of the last success, `"--:--:--"` if none.
    pub last_updated: String,
    pub summary: Option<&'a str>,
    pub sources: &'a [Citation],
    pub error: Option<String>,
}

impl<'a> DashboardView<'a> {
    pub fn build(state: &SchedulerState, result: Option<&'a FetchResult>) -> Self {
        let status = StatusLabel::from_state(state);

        let (progress, countdown) = if state.quota_blocked {
            // The cooldown length is not part of the snapshot; show the raw
            // seconds and an empty bar.
            (0.0, format!("{}s", state.cooldown_seconds_remaining))
        } else if state.active && state.live_mode {
            (
                progress_ratio(state.seconds_until_next_refresh, state.refresh_interval_secs),
                format!("{}s", state.seconds_until_next_refresh),
            )
        } else {
            (0.0, "PAUSED".to_string())
        };

        let last_updated = state
            .last_updated
            .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());

        Self {
            items: result.map(|r| sort_by_heat(&r.items)).unwrap_or_default(),
            status,
            progress,
            countdown,
            last_updated,
            summary: result.and_then(|r| r.summary.as_deref()),
            sources: result.map(|r| r.sources.as_slice()).unwrap_or(&[]),
            error: state.last_error.as_ref().map(error_message),
        }
    }
}
