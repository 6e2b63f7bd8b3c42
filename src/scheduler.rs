//! Refresh scheduling.
//!
//! [`Scheduler`] decides *when* to fetch.  It owns the activation flags, the
//! live-mode refresh countdown and the quota cooldown, and it holds the
//! latest [`FetchResult`].  It does no I/O and reads no clock: time advances
//! only through [`Scheduler::tick`], one call per elapsed second, and fetches
//! are requested by handing out a [`FetchTicket`] that the caller must
//! dispatch and later settle with [`Scheduler::complete`].
//!
//! ```text
//!            activate()              toggle_live(true)
//!   Idle ───────────────► Manual ─────────────────────► Live
//!    ▲                      │  ◄───────────────────────  │
//!    │       stop()         │     toggle_live(false)     │
//!    ├──────────────────────┴────────────────────────────┤
//!    │                                                   │ QuotaExceeded
//!    │          cooldown reaches 0                       ▼
//!    └────────────────────────────────────────── CooldownBlocked
//! ```
//!
//! At most one fetch is ever outstanding: every path that issues a ticket
//! checks `loading` first.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::source::{ErrorKind, FetchError, FetchResult};

/// Interval for the standard deployment tier.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u32 = 30;

/// Fixed wait after a quota failure before the system may be re-activated.
pub const DEFAULT_COOLDOWN_SECS: u32 = 60;

/// Timing parameters; everything else about the scheduler is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub refresh_interval_secs: u32,
    pub cooldown_secs: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// A one-second-resolution countdown advanced by explicit ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
    interval: u32,
    running: bool,
}

impl Countdown {
    /// A stopped countdown primed at `interval`.
    pub fn new(interval: u32) -> Self {
        Self {
            remaining: interval,
            interval,
            running: false,
        }
    }

    /// Rewind to the full interval and start counting.
    pub fn start(&mut self) {
        self.remaining = self.interval;
        self.running = true;
    }

    /// Stop counting and rewind to the full interval.
    pub fn cancel(&mut self) {
        self.running = false;
        self.remaining = self.interval;
    }

    /// Rewind to the full interval without changing whether it runs.
    pub fn rewind(&mut self) {
        self.remaining = self.interval;
    }

    /// Advance by one second.  Returns `true` on the tick that reaches zero.
    pub fn advance(&mut self) -> bool {
        if !self.running || self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.remaining == 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }
}

// ---------------------------------------------------------------------------
// State snapshot
// ---------------------------------------------------------------------------

/// Coarse position in the state diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Manual,
    Live,
    CooldownBlocked,
}

/// Read-only view of the scheduler, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerState {
    pub active: bool,
    pub live_mode: bool,
    pub loading: bool,
    pub quota_blocked: bool,
    pub seconds_until_next_refresh: u32,
    pub refresh_interval_secs: u32,
    pub cooldown_seconds_remaining: u32,
    pub last_error: Option<FetchError>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl SchedulerState {
    pub fn phase(&self) -> Phase {
        if self.quota_blocked {
            Phase::CooldownBlocked
        } else if self.active && self.live_mode {
            Phase::Live
        } else if self.active {
            Phase::Manual
        } else {
            Phase::Idle
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// What prompted a fetch.  Only used for logging and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    Activation,
    Manual,
    Scheduled,
}

/// Permission to run exactly one fetch.
///
/// Returned by the operations that start a fetch; the holder must dispatch
/// it and report the outcome through [`Scheduler::complete`].
#[must_use = "a ticket means a fetch must be dispatched"]
#[derive(Debug, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub reason: FetchReason,
}

#[derive(Debug)]
pub struct Scheduler {
    active: bool,
    live_mode: bool,
    loading: bool,
    quota_blocked: bool,
    refresh: Countdown,
    cooldown: Countdown,
    last_error: Option<FetchError>,
    last_updated: Option<DateTime<Utc>>,
    latest: Option<FetchResult>,
    issued: u64,
}

impl Scheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            active: false,
            live_mode: false,
            loading: false,
            quota_blocked: false,
            refresh: Countdown::new(config.refresh_interval_secs),
            cooldown: Countdown::new(config.cooldown_secs),
            last_error: None,
            last_updated: None,
            latest: None,
            issued: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState {
            active: self.active,
            live_mode: self.live_mode,
            loading: self.loading,
            quota_blocked: self.quota_blocked,
            seconds_until_next_refresh: self.refresh.remaining(),
            refresh_interval_secs: self.refresh.interval(),
            cooldown_seconds_remaining: if self.quota_blocked {
                self.cooldown.remaining()
            } else {
                0
            },
            last_error: self.last_error.clone(),
            last_updated: self.last_updated,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state().phase()
    }

    /// The most recent successful batch.
    pub fn latest(&self) -> Option<&FetchResult> {
        self.latest.as_ref()
    }

    /// Number of tickets handed out so far.
    pub fn fetches_issued(&self) -> u64 {
        self.issued
    }

    fn issue(&mut self, reason: FetchReason) -> Option<FetchTicket> {
        if self.loading {
            debug!(?reason, "fetch already in flight; not issuing another");
            return None;
        }
        self.loading = true;
        self.issued += 1;
        debug!(seq = self.issued, ?reason, "fetch issued");
        Some(FetchTicket {
            seq: self.issued,
            reason,
        })
    }

    /// Turn the system on and load immediately.
    ///
    /// Ignored while cooling down or when already active.
    pub fn activate(&mut self) -> Option<FetchTicket> {
        if self.quota_blocked {
            warn!(
                remaining = self.cooldown.remaining(),
                "activation refused during quota cooldown"
            );
            return None;
        }
        if self.active {
            return None;
        }
        self.active = true;
        info!("scheduler activated");
        self.issue(FetchReason::Activation)
    }

    /// User-requested refresh.  Works whether or not the system is active,
    /// but never during a cooldown or while a fetch is in flight.
    pub fn refresh(&mut self) -> Option<FetchTicket> {
        if self.quota_blocked {
            debug!("manual refresh refused during quota cooldown");
            return None;
        }
        self.issue(FetchReason::Manual)
    }

    /// Enter or leave live mode.  Only meaningful while active.
    ///
    /// Entering rewinds the countdown to the full interval; leaving stops it
    /// without touching any fetch already in flight.
    pub fn toggle_live(&mut self, on: bool) {
        if !self.active {
            debug!(on, "live toggle ignored while inactive");
            return;
        }
        self.live_mode = on;
        if on {
            self.refresh.start();
        } else {
            self.refresh.cancel();
        }
        info!(live = on, "live mode changed");
    }

    /// Go back to idle.  An in-flight fetch still completes and its data is
    /// applied, but nothing is rescheduled.
    pub fn stop(&mut self) {
        if self.active || self.live_mode {
            info!("scheduler stopped");
        }
        self.active = false;
        self.live_mode = false;
        self.refresh.cancel();
    }

    /// Signal that credentials have been (re)configured, lifting the pause on
    /// scheduled fetches that an `AuthMissing` failure imposes.
    pub fn credentials_supplied(&mut self) {
        if matches!(self.last_error, Some(FetchError::AuthMissing)) {
            self.last_error = None;
        }
    }

    fn auth_blocked(&self) -> bool {
        matches!(self.last_error, Some(FetchError::AuthMissing))
    }

    /// One second has elapsed.
    ///
    /// Drives the cooldown while quota-blocked, otherwise the live refresh
    /// countdown.  Returns a ticket when the countdown fires and no fetch is
    /// in flight.
    pub fn tick(&mut self) -> Option<FetchTicket> {
        if self.quota_blocked {
            if self.cooldown.advance() {
                self.cooldown.cancel();
                self.quota_blocked = false;
                if matches!(self.last_error, Some(FetchError::QuotaExceeded(_))) {
                    self.last_error = None;
                }
                info!("quota cooldown elapsed");
            }
            return None;
        }

        if !(self.active && self.live_mode) {
            return None;
        }

        if !self.refresh.advance() {
            return None;
        }
        self.refresh.rewind();
        if self.auth_blocked() {
            debug!("scheduled fetch skipped until credentials are supplied");
            return None;
        }
        self.issue(FetchReason::Scheduled)
    }

    /// Settle the outstanding fetch.
    pub fn complete(&mut self, outcome: Result<FetchResult, FetchError>, now: DateTime<Utc>) {
        if !self.loading {
            warn!("fetch completion with no fetch outstanding");
        }
        self.loading = false;

        match outcome {
            Ok(result) => {
                info!(
                    items = result.items.len(),
                    active = self.active,
                    "fetch succeeded"
                );
                self.latest = Some(result);
                self.last_updated = Some(now);
                self.last_error = None;
                self.quota_blocked = false;
                self.cooldown.cancel();
                // A stopped system keeps its data but is not rescheduled:
                // the countdown is only rewound, never restarted, here.
                self.refresh.rewind();
            }
            Err(err) => {
                match err.kind() {
                    ErrorKind::QuotaExceeded => {
                        self.stop();
                        self.quota_blocked = true;
                        self.cooldown.start();
                        warn!(
                            cooldown_secs = self.cooldown.remaining(),
                            error = %err,
                            "quota exceeded; cooling down"
                        );
                    }
                    ErrorKind::AuthMissing => {
                        warn!("fetch failed: no usable API key");
                    }
                    ErrorKind::Transient => {
                        warn!(error = %err, live = self.live_mode, "transient fetch failure");
                    }
                }
                self.last_error = Some(err);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::make_item;
    use chrono::TimeZone;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs.into())
    }

    fn batch() -> FetchResult {
        FetchResult {
            items: vec![make_item("1", "A", 10)],
            summary: None,
            sources: vec![],
        }
    }

    fn scheduler(interval: u32, cooldown: u32) -> Scheduler {
        Scheduler::new(ScheduleConfig {
            refresh_interval_secs: interval,
            cooldown_secs: cooldown,
        })
    }

    // -- countdown -----------------------------------------------------------

    #[test]
    fn stopped_countdown_does_not_move() {
        let mut c = Countdown::new(3);
        assert!(!c.advance());
        assert_eq!(c.remaining(), 3);
    }

    #[test]
    fn countdown_fires_once_at_zero() {
        let mut c = Countdown::new(2);
        c.start();
        assert!(!c.advance());
        assert!(c.advance());
        assert!(!c.advance(), "stays at zero until rewound");
        assert_eq!(c.remaining(), 0);
        c.rewind();
        assert_eq!(c.remaining(), 2);
    }

    // -- transitions ---------------------------------------------------------

    #[test]
    fn new_scheduler_is_idle() {
        let s = scheduler(20, 60);
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.latest().is_none());
        assert_eq!(s.state().seconds_until_next_refresh, 20);
    }

    #[test]
    fn activate_twice_issues_one_fetch() {
        let mut s = scheduler(20, 60);
        assert!(s.activate().is_some());
        assert!(s.activate().is_none());
        assert_eq!(s.fetches_issued(), 1);
    }

    #[test]
    fn toggle_live_ignored_when_idle() {
        let mut s = scheduler(20, 60);
        s.toggle_live(true);
        assert!(!s.state().live_mode);
    }

    #[test]
    fn manual_refresh_works_when_idle() {
        let mut s = scheduler(20, 60);
        let ticket = s.refresh().unwrap();
        assert_eq!(ticket.reason, FetchReason::Manual);
        assert!(!s.state().active);
    }

    #[test]
    fn leaving_live_mode_keeps_fetch_in_flight() {
        let mut s = scheduler(5, 60);
        let _ = s.activate();
        s.toggle_live(true);
        s.toggle_live(false);
        assert!(s.state().loading);
        assert_eq!(s.phase(), Phase::Manual);
        for _ in 0..10 {
            assert!(s.tick().is_none());
        }
    }

    #[test]
    fn transient_failure_keeps_live_mode() {
        let mut s = scheduler(3, 60);
        let _ = s.activate();
        s.toggle_live(true);
        s.complete(Err(FetchError::transient("boom")), at(1));

        assert_eq!(s.phase(), Phase::Live);
        assert_eq!(s.state().last_error.unwrap().kind(), ErrorKind::Transient);
        let _ = s.tick();
        let _ = s.tick();
        assert!(s.tick().is_some(), "live mode retries on the next countdown");
    }

    #[test]
    fn auth_missing_pauses_scheduled_fetches_until_supplied() {
        let mut s = scheduler(2, 60);
        let _ = s.activate();
        s.toggle_live(true);
        s.complete(Err(FetchError::AuthMissing), at(1));

        assert!(s.state().active, "activation is left alone");
        assert!(s.state().live_mode);
        assert!(s.tick().is_none());
        assert!(s.tick().is_none(), "countdown fired but fetch was held back");

        s.credentials_supplied();
        assert!(s.state().last_error.is_none());
        assert!(s.tick().is_none());
        assert!(s.tick().is_some());
    }

    #[test]
    fn refresh_refused_during_cooldown() {
        let mut s = scheduler(20, 3);
        let _ = s.activate();
        s.complete(Err(FetchError::QuotaExceeded("429".into())), at(1));
        assert!(s.refresh().is_none());
        assert!(s.activate().is_none());
        assert_eq!(s.phase(), Phase::CooldownBlocked);
    }

    #[test]
    fn cooldown_expiry_clears_quota_error() {
        let mut s = scheduler(20, 2);
        let _ = s.activate();
        s.complete(Err(FetchError::QuotaExceeded("429".into())), at(1));
        let _ = s.tick();
        assert!(s.state().last_error.is_some(), "error shown while cooling down");
        let _ = s.tick();

        let state = s.state();
        assert!(!state.quota_blocked);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn success_clears_error_and_stores_batch() {
        let mut s = scheduler(20, 60);
        let _ = s.activate();
        s.complete(Err(FetchError::transient("x")), at(1));
        let _ = s.refresh();
        s.complete(Ok(batch()), at(2));

        let state = s.state();
        assert!(state.last_error.is_none());
        assert_eq!(state.last_updated, Some(at(2)));
        assert_eq!(s.latest(), Some(&batch()));
    }

    #[test]
    fn success_rewinds_live_countdown() {
        let mut s = scheduler(10, 60);
        let _ = s.activate();
        s.toggle_live(true);
        for _ in 0..4 {
            let _ = s.tick();
        }
        assert_eq!(s.state().seconds_until_next_refresh, 6);
        s.complete(Ok(batch()), at(4));
        assert_eq!(s.state().seconds_until_next_refresh, 10);
    }

    #[test]
    fn failed_fetch_keeps_previous_batch() {
        let mut s = scheduler(20, 60);
        let _ = s.activate();
        s.complete(Ok(batch()), at(1));
        let _ = s.refresh();
        s.complete(Err(FetchError::transient("x")), at(2));
        assert_eq!(s.latest(), Some(&batch()));
        assert_eq!(s.state().last_updated, Some(at(1)));
    }
}
