//! Application state.
//!
//! [`App`] is the single owner of the [`Scheduler`]: every state change,
//! whether from a key press, the one-second tick or a finished fetch, goes
//! through one of its methods on the UI thread.

use std::path::PathBuf;

use chrono::Utc;
use ratatui::widgets::ListState;

use crate::credentials::Credentials;
use crate::export::{self, ExportFormat};
use crate::poll::{FetchWorker, PollMsg};
use crate::scheduler::{FetchTicket, Scheduler, SchedulerState};
use crate::view::{sort_by_heat, DashboardView};

pub struct App {
    scheduler: Scheduler,
    worker: FetchWorker,
    credentials: Credentials,
    export_dir: PathBuf,
    /// List selection state for scrolling.
    pub list_state: ListState,
    /// Whether the user has requested to quit.
    pub quit: bool,
    /// Last action / poll status message.
    pub status: String,
    /// Rotation offset of the ticker strip, advanced once per second.
    pub ticker_offset: usize,
}

impl App {
    pub fn new(
        scheduler: Scheduler,
        worker: FetchWorker,
        credentials: Credentials,
        export_dir: PathBuf,
    ) -> Self {
        let status = if credentials.is_configured() {
            "Ready. Press a to activate.".to_string()
        } else {
            format!("Key required: set {} and press c.", credentials.env_var())
        };
        Self {
            scheduler,
            worker,
            credentials,
            export_dir,
            list_state: ListState::default(),
            quit: false,
            status,
            ticker_offset: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn source_name(&self) -> &str {
        self.worker.source_name()
    }

    pub fn has_key(&self) -> bool {
        self.credentials.is_configured()
    }

    /// Build the frame view from current state.
    pub fn view(&self) -> DashboardView<'_> {
        DashboardView::build(&self.scheduler.state(), self.scheduler.latest())
    }

    pub fn item_count(&self) -> usize {
        self.scheduler.latest().map_or(0, |r| r.items.len())
    }

    fn dispatch(&mut self, ticket: Option<FetchTicket>) {
        let Some(ticket) = ticket else { return };
        if let Err(err) = self.worker.dispatch(ticket) {
            tracing::error!(error = %err, "could not dispatch fetch");
            self.scheduler.complete(Err(err), Utc::now());
        }
    }

    // -- scheduler actions ---------------------------------------------------

    pub fn activate(&mut self) {
        if self.scheduler.state().quota_blocked {
            self.status = "Cooling down after quota limit.".into();
            return;
        }
        let ticket = self.scheduler.activate();
        if ticket.is_some() {
            self.status = "Connecting...".into();
        }
        self.dispatch(ticket);
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
        self.status = "Feed stopped.".into();
    }

    pub fn toggle_live(&mut self) {
        let state = self.scheduler.state();
        if !state.active {
            self.status = "Activate first (a).".into();
            return;
        }
        let on = !state.live_mode;
        self.scheduler.toggle_live(on);
        self.status = if on {
            format!("Live: refreshing every {}s.", state.refresh_interval_secs)
        } else {
            "Manual mode.".into()
        };
    }

    pub fn refresh(&mut self) {
        let ticket = self.scheduler.refresh();
        if ticket.is_none() && self.scheduler.state().loading {
            self.status = "Already syncing.".into();
        }
        self.dispatch(ticket);
    }

    /// One second of wall-clock time has passed.
    pub fn tick(&mut self) {
        self.ticker_offset = self.ticker_offset.wrapping_add(1);
        let ticket = self.scheduler.tick();
        self.dispatch(ticket);
    }

    /// Apply every finished fetch waiting in the worker channel.
    pub fn drain_worker(&mut self) {
        while let Some(msg) = self.worker.try_recv() {
            self.handle_poll(msg);
        }
    }

    pub fn handle_poll(&mut self, msg: PollMsg) {
        self.status = match &msg.outcome {
            Ok(result) => format!("Fetched {} trends", result.items.len()),
            Err(err) => format!("Error: {err}"),
        };
        self.scheduler.complete(msg.outcome, Utc::now());
        self.clamp_selection();
    }

    // -- credentials / export ------------------------------------------------

    pub fn reload_credentials(&mut self) {
        if self.credentials.reload() {
            self.scheduler.credentials_supplied();
            self.status = "API key loaded.".into();
        } else {
            self.status = format!(
                "No key found in {} or {}.",
                self.credentials.env_file().display(),
                self.credentials.env_var()
            );
        }
    }

    /// Write the full table export.
    pub fn export(&mut self) {
        self.export_as(ExportFormat::Table);
    }

    /// Write the keyword-only export.
    pub fn export_keywords(&mut self) {
        self.export_as(ExportFormat::Keywords);
    }

    fn export_as(&mut self, format: ExportFormat) {
        let items = self
            .scheduler
            .latest()
            .map(|r| sort_by_heat(&r.items))
            .unwrap_or_default();
        if items.is_empty() {
            self.status = "Nothing to export.".into();
            return;
        }
        let outcome = export::write_export(&self.export_dir, format, items, Utc::now());
        self.status = match outcome {
            Ok(path) => format!("Exported to {}", path.display()),
            Err(err) => {
                tracing::error!(error = %err, "export failed");
                format!("Export failed: {err:#}")
            }
        };
    }

    // -- navigation ----------------------------------------------------------

    fn clamp_selection(&mut self) {
        let len = self.item_count();
        match self.list_state.selected() {
            Some(_) if len == 0 => self.list_state.select(None),
            Some(i) if i >= len => self.list_state.select(Some(len - 1)),
            _ => {}
        }
    }

    pub fn select_next(&mut self) {
        let len = self.item_count();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.item_count() == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if self.item_count() > 0 {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        let len = self.item_count();
        if len > 0 {
            self.list_state.select(Some(len - 1));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scheduler::{Phase, ScheduleConfig};
    use crate::source::{make_item, FetchError, FetchResult, TrendSource};
    use std::time::Duration;

    pub(crate) struct Canned(pub(crate) Result<FetchResult, FetchError>);

    impl TrendSource for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        fn fetch(&self) -> Result<FetchResult, FetchError> {
            self.0.clone()
        }
    }

    pub(crate) fn sample_batch() -> FetchResult {
        FetchResult {
            items: vec![
                make_item("1", "Cool", 20),
                make_item("2", "Hot", 95),
                make_item("3", "Warm", 60),
            ],
            summary: Some("A busy day online.".into()),
            sources: vec![],
        }
    }

    pub(crate) fn app_with(outcome: Result<FetchResult, FetchError>) -> App {
        app_exporting_to(std::env::temp_dir(), outcome)
    }

    pub(crate) fn app_exporting_to(
        export_dir: PathBuf,
        outcome: Result<FetchResult, FetchError>,
    ) -> App {
        let credentials = Credentials::new("TREND_PULSE_TEST_APP_KEY", "/nonexistent/.env");
        credentials.set("test-key");
        App::new(
            Scheduler::new(ScheduleConfig {
                refresh_interval_secs: 3,
                cooldown_secs: 2,
            }),
            FetchWorker::spawn(Canned(outcome)),
            credentials,
            export_dir,
        )
    }

    /// Block until the worker answers, then apply the message.
    pub(crate) fn settle(app: &mut App) {
        let msg = app
            .worker
            .recv_timeout(Duration::from_secs(5))
            .expect("worker answered");
        app.handle_poll(msg);
    }

    // -- construction --------------------------------------------------------

    #[test]
    fn new_app_starts_idle_and_empty() {
        let app = app_with(Ok(sample_batch()));
        assert_eq!(app.item_count(), 0);
        assert!(!app.quit);
        assert!(app.list_state.selected().is_none());
        assert_eq!(app.scheduler().phase(), Phase::Idle);
        assert!(app.has_key());
    }

    // -- scheduler wiring ----------------------------------------------------

    #[test]
    fn activate_fetches_and_shows_sorted_items() {
        let mut app = app_with(Ok(sample_batch()));
        app.activate();
        assert!(app.state().loading);
        settle(&mut app);

        assert_eq!(app.item_count(), 3);
        assert_eq!(app.status, "Fetched 3 trends");
        let view = app.view();
        assert_eq!(view.items[0].topic, "Hot");
        assert_eq!(view.items[2].topic, "Cool");
    }

    #[test]
    fn live_mode_refetches_after_interval() {
        let mut app = app_with(Ok(sample_batch()));
        app.activate();
        settle(&mut app);
        app.toggle_live();
        assert!(app.state().live_mode);

        app.tick();
        app.tick();
        assert!(!app.state().loading);
        app.tick();
        assert!(app.state().loading, "third tick fires the refresh");
        settle(&mut app);
        assert_eq!(app.scheduler().fetches_issued(), 2);
    }

    #[test]
    fn quota_failure_stops_and_cools_down() {
        let mut app = app_with(Err(FetchError::QuotaExceeded("429".into())));
        app.activate();
        settle(&mut app);

        let state = app.state();
        assert!(!state.active);
        assert!(state.quota_blocked);
        app.activate();
        assert_eq!(app.status, "Cooling down after quota limit.");

        app.tick();
        app.tick();
        assert_eq!(app.scheduler().phase(), Phase::Idle);
    }

    #[test]
    fn toggle_live_requires_activation() {
        let mut app = app_with(Ok(sample_batch()));
        app.toggle_live();
        assert!(!app.state().live_mode);
        assert_eq!(app.status, "Activate first (a).");
    }

    #[test]
    fn refresh_while_syncing_is_reported() {
        let mut app = app_with(Ok(sample_batch()));
        app.activate();
        app.refresh();
        assert_eq!(app.status, "Already syncing.");
        assert_eq!(app.scheduler().fetches_issued(), 1);
        settle(&mut app);
    }

    #[test]
    fn export_without_items_is_refused() {
        let mut app = app_with(Ok(sample_batch()));
        app.export();
        assert_eq!(app.status, "Nothing to export.");
    }

    #[test]
    fn export_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Ok(sample_batch()));
        app.export_dir = dir.path().to_path_buf();
        app.activate();
        settle(&mut app);

        app.export();
        assert!(app.status.starts_with("Exported to"), "{}", app.status);
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn keyword_export_lists_topics_by_heat() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Ok(sample_batch()));
        app.export_dir = dir.path().to_path_buf();
        app.activate();
        settle(&mut app);

        app.export_keywords();
        assert!(app.status.starts_with("Exported to"), "{}", app.status);
        let path = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        assert!(path.to_string_lossy().ends_with("_KEYWORDS.csv"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "HOT\nWARM\nCOOL\n");
    }

    // -- navigation ----------------------------------------------------------

    #[test]
    fn select_next_on_empty_is_noop() {
        let mut app = app_with(Ok(sample_batch()));
        app.select_next();
        app.select_previous();
        app.select_first();
        app.select_last();
        assert!(app.list_state.selected().is_none());
    }

    #[test]
    fn selection_moves_and_clamps() {
        let mut app = app_with(Ok(sample_batch()));
        app.activate();
        settle(&mut app);

        app.select_next();
        assert_eq!(app.list_state.selected(), Some(0));
        app.select_next();
        app.select_next();
        app.select_next();
        assert_eq!(app.list_state.selected(), Some(2));
        app.select_previous();
        assert_eq!(app.list_state.selected(), Some(1));
        app.select_first();
        app.select_previous();
        assert_eq!(app.list_state.selected(), Some(0));
        app.select_last();
        assert_eq!(app.list_state.selected(), Some(2));
    }
}
