//! trend-pulse: a live trending-topics dashboard for the terminal.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐  PollMsg   ┌───────────────────┐  view   ┌──────────┐
//! │  poll.rs │ ─────────► │      app.rs       │ ──────► │  ui.rs   │
//! │ (thread) │ ◄───────── │ (owns scheduler)  │         │ (render) │
//! └──────────┘ FetchTicket└───────────────────┘         └──────────┘
//!      │                           ▲
//!      ▼                           │ handle_key_event()
//! ┌──────────┐                ┌──────────┐
//! │ source/  │                │ input.rs │
//! └──────────┘                └──────────┘
//! ```
//!
//! * **`source/`**: the `TrendSource` trait, the trend data model, the
//!   failure taxonomy and the Gemini client.
//! * **`scheduler`**: the refresh/cooldown state machine; pure, driven by
//!   one-second ticks.
//! * **`view`**: maps scheduler state and the latest batch to display data.
//! * **`poll`**: background thread that runs fetches on request.
//! * **`app`**: owns the scheduler and all UI state.
//! * **`ui`** / **`input`**: rendering and key bindings.
//! * **`export`**, **`scan`**, **`config`**, **`credentials`**: CSV export,
//!   screenshot analysis, TOML configuration and API key handling.

pub mod app;
pub mod config;
pub mod credentials;
pub mod export;
pub mod input;
pub mod poll;
pub mod scan;
pub mod scheduler;
pub mod source;
pub mod ui;
pub mod view;

pub use config::{Config, ConfigError};
pub use credentials::Credentials;
pub use scheduler::{FetchTicket, Phase, ScheduleConfig, Scheduler, SchedulerState};
pub use source::{Citation, FetchError, FetchResult, Sentiment, TrendItem, TrendSource};
