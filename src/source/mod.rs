//! Trend source abstraction layer.
//!
//! This module defines the [`TrendSource`] trait, the shared data types and
//! the failure taxonomy.  The concrete Gemini client lives in `gemini.rs`.
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory (e.g. `openai.rs`).
//! 2. Define a struct and implement [`TrendSource`] for it, classifying every
//!    failure into a [`FetchError`] variant.
//! 3. Add `mod openai;` below and re-export your struct in the `pub use` block.
//! 4. Construct it in `main.rs` instead of (or selectable alongside)
//!    [`GeminiSource`].
//!
//! The scheduler, worker and UI are all source-agnostic.

mod error;
mod gemini;
mod trend_item;

pub use error::{ErrorKind, FetchError};
pub use gemini::{
    normalise_records, parse_payload, parse_response, strip_code_fences, GeminiClient,
    GeminiSource, GenerateResponse, Payload, RawTrend, DEFAULT_ENDPOINT, DEFAULT_MODEL,
    TIMESTAMP_PLACEHOLDER,
};
pub use trend_item::{Citation, FetchResult, Sentiment, TrendItem, HOT_THRESHOLD, MAX_VOLUME_SCORE};

#[cfg(test)]
pub(crate) use trend_item::tests::make_item;

/// Trait that every trend source must implement.
///
/// The fetch worker calls [`fetch()`](TrendSource::fetch) on a background
/// thread, so implementations must be [`Send`].  Configuration (prompt,
/// model, freshness window) is fixed when the source is constructed.
///
/// ## Implementing a new source
///
/// ```ignore
/// pub struct MySource { /* config fields */ }
///
/// impl TrendSource for MySource {
///     fn name(&self) -> &str { "my-source" }
///
///     fn fetch(&self) -> Result<FetchResult, FetchError> {
///         // Perform HTTP / IO, then convert into TrendItem values.
///         todo!()
///     }
/// }
/// ```
pub trait TrendSource: Send {
    /// Human-readable label shown in the status bar.
    fn name(&self) -> &str;

    /// Fetch a complete, de-duplicated batch of trends.
    fn fetch(&self) -> Result<FetchResult, FetchError>;
}

impl<T: TrendSource + ?Sized> TrendSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self) -> Result<FetchResult, FetchError> {
        (**self).fetch()
    }
}
