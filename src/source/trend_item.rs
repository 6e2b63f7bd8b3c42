//! The core data types shared by every trend source.
//!
//! A [`FetchResult`] is produced wholesale by one [`TrendSource::fetch`]
//! call and replaces the previous one on success.  Nothing downstream merges
//! batches, so ids only need to be unique within a single result.
//!
//! [`TrendSource::fetch`]: super::TrendSource::fetch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Heat above which a topic is flagged as "super hot" in the UI.
pub const HOT_THRESHOLD: u8 = 90;

/// Upper bound of [`TrendItem::volume_score`].
pub const MAX_VOLUME_SCORE: u8 = 100;

/// Crowd mood attached to a topic.
///
/// Backends are free-form about casing and occasionally invent new moods;
/// anything unrecognised deserialises as [`Sentiment::Neutral`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
    Viral,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Viral => "viral",
        }
    }
}

impl From<String> for Sentiment {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            "viral" => Sentiment::Viral,
            _ => Sentiment::Neutral,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single trending topic, normalised from whatever the backend returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendItem {
    /// Unique within one fetch batch: `"{fetch_millis}-{index}"`.
    pub id: String,

    /// Short label, e.g. `"Solar eclipse"` or `"$ECLIPSE"` in ticker mode.
    pub topic: String,

    /// Open-ended category string chosen by the backend.
    pub category: String,

    /// One-line explanation of why the topic is trending.
    pub description: String,

    /// Social "heat", always within `0..=100`.
    pub volume_score: u8,

    pub sentiment: Sentiment,

    /// Region the trend is concentrated in, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Link to a page describing the trend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// When this item was materialised by the client.
    pub timestamp: DateTime<Utc>,
}

impl TrendItem {
    /// Whether the topic crosses the "super hot" threshold.
    pub fn is_hot(&self) -> bool {
        self.volume_score > HOT_THRESHOLD
    }
}

/// A grounding citation returned alongside the items, passed through
/// unmodified for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub uri: String,
}

/// Everything one successful fetch produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    /// Items in backend order.  Sorting is the presentation layer's job.
    pub items: Vec<TrendItem>,
    /// Optional one-paragraph overview of the whole batch.
    pub summary: Option<String>,
    /// Grounding sources, in backend order.
    pub sources: Vec<Citation>,
}

impl FetchResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
