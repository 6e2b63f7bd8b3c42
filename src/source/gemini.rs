//! Gemini trend source.
//!
//! [`GeminiClient`] does the HTTP work against the `generateContent` REST
//! endpoint and classifies failures; [`GeminiSource`] wraps it with the
//! trend prompt and turns the model's free-form answer into a
//! [`FetchResult`].
//!
//! Everything between "HTTP body received" and "FetchResult built" is a pure
//! function ([`parse_response`], [`parse_payload`], [`normalise_records`]) so
//! the tests can feed canned payloads without touching the network.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Citation, FetchError, FetchResult, Sentiment, TrendItem, TrendSource, MAX_VOLUME_SCORE};
use crate::credentials::Credentials;

/// Public Gemini API host.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Model used when the config does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Placeholder in prompts that is replaced with the request time.
pub const TIMESTAMP_PLACEHOLDER: &str = "{timestamp}";

/// Title given to grounding links the API returns untitled.
const UNTITLED_CITATION: &str = "Context Link";

/// Longest slice of a non-JSON error body kept in messages.
const MAX_ERROR_SNIPPET: usize = 200;

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Thin blocking client for `models/{model}:generateContent`.
///
/// Shared by the trend source and the screenshot scanner.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    credentials: Credentials,
}

impl GeminiClient {
    /// Build a client.
    ///
    /// `timeout` bounds each request; the scheduler itself never times out a
    /// fetch, it only refuses to start a second one.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("trend-pulse/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
            credentials,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    /// POST `body` and decode the response envelope.
    pub fn generate(&self, body: &Value) -> Result<GenerateResponse, FetchError> {
        let key = self.credentials.get().ok_or(FetchError::AuthMissing)?;

        tracing::debug!(model = %self.model, "generateContent request");
        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", key)
            .json(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            let err = classify_error_body(status.as_u16(), &text);
            tracing::warn!(status = status.as_u16(), error = %err, "generateContent failed");
            return Err(err);
        }

        serde_json::from_str(&text)
            .map_err(|e| FetchError::transient(format!("malformed response envelope: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// The subset of the `generateContent` response we read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebChunk {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// Web grounding links of the first candidate, in API order.
    pub fn citations(&self) -> Vec<Citation> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .filter_map(|web| {
                        let uri = web.uri.clone()?;
                        let title = web
                            .title
                            .clone()
                            .filter(|t| !t.trim().is_empty())
                            .unwrap_or_else(|| UNTITLED_CITATION.to_string());
                        Some(Citation { title, uri })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}

/// Map a non-2xx response body onto the error taxonomy.
pub(crate) fn classify_error_body(status: u16, body: &str) -> FetchError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let reason = envelope
                .error
                .details
                .iter()
                .find_map(|d| d.reason.as_deref());
            FetchError::from_http(
                status,
                envelope.error.status.as_deref(),
                reason,
                envelope.error.message,
            )
        }
        Err(_) => {
            let snippet: String = body.chars().take(MAX_ERROR_SNIPPET).collect();
            FetchError::from_http(status, None, None, snippet)
        }
    }
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

/// One trend record as the model wrote it, before normalisation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTrend {
    pub topic: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "volume_score", alias = "heat")]
    pub volume_score: Option<Value>,
    pub sentiment: Option<Sentiment>,
    pub location: Option<String>,
    #[serde(alias = "source_url", alias = "url")]
    pub source_url: Option<String>,
}

/// Records plus the optional batch summary extracted from the model text.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    pub records: Vec<RawTrend>,
    pub summary: Option<String>,
}

impl Payload {
    fn from_records(values: Vec<Value>, summary: Option<String>) -> Self {
        // Best effort: a single malformed record must not sink the batch.
        let records = values
            .into_iter()
            .filter_map(|v| serde_json::from_value::<RawTrend>(v).ok())
            .collect();
        Self { records, summary }
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(values) => Some(Self::from_records(values, None)),
            Value::Object(mut map) => {
                let records = ["trends", "items", "topics"]
                    .iter()
                    .find_map(|key| match map.remove(*key) {
                        Some(Value::Array(values)) => Some(values),
                        _ => None,
                    })?;
                let summary = ["summary", "globalSummary"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from);
                Some(Self::from_records(records, summary))
            }
            _ => None,
        }
    }
}

/// Remove a surrounding markdown code fence, if the model added one.
pub fn strip_code_fences(text: &str) -> &str {
    let inner = if let Some((_, rest)) = text.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = text.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        text
    };
    inner.trim()
}

/// Extract trend records from the model's text answer.
///
/// Accepts a bare JSON array, or an object carrying the array under
/// `trends`/`items` and an optional `summary`.  When strict parsing fails the
/// outermost `[...]` slice is tried before giving up.
pub fn parse_payload(text: &str) -> Result<Payload, FetchError> {
    let cleaned = strip_code_fences(text);

    if let Some(payload) = serde_json::from_str::<Value>(cleaned)
        .ok()
        .and_then(Payload::from_value)
    {
        return Ok(payload);
    }

    if let (Some(start), Some(end)) = (cleaned.find('['), cleaned.rfind(']')) {
        if start < end {
            if let Ok(Value::Array(values)) = serde_json::from_str::<Value>(&cleaned[start..=end]) {
                return Ok(Payload::from_records(values, None));
            }
        }
    }

    Err(FetchError::transient("backend answer is not a JSON trend list"))
}

fn heat(value: Option<&Value>) -> u8 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .unwrap_or(0.0);

    if raw.is_finite() {
        raw.round().clamp(0.0, f64::from(MAX_VOLUME_SCORE)) as u8
    } else {
        0
    }
}

fn to_ticker(topic: &str) -> String {
    format!("${}", topic.trim_start_matches('$').trim().to_uppercase())
}

/// Turn raw records into [`TrendItem`]s.
///
/// * records without a topic are dropped
/// * ids are `"{now_millis}-{index}"`, so they are unique within the batch
/// * heat is clamped into `0..=100` (missing counts as 0)
/// * repeated topics (case-insensitive) keep their first occurrence
/// * in ticker mode topics become `$UPPERCASE`
pub fn normalise_records(records: Vec<RawTrend>, now: DateTime<Utc>, ticker_mode: bool) -> Vec<TrendItem> {
    let stamp = now.timestamp_millis();
    let mut seen_topics = HashSet::new();

    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            let topic = raw
                .topic
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())?;
            let topic = if ticker_mode {
                to_ticker(topic)
            } else {
                topic.to_string()
            };
            if !seen_topics.insert(topic.to_lowercase()) {
                return None;
            }

            Some(TrendItem {
                id: format!("{stamp}-{index}"),
                topic,
                category: raw
                    .category
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| "Uncategorized".to_string()),
                description: raw.description.unwrap_or_default().trim().to_string(),
                volume_score: heat(raw.volume_score.as_ref()),
                sentiment: raw.sentiment.unwrap_or_default(),
                location: raw.location.filter(|l| !l.trim().is_empty()),
                source_url: raw.source_url.filter(|u| !u.trim().is_empty()),
                timestamp: now,
            })
        })
        .collect()
}

fn build_result(
    response: &GenerateResponse,
    now: DateTime<Utc>,
    ticker_mode: bool,
) -> Result<FetchResult, FetchError> {
    let payload = parse_payload(&response.text())?;
    let items = normalise_records(payload.records, now, ticker_mode);
    if items.is_empty() {
        return Err(FetchError::transient("backend returned no trends"));
    }
    Ok(FetchResult {
        items,
        summary: payload.summary,
        sources: response.citations(),
    })
}

/// Parse a complete `generateContent` response body into a [`FetchResult`].
pub fn parse_response(body: &str, now: DateTime<Utc>, ticker_mode: bool) -> Result<FetchResult, FetchError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::transient(format!("malformed response envelope: {e}")))?;
    build_result(&response, now, ticker_mode)
}

// ---------------------------------------------------------------------------
// TrendSource implementation
// ---------------------------------------------------------------------------

/// Trend source backed by Gemini with Google-search grounding.
pub struct GeminiSource {
    client: GeminiClient,
    prompt: String,
    ticker_mode: bool,
    label: String,
}

impl GeminiSource {
    /// Create a source.
    ///
    /// # Arguments
    ///
    /// * `client`: configured HTTP client (endpoint, model, key handle).
    /// * `prompt`: instruction text; [`TIMESTAMP_PLACEHOLDER`] is replaced
    ///   with the request time on every fetch.
    /// * `ticker_mode`: render topics as `$TICKER` symbols.
    pub fn new(client: GeminiClient, prompt: impl Into<String>, ticker_mode: bool) -> Self {
        let label = format!("Gemini ({})", client.model());
        Self {
            client,
            prompt: prompt.into(),
            ticker_mode,
            label,
        }
    }

    /// The JSON request body for a fetch at `now`.
    pub fn request_body(&self, now: DateTime<Utc>) -> Value {
        let prompt = self
            .prompt
            .replace(TIMESTAMP_PLACEHOLDER, &now.to_rfc3339());
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "tools": [{ "google_search": {} }],
        })
    }
}

impl TrendSource for GeminiSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn fetch(&self) -> Result<FetchResult, FetchError> {
        let now = Utc::now();
        let response = self.client.generate(&self.request_body(now))?;
        let result = build_result(&response, now, self.ticker_mode)?;
        tracing::info!(
            items = result.items.len(),
            sources = result.sources.len(),
            "trend batch parsed"
        );
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
