//! Screenshot scanner: rank the tokens visible in a trading-app screenshot.
//!
//! A one-shot vision call through [`GeminiClient`].  Shares the trend
//! source's error taxonomy but not its scheduler; scans only run on demand.

use std::path::Path;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::source::{strip_code_fences, FetchError, GeminiClient};

/// Highest score a token can receive.
pub const MAX_TOKEN_SCORE: u8 = 10;

/// Score at which a token is shown as a strong pick.
pub const STRONG_SCORE: u8 = 8;

pub const DEFAULT_SCAN_PROMPT: &str = "You are looking at a screenshot of a token launchpad or DEX screener.

Read every token you can see and rate how likely it is to keep trending, 0 to 10.
Return ONLY a JSON object (no markdown) with:
- market_sentiment: one sentence on the overall mood
- top_picks: array of token names worth watching
- avoid: array of token names that look weak
- tokens_found: number of tokens you could read
- scored_tokens: array of { rank, name, score, reason } ordered by rank";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredToken {
    pub rank: u32,
    pub name: String,
    /// `0..=10`.
    pub score: u8,
    #[serde(default)]
    pub reason: String,
}

impl ScoredToken {
    pub fn is_strong(&self) -> bool {
        self.score >= STRONG_SCORE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotAnalysis {
    #[serde(default)]
    pub market_sentiment: String,
    #[serde(default)]
    pub top_picks: Vec<String>,
    #[serde(default)]
    pub avoid: Vec<String>,
    #[serde(default)]
    pub tokens_found: u32,
    #[serde(default)]
    pub scored_tokens: Vec<ScoredToken>,
}

impl ScreenshotAnalysis {
    /// Uppercase token names, one per CRLF-terminated line.
    pub fn keywords(&self) -> String {
        self.scored_tokens
            .iter()
            .map(|t| t.name.to_uppercase())
            .collect::<Vec<_>>()
            .join("\r\n")
    }
}

/// Token record as the model wrote it; scores may be floats or strings.
#[derive(Debug, Deserialize)]
struct RawToken {
    #[serde(default)]
    rank: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAnalysis {
    market_sentiment: String,
    top_picks: Vec<String>,
    avoid: Vec<String>,
    tokens_found: Option<u32>,
    scored_tokens: Vec<Value>,
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse the model's text answer into a [`ScreenshotAnalysis`].
///
/// Scores are clamped to `0..=10`, nameless tokens dropped, and the list
/// ordered by rank (missing ranks go last, in answer order).
pub fn parse_analysis(text: &str) -> Result<ScreenshotAnalysis, FetchError> {
    let raw: RawAnalysis = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| FetchError::transient(format!("scan answer is not valid JSON: {e}")))?;

    let mut ranked: Vec<(Option<u32>, ScoredToken)> = raw
        .scored_tokens
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawToken>(v).ok())
        .filter_map(|t| {
            let name = t.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;
            let rank = number(t.rank.as_ref())
                .filter(|r| r.is_finite() && *r >= 1.0)
                .map(|r| r as u32);
            let score = number(t.score.as_ref())
                .filter(|s| s.is_finite())
                .map(|s| s.round().clamp(0.0, f64::from(MAX_TOKEN_SCORE)) as u8)
                .unwrap_or(0);
            let token = ScoredToken {
                rank: 0,
                name,
                score,
                reason: t.reason.unwrap_or_default(),
            };
            Some((rank, token))
        })
        .collect();
    ranked.sort_by_key(|(rank, _)| rank.unwrap_or(u32::MAX));

    // Unranked tokens continue numbering after the highest explicit rank.
    let mut next_rank = ranked.iter().filter_map(|(rank, _)| *rank).max().unwrap_or(0);
    let tokens: Vec<ScoredToken> = ranked
        .into_iter()
        .map(|(rank, mut token)| {
            token.rank = rank.unwrap_or_else(|| {
                next_rank = next_rank.saturating_add(1);
                next_rank
            });
            token
        })
        .collect();

    let tokens_found = raw.tokens_found.unwrap_or(tokens.len() as u32);
    Ok(ScreenshotAnalysis {
        market_sentiment: raw.market_sentiment,
        top_picks: raw.top_picks,
        avoid: raw.avoid,
        tokens_found,
        scored_tokens: tokens,
    })
}

/// Guess an image MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

pub struct ScreenshotScanner {
    client: GeminiClient,
    prompt: String,
}

impl ScreenshotScanner {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            prompt: DEFAULT_SCAN_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn request_body(&self, image: &[u8], mime: &str) -> Value {
        let data = base64::engine::general_purpose::STANDARD.encode(image);
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "inline_data": { "mime_type": mime, "data": data } },
                    { "text": self.prompt },
                ],
            }],
            "generationConfig": { "responseMimeType": "application/json" },
        })
    }

    pub fn analyze(&self, image: &[u8], mime: &str) -> Result<ScreenshotAnalysis, FetchError> {
        tracing::info!(bytes = image.len(), mime, "scanning screenshot");
        let response = self.client.generate(&self.request_body(image, mime))?;
        let analysis = parse_analysis(&response.text())?;
        tracing::info!(tokens = analysis.scored_tokens.len(), "scan parsed");
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;
    use std::time::Duration;

    #[test]
    fn parses_and_orders_by_rank() {
        let text = r#"```json
        {
          "market_sentiment": "Frothy",
          "top_picks": ["MOON"],
          "avoid": ["RUG"],
          "tokens_found": 3,
          "scored_tokens": [
            {"rank": 2, "name": "rug", "score": 2, "reason": "dev sold"},
            {"rank": 1, "name": "moon", "score": 9.4, "reason": "volume"},
            {"rank": 3, "name": "", "score": 5}
          ]
        }
        ```"#;
        let analysis = parse_analysis(text).unwrap();

        assert_eq!(analysis.market_sentiment, "Frothy");
        assert_eq!(analysis.tokens_found, 3);
        assert_eq!(analysis.scored_tokens.len(), 2);
        assert_eq!(analysis.scored_tokens[0].name, "moon");
        assert_eq!(analysis.scored_tokens[0].score, 9);
        assert!(analysis.scored_tokens[0].is_strong());
        assert!(!analysis.scored_tokens[1].is_strong());
    }

    #[test]
    fn scores_are_clamped() {
        let analysis = parse_analysis(
            r#"{"scored_tokens":[{"rank":1,"name":"a","score":42},{"rank":2,"name":"b","score":"-3"}]}"#,
        )
        .unwrap();
        let scores: Vec<u8> = analysis.scored_tokens.iter().map(|t| t.score).collect();
        assert_eq!(scores, vec![10, 0]);
        assert_eq!(analysis.tokens_found, 2, "falls back to the parsed count");
    }

    #[test]
    fn unranked_tokens_sort_last() {
        let analysis = parse_analysis(
            r#"{"scored_tokens":[{"name":"late"},{"rank":5,"name":"ranked"}]}"#,
        )
        .unwrap();
        assert_eq!(analysis.scored_tokens[0].name, "ranked");
        assert_eq!(analysis.scored_tokens[1].rank, 6);
    }

    #[test]
    fn unranked_tokens_never_reuse_an_explicit_rank() {
        let analysis = parse_analysis(
            r#"{"scored_tokens":[{"rank":1,"name":"a"},{"rank":3,"name":"b"},{"name":"c"},{"name":"d"}]}"#,
        )
        .unwrap();
        let ranks: Vec<u32> = analysis.scored_tokens.iter().map(|t| t.rank).collect();
        assert_eq!(ranks, vec![1, 3, 4, 5]);
    }

    #[test]
    fn prose_is_transient() {
        assert!(matches!(
            parse_analysis("no tokens visible"),
            Err(FetchError::Transient(_))
        ));
    }

    #[test]
    fn keywords_use_crlf() {
        let analysis = parse_analysis(
            r#"{"scored_tokens":[{"rank":1,"name":"moon"},{"rank":2,"name":"pepe"}]}"#,
        )
        .unwrap();
        assert_eq!(analysis.keywords(), "MOON\r\nPEPE");
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for_path(Path::new("shot.PNG")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("shot.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
        assert_eq!(mime_for_path(Path::new("noext")), None);
    }

    #[test]
    fn request_body_inlines_base64_image() {
        let client = GeminiClient::new(
            "http://127.0.0.1:9",
            "vision",
            Credentials::new("TREND_PULSE_TEST_NO_KEY", "/nonexistent/.env"),
            Duration::from_secs(1),
        )
        .unwrap();
        let body = ScreenshotScanner::new(client)
            .with_prompt("rank these")
            .request_body(b"abc", "image/png");
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[0]["inline_data"]["data"], "YWJj");
        assert_eq!(parts[1]["text"], "rank these");
    }
}
