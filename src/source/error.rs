//! Failure taxonomy for trend sources.
//!
//! Sources classify every failure into exactly one [`FetchError`] variant.
//! The scheduler reacts to the variant only; the message is for humans.

use thiserror::Error;

/// Why a fetch did not produce a [`FetchResult`](super::FetchResult).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// No usable credential.  Not retryable until one is supplied.
    #[error("no API key configured")]
    AuthMissing,

    /// The backend is rate-limiting us.  Retryable only after a cooldown.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Anything else: network, server error, unparseable payload.
    #[error("fetch failed: {0}")]
    Transient(String),
}

/// Coarse classification, handy for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthMissing,
    QuotaExceeded,
    Transient,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::AuthMissing => ErrorKind::AuthMissing,
            FetchError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            FetchError::Transient(_) => ErrorKind::Transient,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        FetchError::Transient(message.into())
    }

    /// Classify a non-success HTTP response.
    ///
    /// `api_status` is the symbolic status the API puts in its error body
    /// (`"RESOURCE_EXHAUSTED"`, `"PERMISSION_DENIED"`, ...), and `reason` the
    /// machine-readable reason from the error details (`"API_KEY_INVALID"`).
    pub fn from_http(
        status: u16,
        api_status: Option<&str>,
        reason: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        if status == 429 || api_status == Some("RESOURCE_EXHAUSTED") {
            return FetchError::QuotaExceeded(message);
        }
        if matches!(status, 401 | 403)
            || matches!(api_status, Some("UNAUTHENTICATED" | "PERMISSION_DENIED"))
            || reason == Some("API_KEY_INVALID")
        {
            return FetchError::AuthMissing;
        }
        FetchError::Transient(format!("HTTP {status}: {message}"))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_status_is_quota() {
        let err = FetchError::from_http(429, None, None, "slow down");
        assert_eq!(err, FetchError::QuotaExceeded("slow down".into()));
    }

    #[test]
    fn resource_exhausted_is_quota_even_without_429() {
        let err = FetchError::from_http(400, Some("RESOURCE_EXHAUSTED"), None, "daily cap");
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
    }

    #[test]
    fn forbidden_and_invalid_key_are_auth() {
        assert_eq!(
            FetchError::from_http(403, None, None, "nope").kind(),
            ErrorKind::AuthMissing
        );
        assert_eq!(
            FetchError::from_http(400, Some("INVALID_ARGUMENT"), Some("API_KEY_INVALID"), "bad key")
                .kind(),
            ErrorKind::AuthMissing
        );
    }

    #[test]
    fn everything_else_is_transient() {
        let err = FetchError::from_http(503, Some("UNAVAILABLE"), None, "overloaded");
        assert_eq!(err, FetchError::Transient("HTTP 503: overloaded".into()));
    }
}
