//! LLM error types with retry classification.
//!
//! Transient failures (rate limits, 5xx, dropped connections) are retried by
//! the client; everything else surfaces to the agent on the first attempt.

use std::time::Duration;

/// Error from LLM API calls.
#[derive(Debug, Clone)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    /// HTTP status code, if the provider answered at all
    pub status_code: Option<u16>,
    pub message: String,
    /// Delay requested by the provider through `Retry-After`
    pub retry_after: Option<Duration>,
}

impl LlmError {
    fn new(kind: LlmErrorKind, status_code: Option<u16>, message: String) -> Self {
        Self {
            kind,
            status_code,
            message,
            retry_after: None,
        }
    }

    /// Build an error from a non-success HTTP status and response body.
    pub fn from_status(status_code: u16, body: String, retry_after: Option<Duration>) -> Self {
        let mut err = Self::new(classify_http_status(status_code), Some(status_code), body);
        if err.kind == LlmErrorKind::RateLimited {
            err.retry_after = retry_after;
        }
        err
    }

    /// Connection failed, timed out, or the body could not be read.
    pub fn network_error(message: String) -> Self {
        Self::new(LlmErrorKind::NetworkError, None, message)
    }

    /// The provider answered 2xx but the payload was not a completion.
    pub fn parse_error(message: String) -> Self {
        Self::new(LlmErrorKind::ParseError, None, message)
    }

    /// Check if this error is transient and should be retried.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Delay before the given retry attempt (0-based).
    ///
    /// Honors `retry_after`; otherwise exponential backoff from a per-kind
    /// base, capped at 30 seconds.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        let base_secs: u64 = match self.kind {
            LlmErrorKind::RateLimited => 4,
            LlmErrorKind::ServerError => 2,
            _ => 1,
        };

        let delay = base_secs.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_secs(delay.min(30))
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Classification of LLM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429 - retry with backoff
    RateLimited,
    /// 5xx - retry
    ServerError,
    /// 4xx other than 429 (bad request, auth) - permanent
    ClientError,
    /// Connection failure or timeout - retry
    NetworkError,
    /// Unexpected response payload - permanent
    ParseError,
}

impl LlmErrorKind {
    /// Check if this error kind is transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LlmErrorKind::RateLimited => "Rate limited",
            LlmErrorKind::ServerError => "Server error",
            LlmErrorKind::ClientError => "Client error",
            LlmErrorKind::NetworkError => "Network error",
            LlmErrorKind::ParseError => "Parse error",
        };
        f.write_str(label)
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first request
    pub max_retries: u32,
    /// Maximum total time to spend retrying
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            max_retry_duration: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Check if the given error should be retried on this attempt.
    pub fn should_retry(&self, error: &LlmError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_retries
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(401), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(404), LlmErrorKind::ClientError);
    }

    #[test]
    fn test_only_transient_errors_retry() {
        let retry = RetryConfig::default();
        let server = LlmError::from_status(502, "bad gateway".to_string(), None);
        let auth = LlmError::from_status(401, "invalid key".to_string(), None);

        assert!(retry.should_retry(&server, 0));
        assert!(!retry.should_retry(&server, retry.max_retries));
        assert!(!retry.should_retry(&auth, 0));
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let error = LlmError::network_error("reset".to_string());
        assert!(error.suggested_delay(1) > error.suggested_delay(0));
        assert_eq!(error.suggested_delay(20), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_respected_for_rate_limits() {
        let error =
            LlmError::from_status(429, "slow down".to_string(), Some(Duration::from_secs(7)));
        assert_eq!(error.suggested_delay(0), Duration::from_secs(7));
        assert_eq!(error.suggested_delay(3), Duration::from_secs(7));
    }

    #[test]
    fn test_display_includes_status() {
        let error = LlmError::from_status(500, "boom".to_string(), None);
        assert_eq!(error.to_string(), "Server error (HTTP 500): boom");
    }
}
