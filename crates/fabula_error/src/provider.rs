//! Provider-specific error types and retry logic.
//!
//! The three outbound model providers (text, image, audio) share one error
//! taxonomy: `Transient` failures are worth retrying, `BadRequest` means the
//! request we built was rejected, and `UpstreamMalformed` means the provider
//! answered 2xx with a body we could not use.

/// HTTP status codes that indicate a retriable upstream condition.
pub fn retryable_status(status_code: u16) -> bool {
    matches!(status_code, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Provider error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ProviderErrorKind {
    /// API key not found in environment
    #[display("{} API key environment variable not set", _0)]
    MissingApiKey(String),
    /// Failed to construct the HTTP client
    #[display("Failed to create provider client: {}", _0)]
    ClientCreation(String),
    /// Network failure, timeout, or retriable HTTP status
    #[display("Transient provider error: {}", _0)]
    Transient(String),
    /// Non-retriable client error (4xx other than 408/429)
    #[display("Provider rejected request with HTTP {}: {}", status_code, message)]
    BadRequest {
        /// HTTP status code
        status_code: u16,
        /// Error message from the provider
        message: String,
    },
    /// Successful HTTP response with an unusable body
    #[display("Malformed provider response: {}", _0)]
    UpstreamMalformed(String),
}

impl ProviderErrorKind {
    /// Check if this error type should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::Transient(_) | ProviderErrorKind::UpstreamMalformed(_)
        )
    }

    /// Get retry strategy parameters for this error type.
    ///
    /// Returns `(initial_backoff_ms, max_retries, max_delay_secs)`.
    pub fn retry_strategy_params(&self) -> (u64, usize, u64) {
        match self {
            ProviderErrorKind::Transient(_) => (500, 2, 8),
            // A 2xx body that fails to parse is retried once, then surfaced.
            ProviderErrorKind::UpstreamMalformed(_) => (500, 1, 8),
            _ => (500, 0, 8),
        }
    }
}

/// Provider error with source location tracking.
///
/// # Examples
///
/// ```
/// use fabula_error::{ProviderError, ProviderErrorKind};
///
/// let err = ProviderError::new(ProviderErrorKind::MissingApiKey("OPENROUTER".into()));
/// assert!(format!("{}", err).contains("OPENROUTER"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Provider Error: {} at line {} in {}", kind, line, file)]
pub struct ProviderError {
    /// The kind of error that occurred
    pub kind: ProviderErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ProviderError {
    /// Create a new ProviderError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ProviderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Classify an HTTP response status into a provider error.
    ///
    /// Retriable statuses (408, 429, 5xx) become `Transient`; everything else
    /// becomes `BadRequest`.
    #[track_caller]
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if retryable_status(status_code) {
            Self::new(ProviderErrorKind::Transient(format!(
                "HTTP {}: {}",
                status_code, message
            )))
        } else {
            Self::new(ProviderErrorKind::BadRequest {
                status_code,
                message,
            })
        }
    }
}

/// Trait for errors that support retry logic.
///
/// Transient errors like 503 (service unavailable), 429 (rate limit), or
/// network timeouts should return true. Permanent errors like 401
/// (unauthorized) or 400 (bad request) should return false.
///
/// # Examples
///
/// ```
/// use fabula_error::{ProviderError, ProviderErrorKind, RetryableError};
///
/// let err = ProviderError::from_status(503, "Service unavailable");
/// assert!(err.is_retryable());
/// let (backoff, retries, max_delay) = err.retry_strategy_params();
/// assert_eq!(backoff, 500);
/// assert_eq!(retries, 2);
/// ```
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;

    /// Get retry strategy parameters for this error.
    ///
    /// Returns `(initial_backoff_ms, max_retries, max_delay_secs)`.
    fn retry_strategy_params(&self) -> (u64, usize, u64) {
        (500, 2, 8)
    }
}

impl RetryableError for ProviderError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn retry_strategy_params(&self) -> (u64, usize, u64) {
        self.kind.retry_strategy_params()
    }
}
