//! Typed errors for the collection pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match
//! on failure kinds, in particular to decide retryability.

use thiserror::Error;

/// Errors raised while fetching a list page or a job detail page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Navigation did not complete within the configured timeout.
    #[error("navigation timeout: {url}")]
    Timeout { url: String },

    /// Transport-level HTTP failure (connection reset, DNS, TLS, 5xx).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The session's underlying connection was closed mid-flight.
    #[error("session closed")]
    SessionClosed,

    /// The site answered with an authentication or interstitial wall.
    #[error("blocked by interstitial: {url}")]
    Blocked { url: String },

    /// Navigation landed outside the expected job-detail path family.
    #[error("redirected away from job detail: {from} -> {to}")]
    Redirected { from: String, to: String },

    /// The page loaded but none of the known content containers appeared.
    #[error("no recognizable content: {url}")]
    NoContent { url: String },

    /// A listing carried neither a deep link nor a fallback link.
    #[error("listing has no usable link")]
    MissingLink,

    /// URL could not be parsed or built.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// Whether this failure is in the transient whitelist and may be retried.
    ///
    /// Blocked, redirected, no-content and structural failures are terminal:
    /// retrying them re-fetches the same wall or the same empty shell.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout { .. } | FetchError::Network(_) | FetchError::SessionClosed
        )
    }
}

/// Errors raised by archive storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage backend unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Errors raised by notification sinks.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("delivery failed: {0}")]
    Delivery(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("sink rejected message: {reason}")]
    Rejected { reason: String },
}

/// Top-level pipeline errors.
///
/// Per-job and per-batch failures never surface here; they are folded into
/// run summaries. Only failures that prevent a run from starting at all
/// (building the session pool) or boundary serialization problems do.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, CollectError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_whitelist() {
        assert!(FetchError::Timeout {
            url: "https://example.com".into()
        }
        .is_retryable());
        assert!(FetchError::SessionClosed.is_retryable());

        assert!(!FetchError::Blocked {
            url: "https://example.com".into()
        }
        .is_retryable());
        assert!(!FetchError::Redirected {
            from: "a".into(),
            to: "b".into()
        }
        .is_retryable());
        assert!(!FetchError::MissingLink.is_retryable());
    }
}
