//! Transport error types.

use std::time::Duration;

/// Kinds of transport errors.
///
/// Every outbound call is classified into exactly one of these so that the
/// retry layer and the pipeline can react without inspecting messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TransportErrorKind {
    /// The network pre-check failed for every probe host
    #[display("Network unavailable: {}", _0)]
    NetworkUnavailable(String),
    /// The remote rejected the session; re-authentication is required
    #[display("Session expired or rejected")]
    AuthExpired,
    /// The remote asked us to slow down
    #[display("Rate limited, retry after {:?}", retry_after)]
    RateLimited {
        /// Server-supplied retry delay, if any
        retry_after: Option<Duration>,
    },
    /// Network or timeout failure that is worth retrying
    #[display("Transient transport failure: {}", _0)]
    Transient(String),
    /// Non-2xx response outside the recognized classes
    #[display("Remote error {}: {}", code, message)]
    Remote {
        /// Status or service-level error code
        code: i64,
        /// Error message reported by the remote
        message: String,
    },
    /// The requested resource does not exist
    #[display("Not found")]
    NotFound,
    /// The response body could not be decoded into the expected shape
    #[display("Failed to decode response: {}", _0)]
    Decode(String),
}

impl TransportErrorKind {
    /// Whether the retry layer should attempt this call again.
    ///
    /// `AuthExpired` is deliberately not retryable here: it must surface so
    /// the session manager can re-authenticate before the caller re-issues.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportErrorKind::RateLimited { .. } | TransportErrorKind::Transient(_)
        )
    }
}

/// Transport error with location tracking.
///
/// # Examples
///
/// ```
/// use magpie_error::{TransportError, TransportErrorKind};
///
/// let err = TransportError::new(TransportErrorKind::NotFound);
/// assert!(format!("{}", err).contains("Not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Transport Error: {} at line {} in {}", kind, line, file)]
pub struct TransportError {
    /// The kind of error that occurred
    pub kind: TransportErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl TransportError {
    /// Create a new transport error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: TransportErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Whether the retry layer should attempt this call again.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
