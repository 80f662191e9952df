//! Session error types.

/// Kinds of session errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SessionErrorKind {
    /// Interactive login failed after all retries
    #[display("Login failed: {}", _0)]
    LoginFailed(String),
    /// A stored credential did not pass the verification probe
    #[display("Credential verification failed: {}", _0)]
    VerifyFailed(String),
    /// The credential file could not be read or written
    #[display("Credential storage failed: {}", _0)]
    CredentialIo(String),
    /// No credential is available and acquisition was not permitted
    #[display("Not authenticated")]
    Unauthenticated,
}

/// Session error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Session Error: {} at line {} in {}", kind, line, file)]
pub struct SessionError {
    /// The kind of error that occurred
    pub kind: SessionErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl SessionError {
    /// Create a new session error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SessionErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
