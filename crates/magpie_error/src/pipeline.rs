//! Pipeline error types.

/// Kinds of pipeline errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum PipelineErrorKind {
    /// The run was cancelled before completion
    #[display("Run cancelled")]
    Cancelled,
    /// A stage tripped its circuit breaker
    #[display("Stage '{}' halted after repeated failures", _0)]
    StageHalted(String),
    /// Re-authentication failed after a session expiry mid-run
    #[display("Re-authentication failed: {}", _0)]
    ReauthFailed(String),
}

/// Pipeline error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Pipeline Error: {} at line {} in {}", kind, line, file)]
pub struct PipelineError {
    /// The kind of error that occurred
    pub kind: PipelineErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PipelineError {
    /// Create a new pipeline error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PipelineErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
