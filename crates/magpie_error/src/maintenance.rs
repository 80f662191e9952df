//! Maintenance error types.

/// Kinds of maintenance errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum MaintenanceErrorKind {
    /// The external media probe could not determine a duration
    #[display("Media probe failed: {}", _0)]
    ProbeFailed(String),
    /// A dataset enumeration pass failed mid-way
    #[display("Dataset scan failed: {}", _0)]
    ScanFailed(String),
}

/// Maintenance error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Maintenance Error: {} at line {} in {}", kind, line, file)]
pub struct MaintenanceError {
    /// The kind of error that occurred
    pub kind: MaintenanceErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl MaintenanceError {
    /// Create a new maintenance error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: MaintenanceErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
