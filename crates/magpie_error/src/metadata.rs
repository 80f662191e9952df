//! Metadata collection error types.

/// Kinds of metadata errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum MetadataErrorKind {
    /// A required field was absent from the detail document
    #[display("Missing required field '{}'", _0)]
    MissingField(String),
    /// A field was present but failed validation
    #[display("Invalid field '{}': {}", field, reason)]
    InvalidField {
        /// Name of the offending field
        field: String,
        /// Why validation rejected it
        reason: String,
    },
}

/// Metadata error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Metadata Error: {} at line {} in {}", kind, line, file)]
pub struct MetadataError {
    /// The kind of error that occurred
    pub kind: MetadataErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl MetadataError {
    /// Create a new metadata error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: MetadataErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
