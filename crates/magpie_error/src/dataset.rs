//! Dataset store error types.

/// Kinds of dataset errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum DatasetErrorKind {
    /// `attach_media` was called for an item with no metadata file
    #[display("No metadata file for item '{}'", _0)]
    MetadataMissing(String),
    /// The index could not be persisted; in-memory state was rolled back
    #[display("Index commit failed: {}", _0)]
    CommitFailed(String),
    /// An item identifier is unusable as a file name
    #[display("Invalid item id: {}", _0)]
    InvalidId(String),
    /// Failed to create a dataset directory
    #[display("Failed to create dataset directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to write a dataset file
    #[display("Failed to write file: {}", _0)]
    FileWrite(String),
    /// Failed to read a dataset file
    #[display("Failed to read file: {}", _0)]
    FileRead(String),
}

/// Dataset error with location tracking.
///
/// # Examples
///
/// ```
/// use magpie_error::{DatasetError, DatasetErrorKind};
///
/// let err = DatasetError::new(DatasetErrorKind::MetadataMissing("BV1xx".into()));
/// assert!(format!("{}", err).contains("No metadata file"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Dataset Error: {} at line {} in {}", kind, line, file)]
pub struct DatasetError {
    /// The kind of error that occurred
    pub kind: DatasetErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl DatasetError {
    /// Create a new dataset error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: DatasetErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
