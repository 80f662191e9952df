//! Search error types.

/// Kinds of search errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SearchErrorKind {
    /// Every page request for a keyword failed after retries
    #[display("All pages failed for keyword '{}'", _0)]
    AllPagesFailed(String),
    /// The remote returned a page the engine could not interpret
    #[display("Malformed search page: {}", _0)]
    MalformedPage(String),
}

/// Search error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Search Error: {} at line {} in {}", kind, line, file)]
pub struct SearchError {
    /// The kind of error that occurred
    pub kind: SearchErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl SearchError {
    /// Create a new search error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SearchErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
