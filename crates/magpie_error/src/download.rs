//! Download and muxing error types.

/// Kinds of download errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum DownloadErrorKind {
    /// No stream variant exists for the item at any quality
    #[display("No stream available at quality {} or below", requested)]
    QualityUnavailable {
        /// The quality code the caller asked for
        requested: u32,
    },
    /// Free space or the dataset size cap would be exceeded
    #[display("Disk full: need {} bytes, {} available", needed, available)]
    DiskFull {
        /// Bytes of headroom required before the download starts
        needed: u64,
        /// Bytes actually available
        available: u64,
    },
    /// The downloaded byte count disagrees with the advertised length
    #[display("Length mismatch: expected {} bytes, got {}", expected, actual)]
    LengthMismatch {
        /// Bytes the server advertised
        expected: u64,
        /// Bytes on disk after the transfer
        actual: u64,
    },
    /// The external muxer exited non-zero
    #[display("Muxer '{}' failed with exit code {:?}", tool, exit_code)]
    Merge {
        /// Muxer executable that was invoked
        tool: String,
        /// Exit code, if the process was not killed by a signal
        exit_code: Option<i32>,
        /// Tail of the muxer's stderr output
        stderr_tail: String,
    },
    /// Filesystem failure while writing a partial file
    #[display("Download I/O failed: {}", _0)]
    Io(String),
}

/// Download error with location tracking.
///
/// # Examples
///
/// ```
/// use magpie_error::{DownloadError, DownloadErrorKind};
///
/// let err = DownloadError::new(DownloadErrorKind::DiskFull {
///     needed: 16 * 1024 * 1024,
///     available: 1024,
/// });
/// assert!(format!("{}", err).contains("Disk full"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Download Error: {} at line {} in {}", kind, line, file)]
pub struct DownloadError {
    /// The kind of error that occurred
    pub kind: DownloadErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl DownloadError {
    /// Create a new download error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: DownloadErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Whether another download attempt is worthwhile.
    ///
    /// Mux failures and disk exhaustion are final for the item; partial
    /// transfers and length mismatches are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DownloadErrorKind::LengthMismatch { .. } | DownloadErrorKind::Io(_)
        )
    }
}
