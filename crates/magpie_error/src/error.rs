//! Top-level error wrapper types.

use crate::{
    ConfigError, DatasetError, DatasetErrorKind, DownloadError, DownloadErrorKind, FailureKind,
    JsonError, MaintenanceError, MetadataError, PipelineError, PipelineErrorKind, SearchError,
    SearchErrorKind, SessionError, TransportError, TransportErrorKind,
};

/// The foundation error enum. One variant per magpie concern.
///
/// # Examples
///
/// ```
/// use magpie_error::{MagpieError, TransportError, TransportErrorKind};
///
/// let t = TransportError::new(TransportErrorKind::NotFound);
/// let err: MagpieError = t.into();
/// assert!(format!("{}", err).contains("Transport Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum MagpieErrorKind {
    /// Rate-limited transport error
    #[from(TransportError)]
    Transport(TransportError),
    /// Session manager error
    #[from(SessionError)]
    Session(SessionError),
    /// Search engine error
    #[from(SearchError)]
    Search(SearchError),
    /// Metadata collector error
    #[from(MetadataError)]
    Metadata(MetadataError),
    /// Stream downloader error
    #[from(DownloadError)]
    Download(DownloadError),
    /// Dataset store error
    #[from(DatasetError)]
    Dataset(DatasetError),
    /// Maintenance engine error
    #[from(MaintenanceError)]
    Maintenance(MaintenanceError),
    /// Pipeline orchestration error
    #[from(PipelineError)]
    Pipeline(PipelineError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
}

/// Magpie error with kind discrimination.
///
/// # Examples
///
/// ```
/// use magpie_error::{MagpieResult, ConfigError};
///
/// fn might_fail() -> MagpieResult<()> {
///     Err(ConfigError::new("missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Magpie Error: {}", _0)]
pub struct MagpieError(Box<MagpieErrorKind>);

impl MagpieError {
    /// Create a new error from a kind.
    pub fn new(kind: MagpieErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &MagpieErrorKind {
        &self.0
    }

    /// Classify this error for the run-level aggregate.
    pub fn failure_kind(&self) -> FailureKind {
        match self.kind() {
            MagpieErrorKind::Transport(t) => match &t.kind {
                TransportErrorKind::NetworkUnavailable(_) => FailureKind::NetworkUnavailable,
                TransportErrorKind::AuthExpired => FailureKind::AuthExpired,
                TransportErrorKind::RateLimited { .. } => FailureKind::RateLimited,
                TransportErrorKind::Transient(_) => FailureKind::Transient,
                TransportErrorKind::Remote { .. } | TransportErrorKind::Decode(_) => {
                    FailureKind::RemoteError
                }
                TransportErrorKind::NotFound => FailureKind::NotFound,
            },
            MagpieErrorKind::Session(_) => FailureKind::SessionFailed,
            MagpieErrorKind::Search(s) => match &s.kind {
                SearchErrorKind::AllPagesFailed(_) => FailureKind::SearchFailed,
                SearchErrorKind::MalformedPage(_) => FailureKind::RemoteError,
            },
            MagpieErrorKind::Metadata(_) => FailureKind::RemoteError,
            MagpieErrorKind::Download(d) => match &d.kind {
                DownloadErrorKind::QualityUnavailable { .. } => FailureKind::QualityUnavailable,
                DownloadErrorKind::DiskFull { .. } => FailureKind::DiskFull,
                DownloadErrorKind::Merge { .. } => FailureKind::MergeError,
                DownloadErrorKind::LengthMismatch { .. } | DownloadErrorKind::Io(_) => {
                    FailureKind::Transient
                }
            },
            MagpieErrorKind::Dataset(d) => match &d.kind {
                DatasetErrorKind::CommitFailed(_) => FailureKind::CommitFailed,
                _ => FailureKind::Other,
            },
            MagpieErrorKind::Pipeline(p) => match &p.kind {
                PipelineErrorKind::ReauthFailed(_) => FailureKind::AuthExpired,
                _ => FailureKind::Other,
            },
            MagpieErrorKind::Maintenance(_)
            | MagpieErrorKind::Config(_)
            | MagpieErrorKind::Json(_) => FailureKind::Other,
        }
    }
}

// Generic From implementation for any type that converts to MagpieErrorKind
impl<T> From<T> for MagpieError
where
    T: Into<MagpieErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for magpie operations.
///
/// # Examples
///
/// ```
/// use magpie_error::{MagpieResult, JsonError};
///
/// fn parse() -> MagpieResult<()> {
///     Err(JsonError::new("unexpected end of input"))?
/// }
/// ```
pub type MagpieResult<T> = std::result::Result<T, MagpieError>;
