//! Run-level failure classification.

/// The failure classes tallied in the aggregate run report.
///
/// Every [`MagpieError`](crate::MagpieError) maps onto exactly one of these
/// via [`MagpieError::failure_kind`](crate::MagpieError::failure_kind). The
/// string form (via `strum`) is the key used in `errors_by_kind`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::IntoStaticStr,
)]
pub enum FailureKind {
    /// Network pre-check failed; the run aborts
    NetworkUnavailable,
    /// Session rejected; triggers a single re-auth attempt
    AuthExpired,
    /// Remote throttling that was (or would be) retried with a delay
    RateLimited,
    /// Retryable network failure that exhausted its retries
    Transient,
    /// Unclassified remote error code
    RemoteError,
    /// Item does not exist on the remote
    NotFound,
    /// Requested quality missing; the item was downgraded
    QualityUnavailable,
    /// Free space or size cap exhausted
    DiskFull,
    /// The external muxer failed
    MergeError,
    /// An index commit failed and was rolled back
    CommitFailed,
    /// Every page of a keyword search failed
    SearchFailed,
    /// Session acquisition or persistence failed
    SessionFailed,
    /// Anything that does not fit the classes above
    Other,
}
