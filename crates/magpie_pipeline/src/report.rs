//! The aggregate run report.

use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// What one pipeline run accomplished.
///
/// The only globally ordered output of a run; everything per-item happens
/// concurrently and is visible here only as counts.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Correlation id for the run's log records
    pub run_id: Uuid,
    /// Keywords whose search completed
    pub keywords_processed: usize,
    /// Candidates that survived search filtering and de-duplication
    pub candidates_seen: u64,
    /// Metadata records committed
    pub metadata_committed: u64,
    /// Media files downloaded, muxed, and attached
    pub downloads_committed: u64,
    /// Downloads skipped by the pre-download duration filter
    pub downloads_skipped_by_duration: u64,
    /// Items delivered at a quality other than the requested one
    pub quality_downgrades: u64,
    /// Items skipped because a complete pair already existed
    pub skipped_existing: u64,
    /// Per-kind counts of every per-item failure, including ones that
    /// later succeeded on retry at a higher level
    pub errors_by_kind: BTreeMap<String, u64>,
    /// Stages that stopped early (circuit breaker, disk exhaustion)
    pub stages_halted: Vec<String>,
}
