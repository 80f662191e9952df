//! The external media probe.

use async_trait::async_trait;
use magpie_error::{MagpieResult, MaintenanceError, MaintenanceErrorKind};
use magpie_interface::MediaProber;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// FFprobe-compatible duration probe invoked as a child process.
///
/// Used by the duration filter when a metadata record carries no usable
/// duration. An unparseable or failing probe yields `None` - the item is
/// reported as undetermined rather than removed.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    tool: String,
}

impl FfprobeProber {
    /// Create a prober around the given executable.
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn duration_seconds(&self, media: &Path) -> MagpieResult<Option<f64>> {
        let result = Command::new(&self.tool)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(media)
            .output()
            .await
            .map_err(|e| {
                MaintenanceError::new(MaintenanceErrorKind::ProbeFailed(format!(
                    "failed to spawn {}: {}",
                    self.tool, e
                )))
            })?;

        if !result.status.success() {
            warn!(
                media = %media.display(),
                exit_code = ?result.status.code(),
                "Media probe exited non-zero"
            );
            return Ok(None);
        }

        let raw = String::from_utf8_lossy(&result.stdout);
        let duration = raw.trim().parse::<f64>().ok().filter(|d| d.is_finite());
        debug!(media = %media.display(), ?duration, "Probed duration");
        Ok(duration)
    }
}
