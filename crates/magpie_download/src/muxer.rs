//! The external muxer.

use async_trait::async_trait;
use magpie_error::{DownloadError, DownloadErrorKind, MagpieResult};
use magpie_interface::Muxer;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, instrument};

/// How much of the muxer's stderr is retained on failure.
const STDERR_TAIL_BYTES: usize = 2048;

/// FFmpeg-compatible muxer invoked as a child process.
///
/// Runs `<tool> -i <video> -i <audio> -c copy -y <output>`; exit code 0 is
/// success, anything else surfaces as `Merge` with the stderr tail. Muxer
/// failures are never retried automatically.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    tool: String,
}

impl FfmpegMuxer {
    /// Create a muxer around the given executable.
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    #[instrument(skip(self), fields(tool = %self.tool, output = %output.display()))]
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> MagpieResult<()> {
        let result = Command::new(&self.tool)
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .arg("-c")
            .arg("copy")
            .arg("-y")
            .arg(output)
            .output()
            .await
            .map_err(|e| {
                DownloadError::new(DownloadErrorKind::Merge {
                    tool: self.tool.clone(),
                    exit_code: None,
                    stderr_tail: format!("failed to spawn: {}", e),
                })
            })?;

        if !result.status.success() {
            return Err(DownloadError::new(DownloadErrorKind::Merge {
                tool: self.tool.clone(),
                exit_code: result.status.code(),
                stderr_tail: stderr_tail(&result.stderr),
            })
            .into());
        }
        debug!("Mux succeeded");
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Drop a fake muxer script into `dir` and return its path.
    fn fake_tool(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_successful_mux_writes_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let video = dir.path().join("a.video.part");
        let audio = dir.path().join("a.audio.part");
        let output = dir.path().join("a.mp4");
        std::fs::write(&video, b"VIDEO").unwrap();
        std::fs::write(&audio, b"AUDIO").unwrap();

        // Args: -i <video> -i <audio> -c copy -y <output>
        let tool = fake_tool(dir.path(), "cat \"$2\" \"$4\" > \"$8\"");
        let muxer = FfmpegMuxer::new(tool);
        muxer.mux(&video, &audio, &output).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"VIDEOAUDIO");
    }

    #[tokio::test]
    async fn test_failure_captures_exit_code_and_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let video = dir.path().join("a.video.part");
        let audio = dir.path().join("a.audio.part");
        std::fs::write(&video, b"V").unwrap();
        std::fs::write(&audio, b"A").unwrap();

        let tool = fake_tool(dir.path(), "echo 'stream mismatch' >&2; exit 3");
        let muxer = FfmpegMuxer::new(tool.clone());
        let err = muxer
            .mux(&video, &audio, &dir.path().join("a.mp4"))
            .await
            .unwrap_err();

        match err.kind() {
            magpie_error::MagpieErrorKind::Download(d) => match &d.kind {
                DownloadErrorKind::Merge {
                    tool: t,
                    exit_code,
                    stderr_tail,
                } => {
                    assert_eq!(t, &tool);
                    assert_eq!(*exit_code, Some(3));
                    assert!(stderr_tail.contains("stream mismatch"));
                }
                other => panic!("unexpected kind: {other:?}"),
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
