use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, ExtractorError};
use crate::probe::{scan_stream_headers, ProbeResult};
use super::{CommandOutcome, MediaCommandBuilder, MediaProcessorTrait};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self {
            command_builder: MediaCommandBuilder::new(binary_path),
        }
    }

    pub fn binary_path(&self) -> &str {
        self.command_builder.binary_path()
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn probe_audio_tracks(&self, source: &Path) -> Result<ProbeResult> {
        info!("Probing streams of {}", source.display());

        let mut child = self.command_builder.probe(source).spawn()?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExtractorError::ToolInvocation("missing child stderr".to_string()))?;

        let scanned = scan_stream_headers(stderr).await;
        let result = match scanned {
            Ok(result) => result,
            Err(e) => {
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to terminate probe process: {}", kill_err);
                }
                return Err(ExtractorError::Io(e));
            }
        };

        let status = child.wait().await?;
        debug!("Probe exited with {}", status);

        // `-i` without an output always exits non-zero; only a run that
        // never described a stream counts as a failure.
        if !status.success() && result.stream_count == 0 {
            return Err(ExtractorError::ProbeFailed(format!(
                "{} exited with {} without describing any stream of {}",
                self.binary_path(),
                status,
                source.display()
            )));
        }

        info!(
            "Found {} audio track(s) among {} stream(s)",
            result.audio_track_count, result.stream_count
        );
        Ok(result)
    }

    async fn extract_track(
        &self,
        source: &Path,
        track_index: u32,
        output_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<CommandOutcome> {
        info!("Extracting track {} to {}", track_index, output_path.display());

        let command = self.command_builder.extract_track(source, track_index, output_path);
        let outcome = command.run(cancel).await?;

        match &outcome {
            CommandOutcome::Succeeded => info!("Saved {}", output_path.display()),
            CommandOutcome::Failed { code, stderr_tail } => {
                warn!("Track {} extraction failed with exit code {:?}", track_index, code);
                for line in stderr_tail {
                    warn!("  {}", line);
                }
            }
            CommandOutcome::Cancelled => warn!("Track {} extraction cancelled", track_index),
        }

        Ok(outcome)
    }

    async fn check_availability(&self) -> Result<()> {
        let output = self.command_builder.version_check().capture().await?;

        if output.status.success() {
            info!("Media processor is available");
            Ok(())
        } else {
            Err(ExtractorError::ToolInvocation("Media processor version check failed".to_string()))
        }
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let output = self.command_builder.version_check().capture().await?;

        if output.status.success() {
            let version_info = String::from_utf8_lossy(&output.stdout);
            // Extract the first line which typically contains the version
            let first_line = version_info.lines().next().unwrap_or("Unknown version");
            Ok(first_line.to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ExtractorError::ToolInvocation(format!("Media processor version check failed: {}", stderr)))
        }
    }
}
