// Media tool abstraction
//
// - Processor: ffmpeg-backed implementation of the trait below
// - Commands: command builders and subprocess execution

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use commands::*;
pub use processor::*;

use crate::error::Result;
use crate::probe::ProbeResult;

/// Operations the extraction pipeline needs from the external media tool
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Count the audio streams of a source file
    async fn probe_audio_tracks(&self, source: &Path) -> Result<ProbeResult>;

    /// Write absolute stream `track_index` of `source` to `output_path`
    async fn extract_track(
        &self,
        source: &Path,
        track_index: u32,
        output_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<CommandOutcome>;

    /// Check if media processor is available
    async fn check_availability(&self) -> Result<()>;

    /// Get media processor version information
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(binary_path: impl Into<String>) -> Arc<dyn MediaProcessorTrait> {
        Arc::new(processor::MediaProcessorImpl::new(binary_path))
    }
}
