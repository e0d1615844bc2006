use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, ExtractorError};
use crate::extract::{ExtractionReport, SourceMedia};
use crate::media::MediaProcessorTrait;
use crate::pipeline::Pipeline;
use crate::probe::ProbeResult;
use crate::report::{ConsoleReporter, DisplayConfig};

/// Outcome of a directory run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub processed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

pub struct Workflow {
    media: Arc<dyn MediaProcessorTrait>,
    display: DisplayConfig,
}

impl Workflow {
    pub fn new(media: Arc<dyn MediaProcessorTrait>, display: DisplayConfig) -> Self {
        Self { media, display }
    }

    /// Count the audio tracks of a single file
    pub async fn probe<P: AsRef<Path>>(&self, input_path: P) -> Result<ProbeResult> {
        let source = SourceMedia::new(input_path)?;
        self.media.probe_audio_tracks(source.path()).await
    }

    /// Extract every audio track of one file into `output_dir`
    pub async fn extract<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_dir: Q,
        cancel: &CancellationToken,
    ) -> Result<ExtractionReport> {
        let input_path = input_path.as_ref();
        info!("Processing single file: {}", input_path.display());

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let reporter = tokio::spawn(ConsoleReporter::new(&self.display).run(events_rx));

        let mut pipeline = Pipeline::new(self.media.clone(), events_tx);
        let result = match pipeline.load_source(input_path).await {
            Ok(_) => {
                let done = pipeline.spawn_extraction(output_dir.as_ref().to_path_buf(), cancel.clone());
                done.await.unwrap_or_else(|_| {
                    Err(ExtractorError::ToolInvocation("extraction task ended unexpectedly".to_string()))
                })
            }
            Err(e) => {
                drop(pipeline);
                Err(e)
            }
        };

        match reporter.await {
            Ok(summary) => debug!("Reporter summary: {:?}", summary),
            Err(e) => warn!("Reporter task failed: {}", e),
        }

        result
    }

    /// Extract every `.mkv` below `input_dir` into `<output_dir>/<file stem>/`
    pub async fn process_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Q,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary> {
        let input_dir = input_dir.as_ref();
        let output_dir = output_dir.as_ref();
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(ExtractorError::InvalidPath(format!(
                "{} is not a directory",
                input_dir.display()
            )));
        }

        let video_files = find_mkv_files(input_dir);
        info!("Found {} video files to process", video_files.len());

        let mut summary = BatchSummary::default();
        for video_path in video_files {
            if cancel.is_cancelled() {
                warn!("Batch cancelled");
                break;
            }

            let stem = video_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "video".to_string());
            let target = output_dir.join(stem);
            fs::create_dir_all(&target).await?;

            let outcome = self
                .extract(&video_path, &target, cancel)
                .await
                .and_then(ExtractionReport::into_result);
            match outcome {
                Ok(_) => {
                    info!("Successfully processed: {}", video_path.display());
                    summary.processed.push(video_path);
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", video_path.display(), e);
                    summary.failed.push(video_path);
                }
            }
        }

        Ok(summary)
    }
}

/// `.mkv` files below `dir`, sorted for a stable processing order.
fn find_mkv_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mkv"))
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}
