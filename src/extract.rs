//! Sequential per-track extraction.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Result, ExtractorError};
use crate::media::{CommandOutcome, MediaProcessorTrait};

/// A source file that has passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMedia {
    path: PathBuf,
}

impl SourceMedia {
    /// Accepts only a non-empty path to an existing regular file.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ExtractorError::InvalidPath("source path is empty".to_string()));
        }
        if !path.is_file() {
            return Err(ExtractorError::InvalidPath(format!(
                "source {} does not exist or is not a file",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Check that `dir` is an existing, writable directory.
pub fn validate_destination<P: AsRef<Path>>(dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    if dir.as_os_str().is_empty() {
        return Err(ExtractorError::InvalidPath("destination path is empty".to_string()));
    }

    let metadata = std::fs::metadata(dir).map_err(|e| {
        ExtractorError::InvalidPath(format!("destination {}: {}", dir.display(), e))
    })?;
    if !metadata.is_dir() {
        return Err(ExtractorError::InvalidPath(format!(
            "destination {} is not a directory",
            dir.display()
        )));
    }
    if metadata.permissions().readonly() {
        return Err(ExtractorError::InvalidPath(format!(
            "destination {} is read-only",
            dir.display()
        )));
    }

    Ok(dir.to_path_buf())
}

/// Output location of a track: `<destination>/output_<index>.mp4`.
pub fn output_path(destination: &Path, track_index: u32) -> PathBuf {
    destination.join(format!("output_{}.mp4", track_index))
}

/// One file written by a successful extraction step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputArtifact {
    pub track_index: u32,
    pub path: PathBuf,
}

/// Extraction of every audio track of one source into one directory.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    source: SourceMedia,
    destination: PathBuf,
    track_count: u32,
    completed_tracks: u32,
}

impl ExtractionJob {
    pub fn new(source: SourceMedia, destination: PathBuf, track_count: u32) -> Self {
        Self {
            source,
            destination,
            track_count,
            completed_tracks: 0,
        }
    }

    pub fn source(&self) -> &SourceMedia {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn track_count(&self) -> u32 {
        self.track_count
    }

    pub fn completed_tracks(&self) -> u32 {
        self.completed_tracks
    }

    /// Fraction of tracks attempted so far.
    pub fn progress(&self) -> f64 {
        if self.track_count == 0 {
            1.0
        } else {
            self.completed_tracks as f64 / self.track_count as f64
        }
    }

    fn mark_completed(&mut self) {
        debug_assert!(self.completed_tracks < self.track_count);
        self.completed_tracks += 1;
    }
}

/// Aggregate result of an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    pub artifacts: Vec<OutputArtifact>,
    pub failed_indices: Vec<u32>,
    pub cancelled: bool,
}

impl ExtractionReport {
    pub fn success_count(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed_indices.is_empty() && !self.cancelled
    }

    /// Turn a report with failed tracks into `PartialExtraction`.
    pub fn into_result(self) -> Result<Self> {
        if self.cancelled {
            Err(ExtractorError::Cancelled)
        } else if !self.failed_indices.is_empty() {
            Err(ExtractorError::PartialExtraction {
                failed_indices: self.failed_indices,
            })
        } else {
            Ok(self)
        }
    }
}

pub struct ExtractionEngine<'a> {
    media: &'a dyn MediaProcessorTrait,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(media: &'a dyn MediaProcessorTrait) -> Self {
        Self { media }
    }

    /// Extract tracks `1..=track_count` in ascending order, one process at a
    /// time. A failing track does not stop the run. `on_progress` receives
    /// `completed / track_count` after each attempt.
    pub async fn run<F>(
        &self,
        job: &mut ExtractionJob,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<ExtractionReport>
    where
        F: FnMut(f64) + Send,
    {
        info!(
            "Extracting {} track(s) from {} into {}",
            job.track_count,
            job.source.path().display(),
            job.destination.display()
        );

        let mut report = ExtractionReport::default();

        for track_index in 1..=job.track_count {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let path = output_path(&job.destination, track_index);
            let outcome = self
                .media
                .extract_track(job.source.path(), track_index, &path, cancel)
                .await?;

            match outcome {
                CommandOutcome::Succeeded => {
                    report.artifacts.push(OutputArtifact { track_index, path });
                }
                CommandOutcome::Failed { .. } => report.failed_indices.push(track_index),
                CommandOutcome::Cancelled => {
                    report.cancelled = true;
                    break;
                }
            }

            job.mark_completed();
            on_progress(job.progress());
        }

        if report.cancelled {
            warn!(
                "Extraction cancelled after {} of {} track(s)",
                job.completed_tracks, job.track_count
            );
        } else if report.failed_indices.is_empty() {
            info!("Extracted {} track(s)", report.success_count());
        } else {
            warn!(
                "Extracted {} track(s), failed: {:?}",
                report.success_count(),
                report.failed_indices
            );
        }

        Ok(report)
    }
}
