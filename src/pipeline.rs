//! Probe → destination → extract sequencing, reported through events.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, ExtractorError};
use crate::extract::{validate_destination, ExtractionEngine, ExtractionJob, ExtractionReport, SourceMedia};
use crate::media::MediaProcessorTrait;
use crate::probe::ProbeResult;

/// Events delivered to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    InvalidPath(String),
    ProbeComplete(u32),
    Progress(f64),
    ExtractionComplete {
        success_count: usize,
        failed_indices: Vec<u32>,
        /// Stopped before every track was attempted
        cancelled: bool,
    },
    FatalError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Validating,
    Probing,
    AwaitingDestination,
    Extracting,
    Done,
    Error,
}

pub struct Pipeline {
    media: Arc<dyn MediaProcessorTrait>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    state: PipelineState,
    source: Option<SourceMedia>,
    probe: Option<ProbeResult>,
}

impl Pipeline {
    pub fn new(media: Arc<dyn MediaProcessorTrait>, events: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self {
            media,
            events,
            state: PipelineState::Idle,
            source: None,
            probe: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn probe_result(&self) -> Option<ProbeResult> {
        self.probe
    }

    fn emit(&self, event: PipelineEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: ExtractorError) -> ExtractorError {
        match &err {
            ExtractorError::InvalidPath(reason) => {
                warn!("{}", reason);
                self.emit(PipelineEvent::InvalidPath(reason.clone()));
            }
            other => {
                error!("{}", other);
                self.emit(PipelineEvent::FatalError(other.to_string()));
            }
        }
        self.source = None;
        self.probe = None;
        self.transition(PipelineState::Error);
        err
    }

    fn expect_state(&self, expected: PipelineState) -> Result<()> {
        if self.state != expected {
            return Err(ExtractorError::Config(format!(
                "pipeline is {:?}, expected {:?}",
                self.state, expected
            )));
        }
        Ok(())
    }

    /// Validate and probe a source; on success the pipeline awaits a destination.
    pub async fn load_source<P: AsRef<Path>>(&mut self, path: P) -> Result<ProbeResult> {
        self.expect_state(PipelineState::Idle)?;
        self.transition(PipelineState::Validating);

        let source = match SourceMedia::new(path) {
            Ok(source) => source,
            Err(e) => return Err(self.fail(e)),
        };

        self.transition(PipelineState::Probing);
        let probe = match self.media.probe_audio_tracks(source.path()).await {
            Ok(probe) => probe,
            Err(e) => return Err(self.fail(e)),
        };

        info!("{} audio track(s) in {}", probe.audio_track_count, source.path().display());
        self.emit(PipelineEvent::ProbeComplete(probe.audio_track_count));
        self.source = Some(source);
        self.probe = Some(probe);
        self.transition(PipelineState::AwaitingDestination);
        Ok(probe)
    }

    /// Return to Idle after an error has been shown.
    pub fn acknowledge_error(&mut self) {
        if self.state == PipelineState::Error {
            self.transition(PipelineState::Idle);
        }
    }

    /// Extract every probed track into `destination`, then reset to Idle.
    pub async fn extract_to<P: AsRef<Path>>(
        &mut self,
        destination: P,
        cancel: &CancellationToken,
    ) -> Result<ExtractionReport> {
        self.expect_state(PipelineState::AwaitingDestination)?;

        let destination = match validate_destination(destination) {
            Ok(dir) => dir,
            Err(e) => return Err(self.fail(e)),
        };

        let (source, probe) = match (self.source.take(), self.probe.take()) {
            (Some(source), Some(probe)) => (source, probe),
            _ => {
                return Err(self.fail(ExtractorError::Config("no probed source".to_string())));
            }
        };

        self.transition(PipelineState::Extracting);
        let mut job = ExtractionJob::new(source, destination, probe.audio_track_count);
        let events = self.events.clone();
        let outcome = ExtractionEngine::new(self.media.as_ref())
            .run(&mut job, cancel, |fraction| {
                if events.send(PipelineEvent::Progress(fraction)).is_err() {
                    debug!("Event receiver dropped");
                }
            })
            .await;

        let report = match outcome {
            Ok(report) => report,
            Err(e) => return Err(self.fail(e)),
        };

        self.transition(PipelineState::Done);
        self.emit(PipelineEvent::ExtractionComplete {
            success_count: report.success_count(),
            failed_indices: report.failed_indices.clone(),
            cancelled: report.cancelled,
        });
        self.transition(PipelineState::Idle);
        Ok(report)
    }

    /// Run [`Pipeline::extract_to`] on a background task. The receiver
    /// resolves once extraction has finished.
    pub fn spawn_extraction<P>(
        mut self,
        destination: P,
        cancel: CancellationToken,
    ) -> oneshot::Receiver<Result<ExtractionReport>>
    where
        P: AsRef<Path> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = self.extract_to(destination, &cancel).await;
            if done_tx.send(result).is_err() {
                debug!("Extraction completion receiver dropped");
            }
        });
        done_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{CommandOutcome, MockMediaProcessorTrait};
    use tempfile::tempdir;

    fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn probing(audio_track_count: u32) -> MockMediaProcessorTrait {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_audio_tracks().times(1).returning(move |_| {
            Ok(ProbeResult {
                audio_track_count,
                stream_count: audio_track_count + 1,
            })
        });
        media
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("movie.mkv");
        std::fs::write(&source, b"matroska").unwrap();

        let mut media = probing(2);
        media
            .expect_extract_track()
            .times(2)
            .returning(|_, _, _, _| Ok(CommandOutcome::Succeeded));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = Pipeline::new(Arc::new(media), tx);

        let probe = pipeline.load_source(&source).await.unwrap();
        assert_eq!(probe.audio_track_count, 2);
        assert_eq!(pipeline.state(), PipelineState::AwaitingDestination);

        let report = pipeline.extract_to(dir.path(), &CancellationToken::new()).await.unwrap();
        assert!(report.is_success());
        assert_eq!(pipeline.state(), PipelineState::Idle);

        assert_eq!(
            drain(&mut rx),
            vec![
                PipelineEvent::ProbeComplete(2),
                PipelineEvent::Progress(0.5),
                PipelineEvent::Progress(1.0),
                PipelineEvent::ExtractionComplete {
                    success_count: 2,
                    failed_indices: vec![],
                    cancelled: false,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_source_never_reaches_prober() {
        let dir = tempdir().unwrap();
        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_audio_tracks().never();
        media.expect_extract_track().never();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = Pipeline::new(Arc::new(media), tx);

        let err = pipeline.load_source("").await.unwrap_err();
        assert!(matches!(err, ExtractorError::InvalidPath(_)));
        assert_eq!(pipeline.state(), PipelineState::Error);
        pipeline.acknowledge_error();
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let err = pipeline.load_source(dir.path().join("missing.mkv")).await.unwrap_err();
        assert!(matches!(err, ExtractorError::InvalidPath(_)));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, PipelineEvent::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_invalid_destination_never_reaches_engine() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("movie.mkv");
        std::fs::write(&source, b"matroska").unwrap();

        let mut media = probing(1);
        media.expect_extract_track().never();

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut pipeline = Pipeline::new(Arc::new(media), tx);
        pipeline.load_source(&source).await.unwrap();

        let err = pipeline
            .extract_to(dir.path().join("nowhere"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractorError::InvalidPath(_)));
        assert_eq!(pipeline.state(), PipelineState::Error);
    }

    #[tokio::test]
    async fn test_zero_tracks_still_extracts() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("silent.mkv");
        std::fs::write(&source, b"matroska").unwrap();

        let mut media = probing(0);
        media.expect_extract_track().never();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = Pipeline::new(Arc::new(media), tx);

        assert_eq!(pipeline.load_source(&source).await.unwrap().audio_track_count, 0);
        let report = pipeline.extract_to(dir.path(), &CancellationToken::new()).await.unwrap();
        assert!(report.is_success());

        assert_eq!(
            drain(&mut rx),
            vec![
                PipelineEvent::ProbeComplete(0),
                PipelineEvent::ExtractionComplete {
                    success_count: 0,
                    failed_indices: vec![],
                    cancelled: false,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_probe_failure_is_fatal_event() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("broken.mkv");
        std::fs::write(&source, b"garbage").unwrap();

        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_probe_audio_tracks()
            .returning(|_| Err(ExtractorError::ProbeFailed("exit status: 1".to_string())));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = Pipeline::new(Arc::new(media), tx);

        let err = pipeline.load_source(&source).await.unwrap_err();
        assert!(matches!(err, ExtractorError::ProbeFailed(_)));
        assert_eq!(pipeline.state(), PipelineState::Error);
        assert!(matches!(drain(&mut rx).as_slice(), [PipelineEvent::FatalError(_)]));
    }

    #[tokio::test]
    async fn test_interrupted_run_is_reported_as_cancelled() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("movie.mkv");
        std::fs::write(&source, b"matroska").unwrap();

        let mut media = probing(2);
        media.expect_extract_track().never();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = Pipeline::new(Arc::new(media), tx);
        pipeline.load_source(&source).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = pipeline.extract_to(dir.path(), &cancel).await.unwrap();
        assert!(report.cancelled);
        assert!(report.failed_indices.is_empty());

        assert_eq!(
            drain(&mut rx).last(),
            Some(&PipelineEvent::ExtractionComplete {
                success_count: 0,
                failed_indices: vec![],
                cancelled: true,
            })
        );
    }

    #[tokio::test]
    async fn test_spawned_extraction_signals_completion() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("movie.mkv");
        std::fs::write(&source, b"matroska").unwrap();

        let mut media = probing(3);
        media
            .expect_extract_track()
            .times(3)
            .returning(|_, index, _, _| {
                if index == 3 {
                    Ok(CommandOutcome::Failed {
                        code: Some(1),
                        stderr_tail: vec![],
                    })
                } else {
                    Ok(CommandOutcome::Succeeded)
                }
            });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = Pipeline::new(Arc::new(media), tx);
        pipeline.load_source(&source).await.unwrap();

        let done = pipeline.spawn_extraction(dir.path().to_path_buf(), CancellationToken::new());
        let report = done.await.unwrap().unwrap();
        assert_eq!(report.failed_indices, vec![3]);

        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&PipelineEvent::ExtractionComplete {
                success_count: 2,
                failed_indices: vec![3],
                cancelled: false,
            })
        );
    }
}
