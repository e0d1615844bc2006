use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::pipeline::PipelineEvent;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tracks {msg}";

/// Presentation settings resolved at startup.
#[derive(Debug, Clone, Default)]
pub struct DisplayConfig {
    /// Verified bundled font, if one is installed
    pub font: Option<PathBuf>,
    /// Draw a progress bar
    pub show_progress: bool,
}

impl DisplayConfig {
    pub fn new(font: Option<PathBuf>) -> Self {
        Self {
            font,
            show_progress: std::io::stderr().is_terminal(),
        }
    }
}

/// What the reporter saw over one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSummary {
    pub track_count: Option<u32>,
    pub last_fraction: Option<f64>,
    pub success_count: Option<usize>,
    pub failed_indices: Vec<u32>,
    pub cancelled: bool,
    pub errors: Vec<String>,
}

/// Renders pipeline events on the terminal.
pub struct ConsoleReporter {
    bar: ProgressBar,
}

impl ConsoleReporter {
    pub fn new(display: &DisplayConfig) -> Self {
        if let Some(font) = &display.font {
            debug!("Using bundled font {}", font.display());
        }

        let bar = if display.show_progress {
            let bar = ProgressBar::new(0);
            let style = ProgressStyle::with_template(BAR_TEMPLATE)
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        } else {
            ProgressBar::hidden()
        };

        Self { bar }
    }

    /// Consume events until every sender is dropped.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<PipelineEvent>) -> ReportSummary {
        let mut summary = ReportSummary::default();

        while let Some(event) = events.recv().await {
            match event {
                PipelineEvent::InvalidPath(reason) => {
                    self.bar.abandon_with_message(format!("invalid path: {}", reason));
                    summary.errors.push(reason);
                }
                PipelineEvent::ProbeComplete(count) => {
                    info!("{} audio track(s) found", count);
                    self.bar.set_length(count as u64);
                    self.bar.set_message("extracting");
                    summary.track_count = Some(count);
                }
                PipelineEvent::Progress(fraction) => {
                    let length = self.bar.length().unwrap_or(0);
                    self.bar.set_position((fraction * length as f64).round() as u64);
                    summary.last_fraction = Some(fraction);
                }
                PipelineEvent::ExtractionComplete {
                    success_count,
                    failed_indices,
                    cancelled,
                } => {
                    if cancelled {
                        self.bar.abandon_with_message(format!(
                            "cancelled, {} track(s) extracted",
                            success_count
                        ));
                    } else if failed_indices.is_empty() {
                        self.bar.finish_with_message(format!("{} track(s) extracted", success_count));
                    } else {
                        self.bar.abandon_with_message(format!(
                            "{} track(s) extracted, failed: {:?}",
                            success_count, failed_indices
                        ));
                    }
                    summary.success_count = Some(success_count);
                    summary.failed_indices = failed_indices;
                    summary.cancelled = cancelled;
                }
                PipelineEvent::FatalError(reason) => {
                    self.bar.abandon_with_message(format!("error: {}", reason));
                    summary.errors.push(reason);
                }
            }
        }

        summary
    }
}
