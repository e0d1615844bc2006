//! mkvtracks - Audio track extraction for multi-stream videos
//!
//! Entry point: verifies the bundled asset, then dispatches the requested
//! command to the extraction workflow.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mkvtracks::cli::{Args, Commands};
use mkvtracks::config::{executable_dir, Config};
use mkvtracks::integrity::{current_generation, BundledAsset, GuardOutcome, IntegrityGuard, ProcessRelauncher};
use mkvtracks::media::MediaProcessorFactory;
use mkvtracks::report::DisplayConfig;
use mkvtracks::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    // Setup logging to both console and file
    let log_guard = setup_logging(args.verbose, Path::new(&config.logging.directory))?;
    info!("Starting mkvtracks");

    let exe_dir = executable_dir()?;

    let mut font = None;
    if config.asset.enabled {
        let asset = BundledAsset::new(config.asset.resolve_path(&exe_dir), config.asset.sha256.clone());
        let guard = IntegrityGuard::new(ProcessRelauncher, current_generation());
        let outcome = guard.check(&asset)?;
        if let Some(code) = outcome.exit_code() {
            info!("Restarted with a clean asset directory, exiting");
            // process::exit skips destructors; flush the file log first
            drop(log_guard);
            std::process::exit(code);
        }
        if let GuardOutcome::Verified(path) = outcome {
            font = Some(path);
        }
    }

    let binary = config.media.resolve_binary(&exe_dir);
    let media = MediaProcessorFactory::create_processor(binary.clone());
    let workflow = Workflow::new(media.clone(), DisplayConfig::new(font));

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current track");
            ctrl_c_cancel.cancel();
        }
    });

    match args.command {
        Commands::Extract { input, output_dir } => {
            info!("Extracting audio tracks from: {}", input.display());
            let report = workflow.extract(&input, &output_dir, &cancel).await?;
            for artifact in &report.artifacts {
                println!("Saved track {}: {}", artifact.track_index, artifact.path.display());
            }
            let report = report.into_result()?;
            println!("{} audio track(s) extracted", report.success_count());
        }
        Commands::Probe { input, json } => {
            let probe = workflow.probe(&input).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&probe)?);
            } else {
                println!("{} audio track(s)", probe.audio_track_count);
            }
        }
        Commands::Batch { input_dir, output_dir } => {
            let summary = workflow.process_directory(&input_dir, &output_dir, &cancel).await?;
            println!(
                "Processed {} file(s), {} failed",
                summary.processed.len(),
                summary.failed.len()
            );
            for path in &summary.failed {
                println!("  failed: {}", path.display());
            }
            if !summary.failed.is_empty() {
                anyhow::bail!("{} file(s) failed", summary.failed.len());
            }
        }
        Commands::Tool => {
            println!("Binary: {}", binary);
            media.check_availability().await?;
            println!("Version: {}", media.get_version_info().await?);
        }
    }

    info!("mkvtracks completed successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(log_dir, "mkvtracks.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output goes to stderr so stdout stays clean for results
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("mkvtracks.log").display());

    Ok(guard)
}
