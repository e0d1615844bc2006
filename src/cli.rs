use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract every audio track of a video into output_<n>.mp4 files
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Directory receiving the extracted tracks
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Count the audio tracks of a video file
    Probe {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract the audio tracks of every .mkv file in a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output directory; each video gets a subdirectory named after it
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Show which ffmpeg binary is used and its version
    Tool,
}
