//! mkvtracks - Audio track extraction for multi-stream videos
//!
//! Counts the audio streams of a video by reading ffmpeg's diagnostics and
//! writes each of them to its own file, one ffmpeg invocation per track.

pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod integrity;
pub mod media;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod workflow;
