//! Stream header classification for ffmpeg's diagnostic output.
//!
//! `ffmpeg -i <file>` prints one header line per input stream, e.g.
//!
//! ```text
//!   Stream #0:0: Video: h264 (High), yuv420p, 1920x1080
//!   Stream #0:1(eng): Audio: aac (LC), 48000 Hz, stereo, fltp (default)
//!   Stream #0:2[0x3](jpn): Audio: ac3, 48000 Hz, 5.1(side), fltp
//! ```
//!
//! Only the structure up to the stream kind matters for counting.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

/// Kind of stream announced by a header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Other,
}

/// Result of probing a source for its streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Number of audio stream headers seen
    pub audio_track_count: u32,
    /// Number of stream headers of any kind seen
    pub stream_count: u32,
}

fn stream_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Stream #\d+:\d+(?:\[[^\]]*\])?(?:\([^)]*\))?: (\w+)")
            .expect("stream header pattern is valid")
    })
}

/// Classify a single diagnostic line.
pub fn classify_line(line: &str) -> Option<StreamKind> {
    let caps = stream_header().captures(line)?;
    match &caps[1] {
        "Audio" => Some(StreamKind::Audio),
        _ => Some(StreamKind::Other),
    }
}

impl ProbeResult {
    pub fn record(&mut self, kind: StreamKind) {
        self.stream_count += 1;
        if kind == StreamKind::Audio {
            self.audio_track_count += 1;
        }
    }
}

/// Read diagnostic output line by line until EOF, counting stream headers.
///
/// Must be driven while the producing process is still running so the
/// pipe never fills up.
pub async fn scan_stream_headers<R>(reader: R) -> std::io::Result<ProbeResult>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut result = ProbeResult::default();

    while let Some(line) = lines.next_line().await? {
        if let Some(kind) = classify_line(&line) {
            debug!("Stream header ({:?}): {}", kind, line.trim());
            result.record(kind);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MKV_DUMP: &str = "\
ffmpeg version 6.1 Copyright (c) 2000-2023 the FFmpeg developers
Input #0, matroska,webm, from 'movie.mkv':
  Metadata:
    title           : Movie
  Duration: 01:42:10.05, start: 0.000000, bitrate: 9650 kb/s
  Stream #0:0: Video: h264 (High), yuv420p(progressive), 1920x1080, 23.98 fps
  Stream #0:1(eng): Audio: aac (LC), 48000 Hz, stereo, fltp (default)
  Stream #0:2(jpn): Audio: ac3, 48000 Hz, 5.1(side), fltp, 448 kb/s
  Stream #0:3(eng): Subtitle: subrip
  Stream #0:4: Audio: flac, 44100 Hz, stereo, s16
  Stream #0:5: Attachment: ttf
At least one output file must be specified
";

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("  Stream #0:1: Audio: aac"), Some(StreamKind::Audio));
        assert_eq!(classify_line("  Stream #0:1(eng): Audio: aac"), Some(StreamKind::Audio));
        assert_eq!(classify_line("  Stream #0:1[0x2](eng): Audio: ac3"), Some(StreamKind::Audio));
        assert_eq!(classify_line("  Stream #0:0[0x1e0]: Video: mpeg2video"), Some(StreamKind::Other));
        assert_eq!(classify_line("  Stream #0:3(eng): Subtitle: ass"), Some(StreamKind::Other));
        assert_eq!(classify_line("  Stream mapping:"), None);
        assert_eq!(classify_line("  Stream #0:1 -> #0:0 (aac (native) -> aac (native))"), None);
        assert_eq!(classify_line("    title           : Audio commentary"), None);
    }

    #[tokio::test]
    async fn test_counts_audio_independent_of_other_streams() {
        let result = scan_stream_headers(MKV_DUMP.as_bytes()).await.unwrap();
        assert_eq!(result.audio_track_count, 3);
        assert_eq!(result.stream_count, 6);
    }

    #[tokio::test]
    async fn test_no_audio_streams() {
        let dump = "Input #0, matroska,webm, from 'silent.mkv':\n  Stream #0:0: Video: vp9, yuv420p\n";
        let result = scan_stream_headers(dump.as_bytes()).await.unwrap();
        assert_eq!(result.audio_track_count, 0);
        assert_eq!(result.stream_count, 1);
    }

    #[tokio::test]
    async fn test_empty_output() {
        let result = scan_stream_headers(&b""[..]).await.unwrap();
        assert_eq!(result, ProbeResult::default());
    }
}
