use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, ExtractorError};

/// Diagnostic lines kept from a failed invocation.
const STDERR_TAIL_LINES: usize = 8;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// How a media tool invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Succeeded,
    Failed {
        code: Option<i32>,
        stderr_tail: Vec<String>,
    },
    Cancelled,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Succeeded)
    }
}

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<OsString>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().as_os_str())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().as_os_str())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Select an absolute stream of an input
    pub fn map_stream(self, input: u32, stream: u32) -> Self {
        self.arg("-map").arg(format!("{}:{}", input, stream))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        cmd
    }

    /// Spawn the command with its diagnostic stream piped.
    pub fn spawn(&self) -> Result<Child> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        self.command()
            .spawn()
            .map_err(|e| ExtractorError::from_spawn(&self.binary_path, e))
    }

    /// Run the command and capture both output streams
    pub async fn capture(&self) -> Result<std::process::Output> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);

        let mut cmd = self.command();
        cmd.stdout(Stdio::piped());
        cmd.output()
            .await
            .map_err(|e| ExtractorError::from_spawn(&self.binary_path, e))
    }

    /// Run the command to completion, killing it if `cancel` fires first.
    ///
    /// The diagnostic stream is drained while the process runs and the child
    /// is always reaped before returning.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<CommandOutcome> {
        let mut child = self.spawn()?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExtractorError::ToolInvocation("missing child stderr".to_string()))?;
        let drain = tokio::spawn(collect_tail(stderr, STDERR_TAIL_LINES));

        let status = tokio::select! {
            status = child.wait() => Some(status?),
            _ = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to terminate {}: {}", self.description, e);
                }
                None
            }
        };

        let stderr_tail = match drain.await {
            Ok(Ok(tail)) => tail,
            Ok(Err(e)) => {
                warn!("Failed to read diagnostics of {}: {}", self.description, e);
                Vec::new()
            }
            Err(e) => {
                warn!("Diagnostic reader for {} panicked: {}", self.description, e);
                Vec::new()
            }
        };

        Ok(match status {
            None => CommandOutcome::Cancelled,
            Some(status) if status.success() => CommandOutcome::Succeeded,
            Some(status) => CommandOutcome::Failed {
                code: status.code(),
                stderr_tail,
            },
        })
    }
}

/// Read a stream to EOF, keeping only its last `keep` lines.
async fn collect_tail<R>(reader: R, keep: usize) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut tail = VecDeque::with_capacity(keep);

    while let Some(line) = lines.next_line().await? {
        if tail.len() == keep {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Ok(tail.into())
}

/// Builder for the invocations this tool makes
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    pub fn binary_path(&self) -> &str {
        &self.binary_path
    }

    /// Build stream info dump command: `-i <source>` with no output
    pub fn probe<P: AsRef<Path>>(&self, source: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Stream probe").input(source)
    }

    /// Build single track extraction command
    pub fn extract_track<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        source: P,
        track_index: u32,
        output_path: Q,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, format!("Track {} extraction", track_index))
            .overwrite()
            .input(source)
            .map_stream(0, track_index)
            .output(output_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}
