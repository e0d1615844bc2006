//! Startup verification of the asset shipped next to the executable.
//!
//! A corrupted asset is deleted and the program is started again once, so a
//! missing asset is picked up as "absent" on the second run. The relaunched
//! process carries a generation marker in its environment; a second mismatch
//! in that process is fatal instead of triggering another relaunch.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, error, info, warn};

use crate::error::{Result, ExtractorError};

/// Environment variable carrying the relaunch generation.
pub const RELAUNCH_GENERATION_ENV: &str = "MKVTRACKS_RELAUNCH_GENERATION";

/// Relaunches allowed before a mismatch becomes fatal.
pub const MAX_RELAUNCHES: u32 = 1;

/// Exit status of the process that handed over to its replacement.
pub const RELAUNCH_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledAsset {
    pub path: PathBuf,
    pub expected_sha256: String,
}

impl BundledAsset {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(path: P, expected_sha256: S) -> Self {
        Self {
            path: path.into(),
            expected_sha256: expected_sha256.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Asset not installed; nothing to verify
    Absent,
    /// Asset matched its digest and may be used
    Verified(PathBuf),
    /// Asset was removed and a fresh process started; the caller must exit
    Relaunched,
}

impl GuardOutcome {
    /// Status the current process must exit with, if it must exit at all.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            GuardOutcome::Relaunched => Some(RELAUNCH_EXIT_CODE),
            GuardOutcome::Absent | GuardOutcome::Verified(_) => None,
        }
    }
}

/// Starts a replacement process.
pub trait Relauncher {
    fn relaunch(&self, generation: u32) -> Result<()>;
}

/// Re-executes the current binary with the same arguments.
pub struct ProcessRelauncher;

impl Relauncher for ProcessRelauncher {
    fn relaunch(&self, generation: u32) -> Result<()> {
        let exe = std::env::current_exe()?;
        info!("Relaunching {} (generation {})", exe.display(), generation);

        Command::new(&exe)
            .args(std::env::args_os().skip(1))
            .env(RELAUNCH_GENERATION_ENV, generation.to_string())
            .spawn()
            .map_err(|e| ExtractorError::ToolInvocation(format!("Failed to relaunch {}: {}", exe.display(), e)))?;

        Ok(())
    }
}

/// Read the relaunch generation of this process from the environment.
pub fn current_generation() -> u32 {
    std::env::var(RELAUNCH_GENERATION_ENV)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Hex encoded SHA-256 of a file's contents.
pub fn sha256_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

pub struct IntegrityGuard<R: Relauncher> {
    relauncher: R,
    generation: u32,
}

impl<R: Relauncher> IntegrityGuard<R> {
    pub fn new(relauncher: R, generation: u32) -> Self {
        Self {
            relauncher,
            generation,
        }
    }

    pub fn check(&self, asset: &BundledAsset) -> Result<GuardOutcome> {
        if !asset.path.exists() {
            debug!("Bundled asset {} not present, skipping verification", asset.path.display());
            return Ok(GuardOutcome::Absent);
        }

        let actual = sha256_file(&asset.path)?;
        if actual.eq_ignore_ascii_case(&asset.expected_sha256) {
            info!("Bundled asset verified: {}", asset.path.display());
            return Ok(GuardOutcome::Verified(asset.path.clone()));
        }

        warn!(
            "Bundled asset {} digest mismatch (expected {}, got {}), removing",
            asset.path.display(),
            asset.expected_sha256,
            actual
        );
        std::fs::remove_file(&asset.path)?;

        if self.generation >= MAX_RELAUNCHES {
            error!("Bundled asset still corrupt after {} relaunch(es)", self.generation);
            return Err(ExtractorError::IntegrityMismatch(format!(
                "{} failed verification after relaunch",
                asset.path.display()
            )));
        }

        self.relauncher.relaunch(self.generation + 1)?;
        Ok(GuardOutcome::Relaunched)
    }
}
