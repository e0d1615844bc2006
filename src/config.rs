use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, ExtractorError};

/// SHA-256 of the font shipped next to the executable.
pub const DEFAULT_ASSET_SHA256: &str =
    "a652ea0a3c4bf8658845f044b5d6f40c39ecf03207e43f325c1451127528402b";

fn default_asset_enabled() -> bool {
    true
}

fn default_asset_path() -> String {
    "bin/AppleSDGothicNeoB.ttf".to_string()
}

fn default_asset_sha256() -> String {
    DEFAULT_ASSET_SHA256.to_string()
}

fn default_bundled_binary() -> Option<String> {
    Some("bin/ffmpeg".to_string())
}

fn default_log_directory() -> String {
    ".mkvtracks/log".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub asset: AssetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary, used when no bundled binary is present
    pub binary_path: String,
    /// Bundled ffmpeg, relative to the executable's directory.
    /// The platform executable suffix is appended on lookup.
    #[serde(default = "default_bundled_binary")]
    pub bundled_binary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Verify the bundled asset at startup
    #[serde(default = "default_asset_enabled")]
    pub enabled: bool,
    /// Asset location, relative to the executable's directory
    #[serde(default = "default_asset_path")]
    pub path: String,
    /// Expected SHA-256 digest, hex encoded
    #[serde(default = "default_asset_sha256")]
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the daily rotating log file
    #[serde(default = "default_log_directory")]
    pub directory: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            bundled_binary: default_bundled_binary(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            enabled: default_asset_enabled(),
            path: default_asset_path(),
            sha256: default_asset_sha256(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
        }
    }
}

impl MediaConfig {
    /// Pick the bundled binary when it exists next to the executable,
    /// otherwise fall back to `binary_path`.
    pub fn resolve_binary(&self, exe_dir: &Path) -> String {
        if let Some(bundled) = &self.bundled_binary {
            let candidate = exe_dir.join(format!("{}{}", bundled, std::env::consts::EXE_SUFFIX));
            if candidate.is_file() {
                return candidate.to_string_lossy().to_string();
            }
        }
        self.binary_path.clone()
    }
}

impl AssetConfig {
    pub fn resolve_path(&self, exe_dir: &Path) -> PathBuf {
        exe_dir.join(&self.path)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ExtractorError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ExtractorError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ExtractorError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ExtractorError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.media.binary_path.trim().is_empty() {
            return Err(ExtractorError::Config("media.binary_path must not be empty".to_string()));
        }

        let digest = &self.asset.sha256;
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ExtractorError::Config(format!(
                "asset.sha256 must be 64 hex characters, got '{}'",
                digest
            )));
        }

        Ok(())
    }
}

/// Directory containing the running executable.
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| ExtractorError::Config("Cannot determine executable directory".to_string()))?;
    Ok(dir.to_path_buf())
}
