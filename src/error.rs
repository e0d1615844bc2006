use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Media tool not found: {0}")]
    ToolNotFound(String),

    #[error("Media tool invocation failed: {0}")]
    ToolInvocation(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Extraction failed for tracks {failed_indices:?}")]
    PartialExtraction { failed_indices: Vec<u32> },

    #[error("Bundled asset failed verification: {0}")]
    IntegrityMismatch(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ExtractorError {
    /// Classify a spawn failure of the external tool.
    pub fn from_spawn(binary: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ExtractorError::ToolNotFound(format!("{}: {}", binary, err))
            }
            _ => ExtractorError::ToolInvocation(format!("Failed to execute {}: {}", binary, err)),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_spawn_error_classification() {
        let missing = ExtractorError::from_spawn("ffmpeg", Error::new(ErrorKind::NotFound, "no such file"));
        assert!(matches!(missing, ExtractorError::ToolNotFound(_)));

        let denied = ExtractorError::from_spawn("ffmpeg", Error::new(ErrorKind::PermissionDenied, "denied"));
        assert!(matches!(denied, ExtractorError::ToolNotFound(_)));

        let other = ExtractorError::from_spawn("ffmpeg", Error::new(ErrorKind::Other, "boom"));
        assert!(matches!(other, ExtractorError::ToolInvocation(_)));
    }
}
