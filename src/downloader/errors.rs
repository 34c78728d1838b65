// Error types for the downloader core

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DownloadError>;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// ffmpeg could not be found or provisioned at startup
    #[error("FFmpeg missing or setup failed.")]
    FfmpegUnavailable,

    /// Provisioning the bundled ffmpeg failed
    #[error("Failed to setup FFmpeg: {0}")]
    SetupFailed(String),

    /// yt-dlp (or another external tool) is not installed
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The request is missing required fields
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Another download already holds the slot
    #[error("A download is already running")]
    Busy,

    /// Network timeout while talking to the remote site
    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    /// The site refused the request (429, bot detection, etc.)
    #[error("The site blocked the request: {0}")]
    Blocked(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The engine process failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// The progress hook asked the engine to stop
    #[error("Download aborted by user")]
    Aborted,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Unknown(String),
}

impl DownloadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error is the acknowledged result of a user cancel
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<serde_json::Error> for DownloadError {
    fn from(e: serde_json::Error) -> Self {
        Self::ParseError(e.to_string())
    }
}

// Classify raw yt-dlp stderr into a variant
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") {
            return Self::NetworkTimeout(s);
        }

        if lower.contains("http error 429")
            || lower.contains("sign in to confirm")
            || lower.contains("blocked")
        {
            return Self::Blocked(s);
        }

        // missing executables are caught at spawn time (`spawn_error`)
        if lower.contains("command not found") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("unsupported url") || lower.contains("is not a valid url") {
            return Self::InvalidUrl(s);
        }

        if lower.contains("json") {
            return Self::ParseError(s);
        }

        Self::Unknown(s)
    }
}
