//! Runtime configuration.
//!
//! Nothing is persisted: defaults can be overridden from the environment with
//! [`AppConfig::from_env`] or programmatically with the `with_*` builders.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::downloader::errors::{DownloadError, Result};

/// Network posture shared by probes and downloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Socket timeout for metadata probes, in seconds
    pub probe_timeout_secs: u32,
    /// Socket timeout for downloads, in seconds
    pub download_timeout_secs: u32,
    /// Works around networks with broken IPv6 routes
    pub force_ipv4: bool,
    /// Downloads run with certificate checks disabled unless this is set
    pub check_certificates: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 10,
            download_timeout_secs: 15,
            force_ipv4: true,
            check_certificates: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub enabled: bool,
    /// Packaged builds ship a pinned engine and never upgrade it in place
    pub packaged: bool,
    /// Interpreter whose pip upgrades yt-dlp
    pub python: String,
    pub timeout_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            packaged: false,
            python: "python3".to_string(),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the provisioned ffmpeg lives; defaults to the program's directory
    pub app_dir: Option<PathBuf>,
    /// Explicit yt-dlp executable
    pub ytdlp_path: Option<String>,
    pub network: NetworkConfig,
    pub update: UpdateConfig,
}

impl AppConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = env_non_empty("MYTUBE_APP_DIR") {
            config.app_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = env_non_empty("YTDLP_PATH") {
            config.ytdlp_path = Some(path);
        }
        // e.g. export YTDLP_PYTHON="/path/to/venv/bin/python"
        if let Some(python) = env_non_empty("YTDLP_PYTHON") {
            config.update.python = python;
        }
        if env_flag("MYTUBE_PACKAGED") {
            config.update.packaged = true;
        }
        if env_flag("MYTUBE_SKIP_UPDATE") {
            config.update.enabled = false;
        }

        config
    }

    pub fn with_app_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.app_dir = Some(dir.into());
        self
    }

    pub fn with_ytdlp_path(mut self, path: Option<String>) -> Self {
        self.ytdlp_path = path;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn with_update(mut self, update: UpdateConfig) -> Self {
        self.update = update;
        self
    }

    /// Directory the provisioned ffmpeg is cached in
    pub fn local_app_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.app_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe().map_err(|e| DownloadError::io("current_exe", e))?;
        exe.parent()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| DownloadError::SetupFailed("program has no parent directory".to_string()))
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(key: &str) -> bool {
    env_non_empty(key).is_some_and(|v| {
        matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}
