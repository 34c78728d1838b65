// Common data models for the downloader core

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use super::errors::{DownloadError, Result};

/// Where the ffmpeg binary was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOrigin {
    /// On the process search path
    System,
    /// Previously provisioned next to the program
    Local,
    /// Copied out of the bundled media tooling on this run
    Extracted,
}

/// Result of ffmpeg resolution, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBinary {
    pub path: Option<PathBuf>,
    pub origin: Option<BinaryOrigin>,
}

impl ResolvedBinary {
    pub fn found(path: PathBuf, origin: BinaryOrigin) -> Self {
        Self {
            path: Some(path),
            origin: Some(origin),
        }
    }

    pub fn missing() -> Self {
        Self {
            path: None,
            origin: None,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.path.is_some()
    }

    /// Path to hand to the engine, or the setup error downloads must refuse with
    pub fn usable_path(&self) -> Result<&Path> {
        self.path.as_deref().ok_or(DownloadError::FfmpegUnavailable)
    }
}

/// One selectable video quality
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOption {
    pub height: u32,
    pub approx_size_bytes: Option<u64>,
    pub format_id: String,
    pub display_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// mp4 with the selected (or best) video stream
    #[default]
    Video,
    /// Best audio stream converted to mp3
    AudioOnly,
}

impl ContainerFormat {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::AudioOnly => "mp3 (Audio Only)",
        }
    }
}

/// Snapshot of the user's choices at the moment a download starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub output_directory: PathBuf,
    pub desired_filename: String,
    pub container_format: ContainerFormat,
    pub selected_format_id: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, output_directory: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_directory: output_directory.into(),
            desired_filename: String::new(),
            container_format: ContainerFormat::Video,
            selected_format_id: None,
        }
    }

    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.desired_filename = name.into();
        self
    }

    pub fn with_container(mut self, container: ContainerFormat) -> Self {
        self.container_format = container;
        self
    }

    pub fn with_format_id(mut self, format_id: Option<String>) -> Self {
        self.selected_format_id = format_id;
        self
    }

    /// Url and output directory must both be present
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(DownloadError::InvalidRequest("url is empty".to_string()));
        }
        if self.output_directory.as_os_str().is_empty() {
            return Err(DownloadError::InvalidRequest(
                "output directory is empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownloadSessionState {
    #[default]
    Idle,
    Running,
    Cancelling,
    Succeeded,
    Failed,
}

impl DownloadSessionState {
    /// Whether the single download slot is taken
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Cancelling)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    pub fraction_complete: f32,
    pub raw_percent_text: String,
}

/// A single entry of yt-dlp's `formats` array
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineFormat {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub width: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize_approx: Option<u64>,
}

impl EngineFormat {
    /// Approximate size first, exact size as fallback
    pub fn approx_size(&self) -> Option<u64> {
        self.filesize_approx
            .filter(|s| *s > 0)
            .or(self.filesize.filter(|s| *s > 0))
    }

    pub fn has_video(&self) -> bool {
        self.vcodec
            .as_deref()
            .is_some_and(|v| !v.is_empty() && v != "none")
    }
}

/// Metadata returned by a probe (no download)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub formats: Vec<EngineFormat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostProcessor {
    /// Extract the audio track and convert it with ffmpeg
    ExtractAudio { codec: String },
}

/// Options understood by the extraction engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineOptions {
    pub format: Option<String>,
    pub output_template: Option<String>,
    pub check_certificates: bool,
    pub force_ipv4: bool,
    pub socket_timeout_secs: Option<u32>,
    pub postprocessors: Vec<PostProcessor>,
    pub ffmpeg_location: Option<PathBuf>,
}

// yt-dlp occasionally reports sizes as floats
fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validation_requires_url_and_directory() {
        assert!(DownloadRequest::new("https://x", "/tmp").validate().is_ok());
        assert!(matches!(
            DownloadRequest::new("  ", "/tmp").validate(),
            Err(DownloadError::InvalidRequest(_))
        ));
        assert!(matches!(
            DownloadRequest::new("https://x", "").validate(),
            Err(DownloadError::InvalidRequest(_))
        ));
    }

    #[test]
    fn missing_binary_is_not_usable() {
        let missing = ResolvedBinary::missing();
        assert!(!missing.is_usable());
        assert!(matches!(
            missing.usable_path(),
            Err(DownloadError::FfmpegUnavailable)
        ));
    }

    #[test]
    fn probe_json_tolerates_nulls_and_floats() {
        let json = r#"{
            "title": "Clip",
            "formats": [
                {"format_id": "18", "ext": "mp4", "vcodec": "avc1", "height": 360, "filesize_approx": 1234.7},
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "height": null, "filesize": null}
            ]
        }"#;
        let meta: ProbeMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Clip"));
        assert_eq!(meta.formats[0].approx_size(), Some(1234));
        assert!(meta.formats[0].has_video());
        assert!(!meta.formats[1].has_video());
        assert_eq!(meta.formats[1].height, None);
    }
}
