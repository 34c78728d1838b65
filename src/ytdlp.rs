// yt-dlp adapter: maps EngineOptions to command-line flags and streams progress

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::downloader::errors::{DownloadError, Result};
use crate::downloader::models::{EngineOptions, PostProcessor, ProbeMetadata};
use crate::downloader::progress::{parse_progress_line, progress_template};
use crate::downloader::traits::{ExtractionEngine, HookControl, ProgressHook};
use crate::downloader::utils::{last_error_line, run_output_with_timeout, spawn_error};

/// Upper bound for a whole metadata probe; sockets have their own timeout
const PROBE_PROCESS_TIMEOUT_SECS: u64 = 90;

// Find yt-dlp executable on PATH or in common install locations
pub fn find_ytdlp() -> String {
    if let Ok(path) = which::which("yt-dlp") {
        return path.to_string_lossy().to_string();
    }

    let common_paths = [
        "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
        "/usr/local/bin/yt-dlp",    // Homebrew on Intel Mac
        "/usr/bin/yt-dlp",          // System installation
    ];

    for path in common_paths {
        if std::path::Path::new(path).exists() {
            return path.to_string();
        }
    }

    "yt-dlp".to_string()
}

pub struct YtDlpEngine {
    ytdlp_path: String,
}

impl YtDlpEngine {
    pub fn new(ytdlp_path: Option<String>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.unwrap_or_else(find_ytdlp),
        }
    }

    pub fn path(&self) -> &str {
        &self.ytdlp_path
    }

    pub fn probe_args(url: &str, options: &EngineOptions) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(network_args(options));
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    pub fn download_args(url: &str, options: &EngineOptions) -> Vec<String> {
        let mut args = vec![
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            progress_template(),
        ];

        if let Some(format) = &options.format {
            args.push("-f".to_string());
            args.push(format.clone());
        }
        if let Some(template) = &options.output_template {
            args.push("-o".to_string());
            args.push(template.clone());
        }
        if let Some(location) = &options.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.to_string_lossy().to_string());
        }

        args.extend(network_args(options));

        for pp in &options.postprocessors {
            match pp {
                PostProcessor::ExtractAudio { codec } => {
                    args.push("-x".to_string());
                    args.push("--audio-format".to_string());
                    args.push(codec.clone());
                }
            }
        }

        args.push("--".to_string());
        args.push(url.to_string());
        args
    }
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new(None)
    }
}

fn network_args(options: &EngineOptions) -> Vec<String> {
    let mut args = Vec::new();
    if !options.check_certificates {
        args.push("--no-check-certificates".to_string());
    }
    if options.force_ipv4 {
        args.push("--force-ipv4".to_string());
    }
    if let Some(timeout) = options.socket_timeout_secs {
        args.push("--socket-timeout".to_string());
        args.push(timeout.to_string());
    }
    args
}

#[async_trait]
impl ExtractionEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn probe(&self, url: &str, options: &EngineOptions) -> Result<ProbeMetadata> {
        let args = Self::probe_args(url, options);
        debug!(program = %self.ytdlp_path, ?args, "probing formats");

        let output = run_output_with_timeout(&self.ytdlp_path, args, PROBE_PROCESS_TIMEOUT_SECS).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::from(last_error_line(&stderr)));
        }

        let metadata: ProbeMetadata = serde_json::from_slice(&output.stdout)?;
        debug!(formats = metadata.formats.len(), "probe finished");
        Ok(metadata)
    }

    async fn download(
        &self,
        url: &str,
        options: &EngineOptions,
        hook: &mut ProgressHook<'_>,
    ) -> Result<()> {
        let args = Self::download_args(url, options);
        info!(program = %self.ytdlp_path, "starting yt-dlp download");
        debug!(?args, "yt-dlp arguments");

        let mut child = TokioCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.ytdlp_path, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        });

        let mut reader = BufReader::new(stdout);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            let read = reader
                .read_until(b'\n', &mut raw)
                .await
                .map_err(|e| DownloadError::ExecutionError(format!("Failed to read yt-dlp output: {}", e)))?;
            if read == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&raw);

            if let Some(update) = parse_progress_line(&line) {
                if hook(&update) == HookControl::Abort {
                    info!("progress hook requested abort, stopping yt-dlp");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to kill yt-dlp");
                    }
                    stderr_task.abort();
                    return Err(DownloadError::Aborted);
                }
            } else if line.contains("[download]") || line.contains("[Merger]") || line.contains("[ExtractAudio]") {
                debug!(line = %line.trim_end(), "yt-dlp");
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("Process error: {}", e)))?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if status.success() {
            info!("yt-dlp finished");
            Ok(())
        } else {
            warn!(code = ?status.code(), "yt-dlp failed");
            Err(DownloadError::from(last_error_line(&stderr_output)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn probe_is_metadata_only_with_ipv4_and_timeout() {
        let options = EngineOptions {
            force_ipv4: true,
            check_certificates: true,
            socket_timeout_secs: Some(10),
            ..Default::default()
        };
        let args = YtDlpEngine::probe_args("https://example.com/v", &options);

        assert!(args.contains(&"--skip-download".to_string()));
        assert!(args.contains(&"--force-ipv4".to_string()));
        assert!(!args.contains(&"--no-check-certificates".to_string()));
        assert!(has_pair(&args, "--socket-timeout", "10"));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/v"));
    }

    #[test]
    fn download_maps_every_option() {
        let options = EngineOptions {
            format: Some("bestaudio/best".to_string()),
            output_template: Some("/tmp/out/song.%(ext)s".to_string()),
            check_certificates: false,
            force_ipv4: true,
            socket_timeout_secs: Some(15),
            postprocessors: vec![PostProcessor::ExtractAudio {
                codec: "mp3".to_string(),
            }],
            ffmpeg_location: Some(PathBuf::from("/opt/ffmpeg")),
        };
        let args = YtDlpEngine::download_args("https://example.com/v", &options);

        assert!(has_pair(&args, "-f", "bestaudio/best"));
        assert!(has_pair(&args, "-o", "/tmp/out/song.%(ext)s"));
        assert!(has_pair(&args, "--ffmpeg-location", "/opt/ffmpeg"));
        assert!(has_pair(&args, "--audio-format", "mp3"));
        assert!(has_pair(&args, "--socket-timeout", "15"));
        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"--no-check-certificates".to_string()));
        assert!(args.contains(&"--force-ipv4".to_string()));
        assert!(has_pair(&args, "--progress-template", &progress_template()));
    }

    #[test]
    fn explicit_path_is_kept() {
        let engine = YtDlpEngine::new(Some("/custom/yt-dlp".to_string()));
        assert_eq!(engine.path(), "/custom/yt-dlp");
    }
}
