// ffmpeg resolution: system search path -> local copy -> bundled media tooling

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use super::errors::{DownloadError, Result};
use super::events::{DialogKind, UiEvent};
use super::models::{BinaryOrigin, ResolvedBinary};
use super::traits::EventEmitter;

pub fn ffmpeg_binary_name() -> &'static str {
    if cfg!(windows) {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

/// Media tooling that ships an ffmpeg build
pub trait BundledFfmpeg: Send + Sync {
    fn name(&self) -> &'static str;

    /// Path of the bundled binary, provisioning it first if necessary
    fn locate(&self) -> Result<PathBuf>;
}

/// ffmpeg build provided by `ffmpeg-sidecar`, staged in the user cache directory
pub struct SidecarBundle {
    staging_dir: PathBuf,
}

impl SidecarBundle {
    pub fn new() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            staging_dir: base.join("mytube").join("ffmpeg-bundle"),
        }
    }

    pub fn with_staging_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: dir.into(),
        }
    }
}

impl Default for SidecarBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl BundledFfmpeg for SidecarBundle {
    fn name(&self) -> &'static str {
        "ffmpeg-sidecar"
    }

    fn locate(&self) -> Result<PathBuf> {
        let staged = self.staging_dir.join(ffmpeg_binary_name());
        if staged.is_file() {
            return Ok(staged);
        }

        fs::create_dir_all(&self.staging_dir)
            .map_err(|e| DownloadError::io(&self.staging_dir, e))?;

        debug!(dir = %self.staging_dir.display(), "unpacking bundled ffmpeg");
        let download_url = ffmpeg_sidecar::download::ffmpeg_download_url()
            .map_err(|e| DownloadError::SetupFailed(e.to_string()))?;
        let archive_path =
            ffmpeg_sidecar::download::download_ffmpeg_package(download_url, &self.staging_dir)
                .map_err(|e| DownloadError::SetupFailed(e.to_string()))?;
        ffmpeg_sidecar::download::unpack_ffmpeg(&archive_path, &self.staging_dir)
            .map_err(|e| DownloadError::SetupFailed(e.to_string()))?;

        if staged.is_file() {
            Ok(staged)
        } else {
            Err(DownloadError::SetupFailed(format!(
                "bundle did not contain {}",
                ffmpeg_binary_name()
            )))
        }
    }
}

pub struct FfmpegResolver {
    app_dir: PathBuf,
    /// `None` searches the process `PATH`
    search_path: Option<OsString>,
    bundle: Box<dyn BundledFfmpeg>,
}

impl FfmpegResolver {
    pub fn new(app_dir: impl Into<PathBuf>, bundle: Box<dyn BundledFfmpeg>) -> Self {
        Self {
            app_dir: app_dir.into(),
            search_path: None,
            bundle,
        }
    }

    pub fn with_search_path(mut self, paths: impl Into<OsString>) -> Self {
        self.search_path = Some(paths.into());
        self
    }

    /// Where a provisioned copy lives
    pub fn local_path(&self) -> PathBuf {
        self.app_dir.join(ffmpeg_binary_name())
    }

    /// Resolve, reporting a failure to the user once as a blocking error.
    ///
    /// Returns an absent path on failure; downloads refuse to start with it.
    pub fn resolve(&self, emitter: &EventEmitter) -> ResolvedBinary {
        match self.try_resolve() {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(error = %e, "ffmpeg setup failed");
                emitter.emit(UiEvent::dialog(
                    DialogKind::Error,
                    "Critical Error",
                    format!("Failed to setup FFmpeg: {}", e),
                ));
                ResolvedBinary::missing()
            }
        }
    }

    pub fn try_resolve(&self) -> Result<ResolvedBinary> {
        info!("searching for ffmpeg");

        if let Some(path) = self.find_on_search_path() {
            info!(path = %path.display(), "global ffmpeg found");
            return Ok(ResolvedBinary::found(path, BinaryOrigin::System));
        }

        let target = self.local_path();
        if target.is_file() {
            info!(path = %target.display(), "local ffmpeg found");
            return Ok(ResolvedBinary::found(target, BinaryOrigin::Local));
        }

        info!(source = self.bundle.name(), "local ffmpeg not found, extracting bundled copy");
        let source = self.bundle.locate()?;
        install_copy(&source, &target)?;
        info!(path = %target.display(), "bundled ffmpeg installed");

        Ok(ResolvedBinary::found(target, BinaryOrigin::Extracted))
    }

    fn find_on_search_path(&self) -> Option<PathBuf> {
        let name = ffmpeg_binary_name();
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| self.app_dir.clone());
                which::which_in(name, Some(paths), cwd)
            }
            None => which::which(name),
        };
        found.ok()
    }
}

fn install_copy(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| DownloadError::io(parent, e))?;
    }
    fs::copy(source, target).map_err(|e| DownloadError::io(target, e))?;
    grant_execute(target)
}

#[cfg(unix)]
fn grant_execute(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .map_err(|e| DownloadError::io(path, e))?
        .permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(path, perms).map_err(|e| DownloadError::io(path, e))?;
    debug!(path = %path.display(), "execution permission granted");
    Ok(())
}

#[cfg(not(unix))]
fn grant_execute(_path: &Path) -> Result<()> {
    Ok(())
}
