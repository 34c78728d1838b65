// Foreground-facing coordinator: owns the resolved ffmpeg, the engine and the
// single download slot, and hands long-running work to background tasks.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;

use super::errors::{DownloadError, Result};
use super::events::{DialogKind, StatusTone, UiEvent};
use super::format_selector::QualityCatalog;
use super::models::{
    ContainerFormat, DownloadRequest, DownloadSessionState, FormatOption, ResolvedBinary,
};
use super::session::{DownloadSession, SessionOutcome, SessionSlot};
use super::tools::FfmpegResolver;
use super::traits::{EventEmitter, ExtractionEngine};
use super::updater::UpdateChecker;

pub struct Downloader {
    config: AppConfig,
    engine: Arc<dyn ExtractionEngine>,
    binary: ResolvedBinary,
    emitter: EventEmitter,
    slot: Arc<SessionSlot>,
}

impl Downloader {
    pub fn new(
        config: AppConfig,
        engine: Arc<dyn ExtractionEngine>,
        binary: ResolvedBinary,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            config,
            engine,
            binary,
            emitter,
            slot: Arc::new(SessionSlot::new()),
        }
    }

    /// Resolve ffmpeg and kick off the engine update check.
    ///
    /// Provisioning may download and unpack ffmpeg, so it runs on the blocking
    /// pool while other tasks keep going.
    pub async fn startup(
        config: AppConfig,
        engine: Arc<dyn ExtractionEngine>,
        resolver: FfmpegResolver,
        emitter: EventEmitter,
    ) -> Self {
        let resolve_emitter = emitter.clone();
        let binary = match tokio::task::spawn_blocking(move || resolver.resolve(&resolve_emitter)).await {
            Ok(binary) => binary,
            Err(e) => {
                error!(error = %e, "ffmpeg resolution task failed");
                ResolvedBinary::missing()
            }
        };
        match &binary.path {
            Some(path) => info!(path = %path.display(), origin = ?binary.origin, "ffmpeg ready"),
            None => warn!("continuing without ffmpeg; downloads are disabled"),
        }

        // detached; the outcome is only logged
        let _ = UpdateChecker::new(config.update.clone()).spawn();

        Self::new(config, engine, binary, emitter)
    }

    pub fn binary(&self) -> &ResolvedBinary {
        &self.binary
    }

    pub fn state(&self) -> DownloadSessionState {
        self.slot.state()
    }

    pub fn catalog(&self) -> QualityCatalog {
        QualityCatalog::new(
            self.engine.clone(),
            self.config.network.clone(),
            self.emitter.clone(),
        )
    }

    /// Refresh the quality list in the background.
    ///
    /// Nothing happens for an empty url or audio-only output, which has no
    /// quality choice.
    pub fn fetch_options(
        &self,
        url: &str,
        container: ContainerFormat,
    ) -> Option<JoinHandle<Vec<FormatOption>>> {
        let url = url.trim().to_string();
        if url.is_empty() || container == ContainerFormat::AudioOnly {
            debug!(?container, "quality fetch skipped");
            return None;
        }

        let catalog = self.catalog();
        Some(tokio::spawn(async move { catalog.fetch_options(&url).await }))
    }

    /// Validate the request and start the session on a background task.
    ///
    /// Every refusal is also reported to the user as a dialog.
    pub fn start(&self, request: DownloadRequest) -> Result<JoinHandle<SessionOutcome>> {
        if !self.binary.is_usable() {
            let err = DownloadError::FfmpegUnavailable;
            self.emitter
                .emit(UiEvent::dialog(DialogKind::Error, "Error", err.to_string()));
            return Err(err);
        }
        if let Err(e) = request.validate() {
            self.emitter.emit(UiEvent::dialog(
                DialogKind::Warning,
                "Missing Info",
                "Please select URL and Folder.",
            ));
            return Err(e);
        }

        let session = DownloadSession::new(
            request,
            &self.binary,
            &self.config.network,
            self.slot.clone(),
            self.emitter.clone(),
        )?;
        self.slot.try_acquire()?;

        self.emitter.emit(UiEvent::DownloadStarted);
        let engine = self.engine.clone();
        Ok(tokio::spawn(session.run(engine)))
    }

    /// Ask the running session to stop. The transfer aborts at the engine's
    /// next progress callback; returns false when nothing is running.
    pub fn cancel(&self) -> bool {
        if !self.slot.request_cancel() {
            return false;
        }
        info!("cancel requested");
        self.emitter
            .emit(UiEvent::status("Stopping...", StatusTone::Error));
        true
    }
}
