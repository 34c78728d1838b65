//! Lifecycle of a single download.
//!
//! A [`DownloadSession`] is built from a validated [`DownloadRequest`] and the
//! resolved ffmpeg, runs the engine on a background task and ends in exactly
//! one of three outcomes: success, failure, or an acknowledged cancel. Whatever
//! happens, including a panic inside the engine, the idle reset is posted once.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::config::NetworkConfig;

use super::errors::{DownloadError, Result};
use super::events::{DialogKind, StatusTone, UiEvent};
use super::models::{
    ContainerFormat, DownloadRequest, DownloadSessionState, EngineOptions, PostProcessor,
    ResolvedBinary,
};
use super::progress::ProgressReporter;
use super::traits::{EventEmitter, ExtractionEngine, HookControl, HookUpdate};
use super::utils::sanitize_filename;

pub const BEST_VIDEO_FORMAT: &str = "bestvideo+bestaudio/best";
pub const BEST_AUDIO_FORMAT: &str = "bestaudio/best";

/// Engine configuration derived from the request
pub fn engine_options_for(
    request: &DownloadRequest,
    ffmpeg: &Path,
    network: &NetworkConfig,
) -> EngineOptions {
    let filename = sanitize_filename(&request.desired_filename);
    let stem = if filename.is_empty() {
        "%(title)s".to_string()
    } else {
        filename
    };
    let output_template = request
        .output_directory
        .join(format!("{}.%(ext)s", stem))
        .to_string_lossy()
        .to_string();

    let (format, postprocessors) = match request.container_format {
        ContainerFormat::AudioOnly => (
            BEST_AUDIO_FORMAT.to_string(),
            vec![PostProcessor::ExtractAudio {
                codec: "mp3".to_string(),
            }],
        ),
        ContainerFormat::Video => {
            let format = match request.selected_format_id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => format!("{}+bestaudio/best", id),
                _ => BEST_VIDEO_FORMAT.to_string(),
            };
            (format, Vec::new())
        }
    };

    EngineOptions {
        format: Some(format),
        output_template: Some(output_template),
        check_certificates: network.check_certificates,
        force_ipv4: network.force_ipv4,
        socket_timeout_secs: Some(network.download_timeout_secs),
        postprocessors,
        ffmpeg_location: Some(ffmpeg.to_path_buf()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Succeeded,
    Failed(String),
    Cancelled,
}

/// Single admission slot plus the cancel flag.
///
/// The flag is written by the foreground and read by the worker's progress
/// callback; the state mutex is only held for transitions.
#[derive(Debug, Default)]
pub struct SessionSlot {
    state: Mutex<DownloadSessionState>,
    cancel: AtomicBool,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DownloadSessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> DownloadSessionState {
        *self.lock()
    }

    /// Take the slot for a new session
    pub fn try_acquire(&self) -> Result<()> {
        let mut state = self.lock();
        if state.is_active() {
            return Err(DownloadError::Busy);
        }
        self.cancel.store(false, Ordering::Release);
        *state = DownloadSessionState::Running;
        Ok(())
    }

    /// Returns false when nothing is running
    pub fn request_cancel(&self) -> bool {
        let mut state = self.lock();
        match *state {
            DownloadSessionState::Running => {
                self.cancel.store(true, Ordering::Release);
                *state = DownloadSessionState::Cancelling;
                true
            }
            DownloadSessionState::Cancelling => true,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Free the slot. `notify` runs under the state lock, so nothing can
    /// acquire the slot before it returns.
    fn release(&self, outcome: Option<&SessionOutcome>, notify: impl FnOnce()) {
        let mut state = self.lock();
        notify();
        *state = match outcome {
            Some(SessionOutcome::Succeeded) => DownloadSessionState::Succeeded,
            Some(SessionOutcome::Cancelled) => DownloadSessionState::Idle,
            Some(SessionOutcome::Failed(_)) | None => DownloadSessionState::Failed,
        };
    }
}

/// Posts the idle reset exactly once, on the normal path or while unwinding
struct IdleResetGuard {
    slot: Arc<SessionSlot>,
    emitter: EventEmitter,
    done: bool,
}

impl IdleResetGuard {
    fn new(slot: Arc<SessionSlot>, emitter: EventEmitter) -> Self {
        Self {
            slot,
            emitter,
            done: false,
        }
    }

    fn finish(mut self, outcome: &SessionOutcome) {
        self.reset(Some(outcome));
    }

    fn reset(&mut self, outcome: Option<&SessionOutcome>) {
        if self.done {
            return;
        }
        self.done = true;
        let cancelled = self.slot.is_cancelled();
        let emitter = &self.emitter;
        self.slot.release(outcome, || {
            emitter.emit(UiEvent::IdleReset { cancelled });
        });
    }
}

impl Drop for IdleResetGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if std::thread::panicking() && !self.slot.is_cancelled() {
            error!("download worker panicked");
            self.emitter.emit(UiEvent::dialog(
                DialogKind::Error,
                "Error",
                "The download stopped unexpectedly.",
            ));
        }
        self.reset(None);
    }
}

pub struct DownloadSession {
    request: DownloadRequest,
    options: EngineOptions,
    slot: Arc<SessionSlot>,
    reporter: ProgressReporter,
    emitter: EventEmitter,
}

impl DownloadSession {
    /// Refuses an invalid request or an absent ffmpeg before anything runs
    pub fn new(
        request: DownloadRequest,
        binary: &ResolvedBinary,
        network: &NetworkConfig,
        slot: Arc<SessionSlot>,
        emitter: EventEmitter,
    ) -> Result<Self> {
        let ffmpeg = binary.usable_path()?;
        request.validate()?;
        let options = engine_options_for(&request, ffmpeg, network);

        Ok(Self {
            request,
            options,
            slot,
            reporter: ProgressReporter::new(emitter.clone()),
            emitter,
        })
    }

    pub fn request(&self) -> &DownloadRequest {
        &self.request
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Drive the engine to a terminal outcome. The slot must already be held.
    pub async fn run(self, engine: Arc<dyn ExtractionEngine>) -> SessionOutcome {
        let guard = IdleResetGuard::new(self.slot.clone(), self.emitter.clone());
        info!(
            url = %self.request.url,
            engine = engine.name(),
            container = self.request.container_format.label(),
            format = ?self.options.format,
            "download started"
        );

        let slot = self.slot.clone();
        let reporter = self.reporter.clone();
        let mut hook = move |update: &HookUpdate| {
            if slot.is_cancelled() {
                return HookControl::Abort;
            }
            reporter.on_hook(update);
            HookControl::Continue
        };

        let result = engine
            .download(&self.request.url, &self.options, &mut hook)
            .await;

        let outcome = match result {
            _ if self.slot.is_cancelled() => SessionOutcome::Cancelled,
            Ok(()) => SessionOutcome::Succeeded,
            Err(e) if e.is_abort() => SessionOutcome::Cancelled,
            Err(e) => SessionOutcome::Failed(e.to_string()),
        };

        self.report(&outcome);
        guard.finish(&outcome);
        outcome
    }

    fn report(&self, outcome: &SessionOutcome) {
        match outcome {
            SessionOutcome::Succeeded => {
                info!(url = %self.request.url, "download complete");
                self.emitter.emit(UiEvent::Completed);
                self.emitter.emit(UiEvent::dialog(
                    DialogKind::Info,
                    "Success",
                    "Download Complete!",
                ));
                self.emitter
                    .emit(UiEvent::status("Done.", StatusTone::Success));
            }
            SessionOutcome::Failed(message) => {
                warn!(url = %self.request.url, error = %message, "download failed");
                self.emitter
                    .emit(UiEvent::dialog(DialogKind::Error, "Error", message.clone()));
            }
            SessionOutcome::Cancelled => {
                info!(url = %self.request.url, "download cancelled");
            }
        }
    }
}
