// Extraction engine seam and event emitter

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::errors::Result;
use super::events::UiEvent;
use super::models::{EngineOptions, ProbeMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStatus {
    Downloading,
    Finished,
    Other,
}

/// One progress callback invocation from the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookUpdate {
    pub status: HookStatus,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
}

impl HookUpdate {
    /// Exact total when known, otherwise the estimate
    pub fn total_or_estimate(&self) -> Option<u64> {
        self.total_bytes
            .filter(|t| *t > 0)
            .or(self.total_bytes_estimate)
    }
}

/// Answer from the progress callback.
///
/// `Abort` is the only way to stop a running transfer: the engine must treat it
/// as a hard stop and return [`DownloadError::Aborted`](super::DownloadError::Aborted)
/// instead of retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookControl {
    Continue,
    Abort,
}

pub type ProgressHook<'a> = dyn FnMut(&HookUpdate) -> HookControl + Send + 'a;

/// External media extraction engine (yt-dlp)
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Fetch metadata and the format list without downloading
    async fn probe(&self, url: &str, options: &EngineOptions) -> Result<ProbeMetadata>;

    /// Download with progress callbacks; the hook may abort the transfer
    async fn download(
        &self,
        url: &str,
        options: &EngineOptions,
        hook: &mut ProgressHook<'_>,
    ) -> Result<()>;
}

/// Posts events to the foreground without ever waiting for it
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: UnboundedSender<UiEvent>,
}

impl EventEmitter {
    pub fn new(tx: UnboundedSender<UiEvent>) -> Self {
        Self { tx }
    }

    /// Emitter plus the receiver the foreground drains
    pub fn channel() -> (Self, UnboundedReceiver<UiEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: UiEvent) {
        // A closed foreground just means nobody is watching any more
        let _ = self.tx.send(event);
    }
}
