// Shared fixtures for unit tests

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

use super::errors::{DownloadError, Result};
use super::events::{UiEvent, ViewState};
use super::models::{EngineFormat, EngineOptions, ProbeMetadata};
use super::traits::{ExtractionEngine, HookControl, HookStatus, HookUpdate, ProgressHook};

pub fn video_format(id: &str, height: u64) -> EngineFormat {
    EngineFormat {
        format_id: id.to_string(),
        ext: "mp4".to_string(),
        vcodec: Some("avc1.640028".to_string()),
        acodec: Some("none".to_string()),
        width: Some(height * 16 / 9),
        height: Some(height),
        filesize: None,
        filesize_approx: None,
    }
}

pub fn downloading(done: u64, total: u64) -> HookUpdate {
    HookUpdate {
        status: HookStatus::Downloading,
        downloaded_bytes: Some(done),
        total_bytes: Some(total),
        total_bytes_estimate: None,
    }
}

/// Fold every queued event into a fresh view
pub fn drain(rx: &mut UnboundedReceiver<UiEvent>) -> ViewState {
    let mut view = ViewState::default();
    drain_into(rx, &mut view);
    view
}

pub fn drain_into(rx: &mut UnboundedReceiver<UiEvent>, view: &mut ViewState) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        view.apply(&event);
        events.push(event);
    }
    events
}

/// Engine that replays a fixed script
pub struct ScriptedEngine {
    probe: std::result::Result<ProbeMetadata, String>,
    updates: Vec<HookUpdate>,
    fail_with: Option<String>,
    /// Signalled once the first update has been delivered
    pub first_update_sent: Arc<Notify>,
    /// When set, the engine waits on it before the second update
    pub gate: Option<Arc<Notify>>,
    seen: Mutex<Vec<EngineOptions>>,
}

impl ScriptedEngine {
    pub fn with_probe(probe: std::result::Result<ProbeMetadata, String>) -> Self {
        Self {
            probe,
            updates: Vec::new(),
            fail_with: None,
            first_update_sent: Arc::new(Notify::new()),
            gate: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_updates(updates: Vec<HookUpdate>) -> Self {
        Self {
            updates,
            ..Self::with_probe(Ok(ProbeMetadata::default()))
        }
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    pub fn seen_options(&self) -> Vec<EngineOptions> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn probe(&self, _url: &str, options: &EngineOptions) -> Result<ProbeMetadata> {
        self.seen.lock().unwrap().push(options.clone());
        self.probe.clone().map_err(DownloadError::from)
    }

    async fn download(
        &self,
        _url: &str,
        options: &EngineOptions,
        hook: &mut ProgressHook<'_>,
    ) -> Result<()> {
        self.seen.lock().unwrap().push(options.clone());

        for (i, update) in self.updates.iter().enumerate() {
            if i == 1 {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
            }
            if hook(update) == HookControl::Abort {
                return Err(DownloadError::Aborted);
            }
            if i == 0 {
                self.first_update_sent.notify_one();
            }
        }

        match &self.fail_with {
            Some(message) => Err(DownloadError::from(message.clone())),
            None => Ok(()),
        }
    }
}
