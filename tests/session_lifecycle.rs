use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

use mytube_downloader_lib::config::{AppConfig, UpdateConfig};
use mytube_downloader_lib::downloader::{
    BinaryOrigin, BundledFfmpeg, ContainerFormat, DownloadError, DownloadRequest, Downloader,
    EngineFormat, EngineOptions, EventEmitter, ExtractionEngine, FfmpegResolver, HookControl,
    HookStatus, HookUpdate, ProbeMetadata, ProgressHook, ResolvedBinary, SessionOutcome,
    UiEvent, ViewState,
};

/// Streams `chunks` progress updates of a 1000 byte file, pausing after the
/// first until released
struct ChunkedEngine {
    chunks: u64,
    started: Arc<Notify>,
    release: Arc<Notify>,
    callbacks: AtomicUsize,
}

impl ChunkedEngine {
    fn new(chunks: u64) -> Self {
        Self {
            chunks,
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            callbacks: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExtractionEngine for ChunkedEngine {
    fn name(&self) -> &'static str {
        "chunked"
    }

    async fn probe(&self, _url: &str, _options: &EngineOptions) -> mytube_downloader_lib::downloader::Result<ProbeMetadata> {
        Ok(ProbeMetadata {
            title: Some("Integration clip".to_string()),
            formats: vec![
                EngineFormat {
                    format_id: "22".to_string(),
                    ext: "mp4".to_string(),
                    vcodec: Some("avc1".to_string()),
                    height: Some(720),
                    filesize: Some(5_000_000),
                    ..Default::default()
                },
                EngineFormat {
                    format_id: "251".to_string(),
                    ext: "webm".to_string(),
                    vcodec: Some("none".to_string()),
                    ..Default::default()
                },
            ],
        })
    }

    async fn download(
        &self,
        _url: &str,
        _options: &EngineOptions,
        hook: &mut ProgressHook<'_>,
    ) -> mytube_downloader_lib::downloader::Result<()> {
        let step = 1000 / self.chunks;
        for i in 1..=self.chunks {
            self.callbacks.fetch_add(1, Ordering::SeqCst);
            let update = HookUpdate {
                status: HookStatus::Downloading,
                downloaded_bytes: Some(step * i),
                total_bytes: None,
                total_bytes_estimate: Some(1000),
            };
            if hook(&update) == HookControl::Abort {
                return Err(DownloadError::Aborted);
            }
            if i == 1 {
                self.started.notify_one();
                self.release.notified().await;
            }
        }
        Ok(())
    }
}

fn no_updates() -> AppConfig {
    AppConfig::default().with_update(UpdateConfig {
        enabled: false,
        ..Default::default()
    })
}

fn drain(rx: &mut UnboundedReceiver<UiEvent>) -> (ViewState, Vec<UiEvent>) {
    let mut view = ViewState::default();
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        view.apply(&event);
        events.push(event);
    }
    (view, events)
}

struct CopyBundle(PathBuf);

impl BundledFfmpeg for CopyBundle {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn locate(&self) -> mytube_downloader_lib::downloader::Result<PathBuf> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn download_reports_progress_then_resets() {
    let engine = Arc::new(ChunkedEngine::new(4));
    let release = engine.release.clone();
    let (emitter, mut rx) = EventEmitter::channel();
    let downloader = Downloader::new(
        no_updates(),
        engine.clone(),
        ResolvedBinary::found(PathBuf::from("/usr/bin/ffmpeg"), BinaryOrigin::System),
        emitter,
    );

    release.notify_one();
    let outcome = downloader
        .start(DownloadRequest::new("https://example.com/v", "/tmp"))
        .unwrap()
        .await
        .unwrap();
    let (view, events) = drain(&mut rx);

    assert_eq!(outcome, SessionOutcome::Succeeded);
    let fractions: Vec<f32> = events
        .iter()
        .filter_map(|e| match e {
            UiEvent::Progress(sample) => Some(sample.fraction_complete),
            _ => None,
        })
        .collect();
    assert_eq!(fractions, vec![0.25, 0.5, 0.75, 1.0]);
    assert_eq!(events.first(), Some(&UiEvent::DownloadStarted));
    assert_eq!(events.last(), Some(&UiEvent::IdleReset { cancelled: false }));
    assert_eq!(view.completions, 1);
    assert_eq!(view.status, "Ready");
    assert_eq!(view.progress, 0.0);
}

#[tokio::test]
async fn cancel_stops_transfer_quietly() {
    let engine = Arc::new(ChunkedEngine::new(10));
    let (started, release) = (engine.started.clone(), engine.release.clone());
    let (emitter, mut rx) = EventEmitter::channel();
    let downloader = Downloader::new(
        no_updates(),
        engine.clone(),
        ResolvedBinary::found(PathBuf::from("/usr/bin/ffmpeg"), BinaryOrigin::System),
        emitter,
    );

    let handle = downloader
        .start(
            DownloadRequest::new("https://example.com/v", "/tmp")
                .with_container(ContainerFormat::AudioOnly),
        )
        .unwrap();
    started.notified().await;
    assert!(downloader.cancel());
    release.notify_one();

    assert_eq!(handle.await.unwrap(), SessionOutcome::Cancelled);
    let (view, events) = drain(&mut rx);

    // aborted at the callback right after the cancel
    assert_eq!(engine.callbacks.load(Ordering::SeqCst), 2);
    assert!(view.dialogs.is_empty());
    assert_eq!(view.completions, 0);
    assert_eq!(view.status, "Stopping...");
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, UiEvent::IdleReset { .. }))
            .count(),
        1
    );
    assert!(!downloader.state().is_active());
}

#[tokio::test]
async fn startup_provisions_ffmpeg_and_lists_qualities() {
    let app_dir = TempDir::new().unwrap();
    let bundle_dir = TempDir::new().unwrap();
    let empty_path = TempDir::new().unwrap();
    let bundled = bundle_dir.path().join("ffmpeg-build");
    std::fs::write(&bundled, b"binary").unwrap();

    let resolver = FfmpegResolver::new(app_dir.path(), Box::new(CopyBundle(bundled)))
        .with_search_path(empty_path.path().as_os_str());
    let (emitter, mut rx) = EventEmitter::channel();
    let downloader = Downloader::startup(
        no_updates(),
        Arc::new(ChunkedEngine::new(1)),
        resolver,
        emitter,
    )
    .await;

    assert_eq!(downloader.binary().origin, Some(BinaryOrigin::Extracted));
    assert!(downloader.binary().path.as_deref().unwrap().starts_with(app_dir.path()));

    let options = downloader
        .fetch_options("https://example.com/v", ContainerFormat::Video)
        .unwrap()
        .await
        .unwrap();
    let (view, _) = drain(&mut rx);

    assert_eq!(options.len(), 1);
    assert_eq!(options[0].display_label, "720p 5.0 MB | ID: 22");
    assert_eq!(view.title, "Integration clip");
    assert_eq!(view.selected_option(), Some(&options[0]));
}
