// Terminal frontend for the downloader core

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use mytube_downloader_lib::config::AppConfig;
use mytube_downloader_lib::downloader::format_selector::{format_id_from_label, pick_by_height};
use mytube_downloader_lib::downloader::{
    ContainerFormat, DialogKind, DownloadRequest, Downloader, EventEmitter, FfmpegResolver,
    SessionOutcome, SidecarBundle, UiEvent, ViewState,
};
use mytube_downloader_lib::ytdlp::YtDlpEngine;

#[derive(Parser, Debug)]
#[command(name = "mytube", version, about = "Download a video or its audio track with yt-dlp")]
struct Cli {
    /// Video page URL
    url: String,

    /// Destination folder (defaults to the Downloads directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// File name without extension (defaults to the video title)
    #[arg(short, long, default_value = "")]
    name: String,

    /// Extract the audio track as mp3
    #[arg(short, long)]
    audio: bool,

    /// Resolution to download, e.g. 720p
    #[arg(short, long, conflicts_with = "format_id")]
    quality: Option<String>,

    /// yt-dlp format id (or a label printed by --list) to pair with the best audio
    #[arg(long)]
    format_id: Option<String>,

    /// Print the available qualities and exit
    #[arg(short, long)]
    list: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let app_dir = match config.local_app_dir() {
        Ok(dir) => dir,
        Err(e) => {
            error!(error = %e, "cannot determine the application directory");
            return ExitCode::FAILURE;
        }
    };

    let (emitter, rx) = EventEmitter::channel();
    let renderer = tokio::spawn(render(rx));

    let engine = Arc::new(YtDlpEngine::new(config.ytdlp_path.clone()));
    let resolver = FfmpegResolver::new(app_dir, Box::new(SidecarBundle::new()));
    let downloader = Downloader::startup(config, engine, resolver, emitter).await;

    let container = if cli.audio {
        ContainerFormat::AudioOnly
    } else {
        ContainerFormat::Video
    };

    // accepts a bare id or a label copied from --list
    let mut format_id = cli
        .format_id
        .as_deref()
        .map(|raw| format_id_from_label(raw).unwrap_or(raw).to_string());
    if cli.list || (cli.quality.is_some() && container == ContainerFormat::Video) {
        let options = match downloader.fetch_options(&cli.url, ContainerFormat::Video) {
            Some(handle) => handle.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if cli.list {
            for option in &options {
                println!("{}", option.display_label);
            }
            drop(downloader);
            let _ = renderer.await;
            return if options.is_empty() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }

        if let Some(quality) = &cli.quality {
            match pick_by_height(&options, quality) {
                Some(option) => format_id = Some(option.format_id.clone()),
                None => warn!(quality = %quality, "quality not offered, using best available"),
            }
        }
    }

    let output = cli
        .output
        .clone()
        .or_else(dirs::download_dir)
        .unwrap_or_default();
    let request = DownloadRequest::new(cli.url.clone(), output)
        .with_filename(cli.name.clone())
        .with_container(container)
        .with_format_id(format_id);

    let outcome = match downloader.start(request) {
        Ok(mut handle) => {
            let joined = tokio::select! {
                joined = &mut handle => joined,
                _ = tokio::signal::ctrl_c() => {
                    downloader.cancel();
                    handle.await
                }
            };
            joined.unwrap_or_else(|e| SessionOutcome::Failed(e.to_string()))
        }
        Err(e) => SessionOutcome::Failed(e.to_string()),
    };

    drop(downloader);
    let _ = renderer.await;

    match outcome {
        SessionOutcome::Succeeded => ExitCode::SUCCESS,
        SessionOutcome::Cancelled => ExitCode::from(130),
        SessionOutcome::Failed(_) => ExitCode::FAILURE,
    }
}

/// Plays the foreground: folds events into a view and echoes what changed
async fn render(mut rx: UnboundedReceiver<UiEvent>) -> ViewState {
    let mut view = ViewState::default();
    let mut stderr = std::io::stderr();

    while let Some(event) = rx.recv().await {
        view.apply(&event);
        match &event {
            UiEvent::Status { text, .. } => {
                let _ = write!(stderr, "\r\x1b[2K{}", text);
                let _ = stderr.flush();
            }
            UiEvent::TitleDetected(title) => {
                let _ = writeln!(stderr, "\r\x1b[2KTitle: {}", title);
            }
            UiEvent::Dialog {
                kind,
                title,
                message,
            } => {
                let tag = match kind {
                    DialogKind::Info => "info",
                    DialogKind::Warning => "warning",
                    DialogKind::Error => "error",
                };
                let _ = writeln!(stderr, "\r\x1b[2K[{}] {}: {}", tag, title, message);
            }
            UiEvent::IdleReset { .. } => {
                let _ = writeln!(stderr);
            }
            _ => {}
        }
    }

    view
}
