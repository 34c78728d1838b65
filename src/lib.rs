pub mod config;
pub mod downloader;
pub mod ytdlp;

pub use config::AppConfig;
pub use downloader::{Downloader, DownloadError, DownloadRequest, UiEvent, ViewState};
pub use ytdlp::YtDlpEngine;
