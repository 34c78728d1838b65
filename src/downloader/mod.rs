// Downloader core: ffmpeg resolution, quality catalog, download sessions

pub mod errors;
pub mod events;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod session;
pub mod tools;
pub mod traits;
pub mod updater;
pub mod utils;

#[cfg(test)]
mod test_helpers;

pub use errors::{DownloadError, Result};
pub use events::{Dialog, DialogKind, StatusTone, UiEvent, ViewState};
pub use format_selector::QualityCatalog;
pub use models::{
    BinaryOrigin, ContainerFormat, DownloadRequest, DownloadSessionState, EngineFormat,
    EngineOptions, FormatOption, PostProcessor, ProbeMetadata, ProgressSample, ResolvedBinary,
};
pub use orchestrator::Downloader;
pub use progress::ProgressReporter;
pub use session::{DownloadSession, SessionOutcome, SessionSlot};
pub use tools::{BundledFfmpeg, FfmpegResolver, SidecarBundle};
pub use traits::{EventEmitter, ExtractionEngine, HookControl, HookStatus, HookUpdate, ProgressHook};
pub use updater::{UpdateChecker, UpdateOutcome};
