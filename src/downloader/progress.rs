// Progress normalization and yt-dlp progress-template parsing

use regex::Regex;

use super::events::{StatusTone, UiEvent};
use super::models::ProgressSample;
use super::traits::{EventEmitter, HookStatus, HookUpdate};

pub const PROGRESS_PREFIX: &str = "MYTUBE_PROGRESS";

/// `--progress-template` value producing one machine-readable line per update
pub fn progress_template() -> String {
    format!(
        "download:{}|%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s",
        PROGRESS_PREFIX
    )
}

/// Parse a line printed with [`progress_template`]. yt-dlp prints `NA` for
/// unknown fields and floats for estimates.
pub fn parse_progress_line(line: &str) -> Option<HookUpdate> {
    lazy_static::lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(
            r"^MYTUBE_PROGRESS\|(\w+)\|([^|]*)\|([^|]*)\|([^|]*)$"
        ).unwrap();
    }

    let caps = PROGRESS_RE.captures(line.trim())?;
    let status = match caps.get(1)?.as_str() {
        "downloading" => HookStatus::Downloading,
        "finished" => HookStatus::Finished,
        _ => HookStatus::Other,
    };
    let field = |i: usize| caps.get(i).and_then(|m| parse_byte_count(m.as_str()));

    Some(HookUpdate {
        status,
        downloaded_bytes: field(2),
        total_bytes: field(3),
        total_bytes_estimate: field(4),
    })
}

fn parse_byte_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.parse::<u64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}

/// Fraction of `total` done. A zero or unknown total reads as 0% instead of
/// faulting; that reading stays at 0% for the whole transfer when the engine
/// has no size estimate.
pub fn progress_sample(bytes_downloaded: u64, total_or_estimate: Option<u64>) -> ProgressSample {
    let fraction = match total_or_estimate {
        Some(total) if total > 0 => (bytes_downloaded as f64 / total as f64).clamp(0.0, 1.0) as f32,
        _ => 0.0,
    };
    ProgressSample {
        fraction_complete: fraction,
        raw_percent_text: format!("{:.1}%", fraction * 100.0),
    }
}

/// Turns byte counts into foreground progress events
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    emitter: EventEmitter,
}

impl ProgressReporter {
    pub fn new(emitter: EventEmitter) -> Self {
        Self { emitter }
    }

    /// Posts the sample; never waits for the foreground
    pub fn on_progress(&self, bytes_downloaded: u64, total_or_estimate: Option<u64>) -> ProgressSample {
        let sample = progress_sample(bytes_downloaded, total_or_estimate);
        self.emitter.emit(UiEvent::Progress(sample.clone()));
        self.emitter.emit(UiEvent::status(
            sample.raw_percent_text.clone(),
            StatusTone::Busy,
        ));
        sample
    }

    pub fn on_hook(&self, update: &HookUpdate) -> Option<ProgressSample> {
        if update.status != HookStatus::Downloading {
            return None;
        }
        Some(self.on_progress(
            update.downloaded_bytes.unwrap_or(0),
            update.total_or_estimate(),
        ))
    }
}
