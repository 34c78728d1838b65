// QualityCatalog - turns the engine's raw format list into selectable options
//
// Keeps only mp4 entries that carry a video stream and a known height, ranks
// them highest resolution first and collapses duplicate labels.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::NetworkConfig;

use super::events::{StatusTone, UiEvent};
use super::models::{EngineFormat, EngineOptions, FormatOption};
use super::traits::{EventEmitter, ExtractionEngine};

/// Build ranked, deduplicated options from raw formats
pub fn build_quality_options(formats: &[EngineFormat]) -> Vec<FormatOption> {
    let mut candidates: Vec<FormatOption> = formats
        .iter()
        .filter(|f| f.ext == "mp4" && f.has_video())
        .filter_map(|f| {
            let height = f.height.filter(|h| *h > 0)?;
            let height = u32::try_from(height).ok()?;
            let size = f.approx_size();
            Some(FormatOption {
                height,
                approx_size_bytes: size,
                format_id: f.format_id.clone(),
                display_label: format!("{}p {} | ID: {}", height, format_size(size), f.format_id),
            })
        })
        .collect();

    // Stable: equal heights keep source order, so dedup keeps the first seen
    candidates.sort_by(|a, b| b.height.cmp(&a.height));

    let mut seen = HashSet::new();
    candidates.retain(|option| seen.insert(option.display_label.clone()));
    candidates
}

/// Decimal megabytes with one decimal, or blank when unknown
pub fn format_size(bytes: Option<u64>) -> String {
    match bytes {
        Some(b) if b > 0 => format!("{:.1} MB", b as f64 / 1e6),
        _ => String::new(),
    }
}

/// Recover the format id from a display label such as `"720p 1.2 MB | ID: 22"`
pub fn format_id_from_label(label: &str) -> Option<&str> {
    label
        .split_once("ID: ")
        .map(|(_, id)| id.trim())
        .filter(|id| !id.is_empty())
}

/// Pick an option by resolution, e.g. `"720p"` or `"720"`
pub fn pick_by_height<'a>(options: &'a [FormatOption], quality: &str) -> Option<&'a FormatOption> {
    let wanted: u32 = quality.trim().trim_end_matches('p').parse().ok()?;
    options.iter().find(|o| o.height == wanted)
}

pub struct QualityCatalog {
    engine: Arc<dyn ExtractionEngine>,
    network: NetworkConfig,
    emitter: EventEmitter,
}

impl QualityCatalog {
    pub fn new(engine: Arc<dyn ExtractionEngine>, network: NetworkConfig, emitter: EventEmitter) -> Self {
        Self {
            engine,
            network,
            emitter,
        }
    }

    /// Metadata-only probe posture: IPv4 and a short socket timeout
    pub fn probe_options(network: &NetworkConfig) -> EngineOptions {
        EngineOptions {
            check_certificates: true,
            force_ipv4: network.force_ipv4,
            socket_timeout_secs: Some(network.probe_timeout_secs),
            ..Default::default()
        }
    }

    /// Query the engine and publish the options. Never fails: on any error the
    /// published list is empty and the status line says so.
    pub async fn fetch_options(&self, url: &str) -> Vec<FormatOption> {
        self.emitter
            .emit(UiEvent::status("Analyzing...", StatusTone::Busy));

        let options = Self::probe_options(&self.network);
        match self.engine.probe(url, &options).await {
            Ok(metadata) => {
                let qualities = build_quality_options(&metadata.formats);
                info!(
                    url,
                    formats = metadata.formats.len(),
                    options = qualities.len(),
                    "qualities loaded"
                );

                self.emitter.emit(UiEvent::TitleDetected(
                    metadata.title.unwrap_or_else(|| "Video".to_string()),
                ));
                self.emitter.emit(UiEvent::QualitiesLoaded(qualities.clone()));
                self.emitter
                    .emit(UiEvent::status("Qualities loaded.", StatusTone::Success));
                qualities
            }
            Err(e) => {
                warn!(url, error = %e, "quality fetch failed");
                self.emitter.emit(UiEvent::QualitiesLoaded(Vec::new()));
                self.emitter.emit(UiEvent::status(
                    "Fetch Failed (Check URL/Net)",
                    StatusTone::Error,
                ));
                Vec::new()
            }
        }
    }
}
