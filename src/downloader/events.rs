//! Events posted to the foreground and the view model that applies them.
//!
//! Workers never touch presentation state directly. They post [`UiEvent`]s
//! through an [`EventEmitter`](super::EventEmitter); whoever owns the receiver
//! plays the role of the responsive foreground and folds the events, in order,
//! into a [`ViewState`].

use serde::{Deserialize, Serialize};

use super::models::{FormatOption, ProgressSample};

/// Colour hint for the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusTone {
    Neutral,
    Busy,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UiEvent {
    Status { text: String, tone: StatusTone },
    Progress(ProgressSample),
    /// Probe found a title; frontends pre-fill the filename with it
    TitleDetected(String),
    /// Full replacement of the quality list (empty after a failed fetch)
    QualitiesLoaded(Vec<FormatOption>),
    /// Start control disabled, cancel control enabled
    DownloadStarted,
    Completed,
    Dialog {
        kind: DialogKind,
        title: String,
        message: String,
    },
    /// Start enabled, cancel disabled, progress back to zero. After a cancel
    /// the "Stopping..." status stays visible.
    IdleReset { cancelled: bool },
}

impl UiEvent {
    pub fn status(text: impl Into<String>, tone: StatusTone) -> Self {
        Self::Status {
            text: text.into(),
            tone,
        }
    }

    pub fn dialog(kind: DialogKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dialog {
            kind,
            title: title.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialog {
    pub kind: DialogKind,
    pub title: String,
    pub message: String,
}

/// Headless model of what the presentation layer shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub status: String,
    pub tone: StatusTone,
    pub progress: f32,
    pub start_enabled: bool,
    pub cancel_enabled: bool,
    pub title: String,
    pub qualities: Vec<FormatOption>,
    pub selected_quality: Option<usize>,
    pub dialogs: Vec<Dialog>,
    pub completions: usize,
    pub resets: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            status: "Ready".to_string(),
            tone: StatusTone::Neutral,
            progress: 0.0,
            start_enabled: true,
            cancel_enabled: false,
            title: String::new(),
            qualities: Vec::new(),
            selected_quality: None,
            dialogs: Vec::new(),
            completions: 0,
            resets: 0,
        }
    }
}

impl ViewState {
    pub fn apply(&mut self, event: &UiEvent) {
        match event {
            UiEvent::Status { text, tone } => {
                self.status = text.clone();
                self.tone = *tone;
            }
            UiEvent::Progress(sample) => {
                self.progress = sample.fraction_complete;
            }
            UiEvent::TitleDetected(title) => {
                self.title = title.clone();
            }
            UiEvent::QualitiesLoaded(options) => {
                self.qualities = options.clone();
                self.selected_quality = if options.is_empty() { None } else { Some(0) };
            }
            UiEvent::DownloadStarted => {
                self.start_enabled = false;
                self.cancel_enabled = true;
                self.progress = 0.0;
            }
            UiEvent::Completed => {
                self.completions += 1;
            }
            UiEvent::Dialog {
                kind,
                title,
                message,
            } => {
                self.dialogs.push(Dialog {
                    kind: *kind,
                    title: title.clone(),
                    message: message.clone(),
                });
            }
            UiEvent::IdleReset { cancelled } => {
                self.start_enabled = true;
                self.cancel_enabled = false;
                self.progress = 0.0;
                self.resets += 1;
                if !cancelled {
                    self.status = "Ready".to_string();
                    self.tone = StatusTone::Neutral;
                }
            }
        }
    }

    pub fn selected_option(&self) -> Option<&FormatOption> {
        self.selected_quality.and_then(|i| self.qualities.get(i))
    }
}
