//! User download preferences and download-completion notices.
//!
//! Preferences are stored as a JSON document of the form
//! `{"downloadSettings": {"openFolder": .., "showNotification": .., "playSound": ..}}`.
//! Parsing is lenient: unknown keys are ignored, wrongly typed values fall
//! back per field, and an unreadable document yields the defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::identity;

/// Name used in notices when the host path has no usable last segment.
pub const FALLBACK_FILE_NAME: &str = "file";

/// Behavior on download completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSettings {
    /// Reveal the file in its folder once the download completes.
    pub open_folder: bool,
    /// Emit a completion notice.
    pub show_notification: bool,
    /// Notices are audible when set.
    pub play_sound: bool,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            open_folder: false,
            show_notification: true,
            play_sound: false,
        }
    }
}

impl DownloadSettings {
    /// Reads settings from the `downloadSettings` member of a stored document.
    ///
    /// `showNotification` is on unless it is literally `false`; `playSound`
    /// accepts `true`, `"true"` or `1`; `openFolder` must be a boolean.
    #[must_use]
    pub fn from_document(document: &Value) -> Self {
        let Some(settings) = document.get("downloadSettings").filter(|v| v.is_object()) else {
            return Self::default();
        };

        let open_folder = settings
            .get("openFolder")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let show_notification = !matches!(settings.get("showNotification"), Some(Value::Bool(false)));
        let play_sound = match settings.get("playSound") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => text == "true",
            Some(Value::Number(number)) => number.as_f64().is_some_and(|n| (n - 1.0).abs() < f64::EPSILON),
            _ => false,
        };

        Self {
            open_folder,
            show_notification,
            play_sound,
        }
    }

    /// Parses a stored document; invalid JSON yields the defaults.
    #[must_use]
    pub fn parse(document: &str) -> Self {
        match serde_json::from_str::<Value>(document) {
            Ok(value) => Self::from_document(&value),
            Err(error) => {
                warn!(error = %error, "Failed to parse download settings, using defaults");
                Self::default()
            }
        }
    }

    /// Loads settings from `path`; a missing or unreadable file yields the
    /// defaults.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No download settings file");
                Self::default()
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "Failed to read download settings");
                Self::default()
            }
        }
    }
}

/// Notice emitted when a download finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionNotice {
    pub id: i64,
    pub file_name: String,
    /// Deliver without sound.
    pub silent: bool,
}

impl CompletionNotice {
    /// Builds the notice for a completed host path under `settings`.
    #[must_use]
    pub fn new(id: i64, host_filename: &str, settings: &DownloadSettings) -> Self {
        Self {
            id,
            file_name: completion_file_name(host_filename),
            silent: !settings.play_sound,
        }
    }
}

/// Last path segment of a host filename, or [`FALLBACK_FILE_NAME`].
#[must_use]
pub fn completion_file_name(host_filename: &str) -> String {
    identity::filename_from_path(host_filename).unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

/// Sink for completion notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &CompletionNotice);
}

/// Notifier that writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &CompletionNotice) {
        info!(id = notice.id, file = %notice.file_name, silent = notice.silent, "Download complete");
    }
}
