//! Download record types and status definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a reconciled download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Bytes are actively being transferred.
    Downloading,
    /// Transfer finished successfully.
    Completed,
    /// Paused by the user or by the host.
    Paused,
    /// Interrupted and not paused; terminal unless resumed.
    Failed,
    /// Cancelled through an explicit user action.
    Cancelled,
}

impl DownloadStatus {
    /// Returns the lowercase string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true for statuses after which the host no longer transfers bytes
    /// for this attempt.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "paused" => Ok(Self::Paused),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid download status: {s}")),
        }
    }
}

/// Coarse file category used for filtering and iconography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    File,
    Image,
    Video,
    Document,
    Audio,
    Other,
}

impl FileType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Image => "image",
            Self::Video => "video",
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "document" => Ok(Self::Document),
            "audio" => Ok(Self::Audio),
            "other" => Ok(Self::Other),
            _ => Err(format!("invalid file type: {s}")),
        }
    }
}

/// A single reconciled download.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    /// Host-assigned id; unique at any instant but not stable across retries.
    pub id: i64,
    /// Resolved display name.
    pub name: String,
    /// Source URL, used as the secondary identity of a logical download.
    pub url: String,
    /// Host filesystem path (may be empty).
    pub path: String,
    /// Total bytes, 0 when unknown.
    pub size: u64,
    pub received_bytes: u64,
    /// Percentage 0-100 derived from `received_bytes` and `size`.
    pub progress: u8,
    pub status: DownloadStatus,
    /// Bytes per second; only nonzero while downloading.
    pub speed: f64,
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub file_type: FileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_resume: Option<bool>,
    /// False only when the host explicitly reported the file missing.
    #[serde(default = "default_exists")]
    pub exists: bool,
}

fn default_exists() -> bool {
    true
}

/// Computes `round(received / size * 100)`, or 0 when the size is unknown.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn compute_progress(received_bytes: u64, size: u64) -> u8 {
    if size == 0 {
        return 0;
    }
    let percent = (received_bytes as f64 / size as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Partial update applied through [`crate::ledger::DownloadLedger::update`].
///
/// Each `Some` field overwrites the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub path: Option<String>,
    pub size: Option<u64>,
    pub received_bytes: Option<u64>,
    pub status: Option<DownloadStatus>,
    pub speed: Option<f64>,
    pub end_time: Option<i64>,
    pub error: Option<String>,
    pub can_resume: Option<bool>,
    pub exists: Option<bool>,
}

impl RecordPatch {
    /// Applies the patch, re-deriving progress when byte counts change.
    pub fn apply_to(self, record: &mut DownloadRecord) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(path) = self.path {
            record.path = path;
        }
        if let Some(size) = self.size {
            record.size = size;
        }
        if let Some(received) = self.received_bytes {
            record.received_bytes = received;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(speed) = self.speed {
            record.speed = speed;
        }
        if let Some(end_time) = self.end_time {
            record.end_time = Some(end_time);
        }
        if let Some(error) = self.error {
            record.error = Some(error);
        }
        if let Some(can_resume) = self.can_resume {
            record.can_resume = Some(can_resume);
        }
        if let Some(exists) = self.exists {
            record.exists = exists;
        }
        record.progress = compute_progress(record.received_bytes, record.size);
    }
}

impl fmt::Display for DownloadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DownloadRecord {{ id: {}, name: {}, status: {} }}",
            self.id, self.name, self.status
        )
    }
}
