//! Host download engine interface.
//!
//! The host platform performs all transfers; this crate only observes and
//! controls it through the [`HostEngine`] trait. Raw records and deltas are
//! typed here so that loosely-shaped host data is validated at the boundary
//! before it reaches the reconciled [`crate::record::DownloadRecord`] domain.
//!
//! # Architecture
//!
//! - [`HostDownload`] - Raw download record as reported by the host
//! - [`DownloadDelta`] - Per-field change notification for one host id
//! - [`HostEvent`] - Created / changed / erased notifications
//! - [`HostEngine`] - Async request/response contract with typed failures
//! - [`MemoryHost`] - In-process engine used by tests and the replay CLI

mod delta;
mod error;
mod memory;

pub use delta::{DeltaError, DownloadDelta, FieldChange};
pub use error::HostError;
pub use memory::{HostCall, MemoryHost};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Host-side transfer state vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    InProgress,
    Complete,
    Interrupted,
}

impl HostState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw download record as delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostDownload {
    pub id: i64,
    #[serde(default)]
    pub url: String,
    /// Absolute path chosen by the host; may be empty before the target is known.
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub mime: Option<String>,
    pub state: HostState,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub can_resume: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    /// Total size in bytes, 0 when unknown.
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub bytes_received: u64,
    /// ISO-8601 start timestamp.
    #[serde(default)]
    pub start_time: Option<String>,
    /// ISO-8601 end timestamp.
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub exists: Option<bool>,
}

impl HostDownload {
    /// Minimal in-progress record, mainly for hosts and tests that build records incrementally.
    #[must_use]
    pub fn new(id: i64, url: &str) -> Self {
        Self {
            id,
            url: url.to_string(),
            filename: String::new(),
            mime: None,
            state: HostState::InProgress,
            paused: false,
            can_resume: None,
            error: None,
            total_bytes: 0,
            bytes_received: 0,
            start_time: None,
            end_time: None,
            exists: None,
        }
    }

    /// True when the host would accept a resume request for this record.
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        let paused = self.state == HostState::InProgress && self.paused;
        let interrupted = self.state == HostState::Interrupted;
        (paused || interrupted) && self.can_resume == Some(true)
    }
}

/// Notification emitted by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum HostEvent {
    /// A new download appeared.
    Created(HostDownload),
    /// One or more fields of an existing download changed.
    Changed(DownloadDelta),
    /// The host forgot a download.
    Erased { id: i64 },
}

/// Filter for host searches and erasures. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub id: Option<i64>,
    pub url: Option<String>,
    pub state: Option<HostState>,
}

impl SearchQuery {
    /// Matches every download.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches a single host id.
    #[must_use]
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Returns true if the raw record satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, raw: &HostDownload) -> bool {
        self.id.is_none_or(|id| raw.id == id)
            && self.url.as_deref().is_none_or(|url| raw.url == url)
            && self.state.is_none_or(|state| raw.state == state)
    }
}

/// Parameters for starting a new host download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    pub url: String,
    pub filename: Option<String>,
}

/// Host operations, used to label failures and injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOperation {
    Search,
    Pause,
    Resume,
    Cancel,
    Erase,
    RemoveFile,
    Open,
    Show,
    Download,
}

impl HostOperation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Cancel => "cancel",
            Self::Erase => "erase",
            Self::RemoveFile => "remove_file",
            Self::Open => "open",
            Self::Show => "show",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for HostOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Asynchronous contract with the host download engine.
///
/// Every call resolves to an explicit success value or a [`HostError`];
/// success is never inferred from the absence of an error callback.
#[async_trait]
pub trait HostEngine: Send + Sync {
    /// Returns the raw records matching `query`.
    async fn search(&self, query: SearchQuery) -> Result<Vec<HostDownload>, HostError>;

    async fn pause(&self, id: i64) -> Result<(), HostError>;

    async fn resume(&self, id: i64) -> Result<(), HostError>;

    async fn cancel(&self, id: i64) -> Result<(), HostError>;

    /// Forgets matching downloads and returns the erased ids. Files stay on disk.
    async fn erase(&self, query: SearchQuery) -> Result<Vec<i64>, HostError>;

    /// Deletes the downloaded file; the record stays until erased.
    async fn remove_file(&self, id: i64) -> Result<(), HostError>;

    /// Opens the downloaded file with the platform handler.
    async fn open(&self, id: i64) -> Result<(), HostError>;

    /// Reveals the downloaded file in the platform file manager.
    async fn show(&self, id: i64) -> Result<(), HostError>;

    /// Starts a new download and returns its host id.
    async fn download(&self, options: DownloadOptions) -> Result<i64, HostError>;
}
