//! Typed change notifications and their application onto raw snapshots.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{HostDownload, HostState};

/// Before/after values of one observed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange<T> {
    #[serde(default = "Option::default")]
    pub previous: Option<T>,
    #[serde(default = "Option::default")]
    pub current: Option<T>,
}

impl<T> FieldChange<T> {
    #[must_use]
    pub fn new(previous: Option<T>, current: Option<T>) -> Self {
        Self { previous, current }
    }

    /// Change with only a current value.
    #[must_use]
    pub fn to(current: T) -> Self {
        Self {
            previous: None,
            current: Some(current),
        }
    }
}

/// A delta rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeltaError {
    /// The delta targets a different download than the snapshot it was applied to.
    #[error("delta for download {delta_id} cannot be applied to snapshot {snapshot_id}")]
    IdMismatch {
        /// Id carried by the delta.
        delta_id: i64,
        /// Id of the snapshot.
        snapshot_id: i64,
    },
}

/// Partial change to one host download. Only `id` is always present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDelta {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<FieldChange<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<FieldChange<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<FieldChange<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<FieldChange<HostState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<FieldChange<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_resume: Option<FieldChange<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FieldChange<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<FieldChange<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_received: Option<FieldChange<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<FieldChange<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<FieldChange<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<FieldChange<bool>>,
}

impl DownloadDelta {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Current state, when the delta changes it.
    #[must_use]
    pub fn current_state(&self) -> Option<HostState> {
        self.state.as_ref().and_then(|change| change.current)
    }

    /// Previous state, when the delta changes it.
    #[must_use]
    pub fn previous_state(&self) -> Option<HostState> {
        self.state.as_ref().and_then(|change| change.previous)
    }

    /// True when the delta reports an `in_progress` to `interrupted` transition
    /// while the host still considers the download resumable.
    #[must_use]
    pub fn is_resumable_interruption(&self) -> bool {
        self.previous_state() == Some(HostState::InProgress)
            && self.current_state() == Some(HostState::Interrupted)
            && self
                .can_resume
                .as_ref()
                .and_then(|change| change.current)
                == Some(true)
    }

    /// Applies every changed field onto `snapshot`.
    ///
    /// A missing `current` clears optional fields and leaves required ones untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::IdMismatch`] if the ids differ; the snapshot is not modified.
    pub fn apply_to(&self, snapshot: &mut HostDownload) -> Result<(), DeltaError> {
        if snapshot.id != self.id {
            return Err(DeltaError::IdMismatch {
                delta_id: self.id,
                snapshot_id: snapshot.id,
            });
        }

        if let Some(url) = current_of(self.url.as_ref()) {
            snapshot.url = url;
        }
        if let Some(change) = &self.filename {
            snapshot.filename = change.current.clone().unwrap_or_default();
        }
        if let Some(change) = &self.mime {
            snapshot.mime.clone_from(&change.current);
        }
        if let Some(state) = self.current_state() {
            snapshot.state = state;
        }
        if let Some(paused) = current_of(self.paused.as_ref()) {
            snapshot.paused = paused;
        }
        if let Some(change) = &self.can_resume {
            snapshot.can_resume = change.current;
        }
        if let Some(change) = &self.error {
            snapshot.error.clone_from(&change.current);
        }
        if let Some(total) = current_of(self.total_bytes.as_ref()) {
            snapshot.total_bytes = total;
        }
        if let Some(received) = current_of(self.bytes_received.as_ref()) {
            snapshot.bytes_received = received;
        }
        if let Some(start) = current_of(self.start_time.as_ref()) {
            snapshot.start_time = Some(start);
        }
        if let Some(change) = &self.end_time {
            snapshot.end_time.clone_from(&change.current);
        }
        if let Some(change) = &self.exists {
            snapshot.exists = change.current;
        }
        Ok(())
    }
}

fn current_of<T: Clone>(change: Option<&FieldChange<T>>) -> Option<T> {
    change.and_then(|c| c.current.clone())
}
