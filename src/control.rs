//! User-initiated download control and best-effort recovery.
//!
//! Every operation here talks to the host only. The ledger is never updated
//! from the assumption that a request succeeded; it changes when the host
//! reports the new state through its event stream.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::host::{
    DownloadOptions, HostDownload, HostEngine, HostError, HostOperation, HostState, SearchQuery,
};
use crate::identity;
use crate::record::DownloadRecord;

/// Path segment the host uses for downloads it could not name.
const GENERIC_DOWNLOAD_NAME: &str = "download";

/// Errors returned by control operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// The host rejected the request.
    #[error("host {operation} request failed: {message}")]
    Host {
        /// Which request failed
        operation: HostOperation,
        /// Message reported by the host
        message: String,
    },

    /// The host refused to open a file for lack of permission.
    #[error(
        "missing \"downloads.open\" permission\n  Suggestion: Reload the extension so the permission change takes effect"
    )]
    PermissionDenied,

    /// Resume requested for a download that is neither paused nor interrupted.
    #[error("download {id} cannot be resumed in state '{state}'\n  Suggestion: Only paused or interrupted downloads can be resumed")]
    InvalidState {
        /// Host id
        id: i64,
        /// Host state at the time of the request
        state: String,
    },

    /// The host reports the download as not resumable.
    #[error("download {id} is not resumable\n  Suggestion: Retry the download to start it again")]
    NotResumable {
        /// Host id
        id: i64,
    },

    /// The host has no download with this id.
    #[error("download not found: id {id}\n  Suggestion: The download may have been erased; refresh the list")]
    NotFound {
        /// Host id
        id: i64,
    },

    /// A retry needs the source URL.
    #[error("Download URL is required")]
    MissingUrl,
}

impl ControlError {
    pub(crate) fn host(operation: HostOperation, error: &HostError) -> Self {
        Self::Host {
            operation,
            message: error.message(),
        }
    }
}

/// Result type for control operations.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Outcome of [`DownloadControl::retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The existing host download resumed under its old id.
    Resumed,
    /// The old download was erased and a new one started.
    Restarted { old_id: i64, new_id: i64 },
}

/// Issues control requests to the host engine.
#[derive(Clone)]
pub struct DownloadControl {
    engine: Arc<dyn HostEngine>,
}

impl std::fmt::Debug for DownloadControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadControl").finish_non_exhaustive()
    }
}

impl DownloadControl {
    #[must_use]
    pub fn new(engine: Arc<dyn HostEngine>) -> Self {
        Self { engine }
    }

    /// The engine requests are sent to.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn HostEngine> {
        &self.engine
    }

    /// Pauses a download.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Host`] if the host rejects the request.
    #[instrument(skip(self))]
    pub async fn pause(&self, id: i64) -> Result<()> {
        self.engine
            .pause(id)
            .await
            .map_err(|e| log_failure(HostOperation::Pause, id, &e))
    }

    /// Resumes a paused or interrupted download after checking it with the
    /// host.
    ///
    /// # Errors
    ///
    /// - [`ControlError::NotFound`] if the host has no such download
    /// - [`ControlError::InvalidState`] if it is neither paused nor interrupted
    /// - [`ControlError::NotResumable`] if the host says it cannot resume
    /// - [`ControlError::Host`] if the lookup or the resume request fails
    #[instrument(skip(self))]
    pub async fn resume(&self, id: i64) -> Result<()> {
        let current = self.lookup(id).await?.ok_or_else(|| {
            error!(id, "Cannot resume unknown download");
            ControlError::NotFound { id }
        })?;
        validate_resumable(&current)?;

        self.engine
            .resume(id)
            .await
            .map_err(|e| log_failure(HostOperation::Resume, id, &e))
    }

    /// Cancels a download.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Host`] if the host rejects the request.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: i64) -> Result<()> {
        self.engine
            .cancel(id)
            .await
            .map_err(|e| log_failure(HostOperation::Cancel, id, &e))
    }

    /// Opens a downloaded file with the platform handler.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::PermissionDenied`] when the host message points
    /// at a missing permission, otherwise [`ControlError::Host`].
    #[instrument(skip(self))]
    pub async fn open(&self, id: i64) -> Result<()> {
        self.engine.open(id).await.map_err(|e| {
            let mapped = log_failure(HostOperation::Open, id, &e);
            if is_permission_message(&e.message()) {
                ControlError::PermissionDenied
            } else {
                mapped
            }
        })
    }

    /// Reveals a downloaded file in its folder.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Host`] if the host rejects the request.
    #[instrument(skip(self))]
    pub async fn show(&self, id: i64) -> Result<()> {
        self.engine
            .show(id)
            .await
            .map_err(|e| log_failure(HostOperation::Show, id, &e))
    }

    /// Erases the host record, leaving the file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Host`] if the host rejects the request.
    #[instrument(skip(self))]
    pub async fn delete_record(&self, id: i64) -> Result<()> {
        let erased = self
            .engine
            .erase(SearchQuery::by_id(id))
            .await
            .map_err(|e| log_failure(HostOperation::Erase, id, &e))?;
        debug!(id, erased = erased.len(), "Erased download record");
        Ok(())
    }

    /// Deletes the file, then erases the host record.
    ///
    /// A failed file removal is logged and does not stop the erase, since the
    /// file may already be gone.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Host`] if the erase fails.
    #[instrument(skip(self))]
    pub async fn delete_file_and_record(&self, id: i64) -> Result<()> {
        if let Err(e) = self.engine.remove_file(id).await {
            warn!(id, error = %e, "File may not exist, continuing to delete record");
        }
        self.delete_record(id).await
    }

    /// Retries a download.
    ///
    /// A download the host can still resume is resumed under its old id. In
    /// every other case the old host record is erased (failure only logged)
    /// and a new download of the same URL is started, named after the old
    /// file when a name can be derived.
    ///
    /// # Errors
    ///
    /// - [`ControlError::MissingUrl`] if the record has no source URL
    /// - [`ControlError::Host`] if starting the new download fails
    #[instrument(skip(self, record), fields(id = record.id, url = %record.url))]
    pub async fn retry(&self, record: &DownloadRecord) -> Result<RetryOutcome> {
        if record.url.is_empty() {
            error!(id = record.id, "Cannot retry a download without a URL");
            return Err(ControlError::MissingUrl);
        }

        let id = record.id;
        match self.engine.search(SearchQuery::by_id(id)).await {
            Ok(results) => {
                if let Some(existing) = results.into_iter().next() {
                    if existing.is_resumable() {
                        match self.resume(id).await {
                            Ok(()) => {
                                info!(id, "Retry resumed existing download");
                                return Ok(RetryOutcome::Resumed);
                            }
                            Err(e) => debug!(id, error = %e, "Resume failed, restarting download"),
                        }
                    }
                    if let Err(e) = self.engine.erase(SearchQuery::by_id(id)).await {
                        warn!(id, error = %e, "Failed to erase old download record");
                    }
                }
            }
            Err(e) => debug!(id, error = %e, "Old download not found, starting a new one"),
        }

        let options = DownloadOptions {
            url: record.url.clone(),
            filename: extract_retry_filename(record),
        };
        let new_id = self
            .engine
            .download(options)
            .await
            .map_err(|e| log_failure(HostOperation::Download, id, &e))?;

        info!(old_id = id, new_id, "Retry started new download");
        Ok(RetryOutcome::Restarted { old_id: id, new_id })
    }

    async fn lookup(&self, id: i64) -> Result<Option<HostDownload>> {
        let results = self
            .engine
            .search(SearchQuery::by_id(id))
            .await
            .map_err(|e| log_failure(HostOperation::Search, id, &e))?;
        Ok(results.into_iter().next())
    }
}

/// Checks that the host would accept a resume for `download`.
///
/// # Errors
///
/// Returns [`ControlError::InvalidState`] or [`ControlError::NotResumable`].
pub fn validate_resumable(download: &HostDownload) -> Result<()> {
    let paused = download.state == HostState::InProgress && download.paused;
    let interrupted = download.state == HostState::Interrupted;
    if !paused && !interrupted {
        return Err(ControlError::InvalidState {
            id: download.id,
            state: download.state.to_string(),
        });
    }
    if download.can_resume != Some(true) {
        return Err(ControlError::NotResumable { id: download.id });
    }
    Ok(())
}

/// File name to request when restarting `record`.
///
/// Prefers the last segment of the old path unless it is the host's generic
/// `download` name, then the name embedded in the URL.
#[must_use]
pub fn extract_retry_filename(record: &DownloadRecord) -> Option<String> {
    identity::filename_from_path(&record.path)
        .filter(|name| name != GENERIC_DOWNLOAD_NAME)
        .or_else(|| identity::filename_from_url(&record.url))
}

/// Resumes `id` after `delay`, ignoring failure.
///
/// Used when the host interrupts a running download on its own. The request
/// runs on a detached task; its outcome is only logged.
pub fn best_effort_resume(engine: Arc<dyn HostEngine>, id: i64, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match engine.resume(id).await {
            Ok(()) => info!(id, "Auto-resumed interrupted download"),
            Err(e) => debug!(id, error = %e, "Auto-resume failed"),
        }
    })
}

fn is_permission_message(message: &str) -> bool {
    message.contains("downloads.open") || message.contains("permission")
}

fn log_failure(operation: HostOperation, id: i64, e: &HostError) -> ControlError {
    error!(id, operation = %operation, error = %e, "Host request failed");
    ControlError::host(operation, e)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::record::{DownloadStatus, FileType};

    fn setup() -> (Arc<MemoryHost>, DownloadControl) {
        let host = Arc::new(MemoryHost::new());
        let control = DownloadControl::new(host.clone());
        (host, control)
    }

    fn host_download(id: i64, state: HostState, paused: bool, can_resume: Option<bool>) -> HostDownload {
        let mut raw = HostDownload::new(id, "https://example.com/files/data.bin");
        raw.filename = "/tmp/data.bin".to_string();
        raw.state = state;
        raw.paused = paused;
        raw.can_resume = can_resume;
        raw
    }

    fn record(id: i64, path: &str, url: &str) -> DownloadRecord {
        DownloadRecord {
            id,
            name: "data.bin".to_string(),
            url: url.to_string(),
            path: path.to_string(),
            size: 0,
            received_bytes: 0,
            progress: 0,
            status: DownloadStatus::Failed,
            speed: 0.0,
            start_time: 0,
            end_time: None,
            error: None,
            mime_type: None,
            file_type: FileType::File,
            can_resume: None,
            exists: true,
        }
    }

    // ==================== Resume Tests ====================

    #[tokio::test]
    async fn test_resume_paused_download() {
        let (host, control) = setup();
        host.insert(host_download(1, HostState::InProgress, true, Some(true)));
        control.resume(1).await.unwrap();
        let raw = host.get(1).unwrap();
        assert!(!raw.paused);
        assert_eq!(raw.state, HostState::InProgress);
    }

    #[tokio::test]
    async fn test_resume_unknown_download_is_not_found() {
        let (host, control) = setup();
        let err = control.resume(9).await.unwrap_err();
        assert_eq!(err, ControlError::NotFound { id: 9 });
        assert_eq!(host.call_count(HostOperation::Resume), 0);
    }

    #[tokio::test]
    async fn test_resume_running_download_is_invalid_state() {
        let (host, control) = setup();
        host.insert(host_download(1, HostState::InProgress, false, Some(true)));
        let err = control.resume(1).await.unwrap_err();
        assert!(matches!(err, ControlError::InvalidState { id: 1, ref state } if state == "in_progress"));
        assert_eq!(host.call_count(HostOperation::Resume), 0);
    }

    #[tokio::test]
    async fn test_resume_without_can_resume_is_rejected_before_host_call() {
        let (host, control) = setup();
        host.insert(host_download(1, HostState::Interrupted, false, Some(false)));
        let err = control.resume(1).await.unwrap_err();
        assert_eq!(err, ControlError::NotResumable { id: 1 });
        assert_eq!(host.call_count(HostOperation::Resume), 0);
    }

    // ==================== Simple Operation Tests ====================

    #[tokio::test]
    async fn test_host_failure_carries_message() {
        let (host, control) = setup();
        host.insert(host_download(1, HostState::InProgress, false, None));
        host.fail_on(HostOperation::Pause, "Download must be in progress");
        let err = control.pause(1).await.unwrap_err();
        assert_eq!(
            err,
            ControlError::Host {
                operation: HostOperation::Pause,
                message: "Download must be in progress".to_string()
            }
        );
        assert!(err.to_string().contains("pause"));
    }

    #[tokio::test]
    async fn test_open_maps_permission_errors() {
        let (host, control) = setup();
        host.insert(host_download(1, HostState::Complete, false, None));
        host.fail_on(HostOperation::Open, "Requires permission \"downloads.open\"");
        assert_eq!(control.open(1).await.unwrap_err(), ControlError::PermissionDenied);

        host.fail_on(HostOperation::Open, "Download file was deleted");
        assert!(matches!(
            control.open(1).await.unwrap_err(),
            ControlError::Host {
                operation: HostOperation::Open,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_file_and_record_ignores_file_failure() {
        let (host, control) = setup();
        host.insert(host_download(1, HostState::Complete, false, None));
        host.fail_on(HostOperation::RemoveFile, "File not found");
        control.delete_file_and_record(1).await.unwrap();
        assert!(host.get(1).is_none());
    }

    #[tokio::test]
    async fn test_delete_record_propagates_erase_failure() {
        let (host, control) = setup();
        host.fail_on(HostOperation::Erase, "busy");
        assert!(matches!(
            control.delete_record(1).await.unwrap_err(),
            ControlError::Host {
                operation: HostOperation::Erase,
                ..
            }
        ));
    }

    // ==================== Retry Tests ====================

    #[tokio::test]
    async fn test_retry_resumes_when_possible() {
        let (host, control) = setup();
        host.insert(host_download(1, HostState::Interrupted, false, Some(true)));
        let outcome = control
            .retry(&record(1, "/tmp/data.bin", "https://example.com/files/data.bin"))
            .await
            .unwrap();
        assert_eq!(outcome, RetryOutcome::Resumed);
        assert_eq!(host.call_count(HostOperation::Download), 0);
    }

    #[tokio::test]
    async fn test_retry_restarts_when_not_resumable() {
        let (host, control) = setup();
        host.insert(host_download(1, HostState::Interrupted, false, Some(false)));
        let outcome = control
            .retry(&record(1, "/tmp/data.bin", "https://example.com/files/data.bin"))
            .await
            .unwrap();
        let RetryOutcome::Restarted { old_id, new_id } = outcome else {
            panic!("expected restart, got {outcome:?}");
        };
        assert_eq!(old_id, 1);
        assert_ne!(new_id, 1);
        assert!(host.get(1).is_none());
        assert_eq!(host.get(new_id).unwrap().url, "https://example.com/files/data.bin");
    }

    #[tokio::test]
    async fn test_retry_restarts_when_resume_fails() {
        let (host, control) = setup();
        host.insert(host_download(1, HostState::InProgress, true, Some(true)));
        host.fail_on(HostOperation::Resume, "network");
        let outcome = control
            .retry(&record(1, "/tmp/data.bin", "https://example.com/files/data.bin"))
            .await
            .unwrap();
        assert!(matches!(outcome, RetryOutcome::Restarted { old_id: 1, .. }));
        assert_eq!(host.call_count(HostOperation::Erase), 1);
    }

    #[tokio::test]
    async fn test_retry_of_erased_download_starts_new_one() {
        let (host, control) = setup();
        host.fail_on(HostOperation::Erase, "should not be called");
        let outcome = control
            .retry(&record(7, "", "https://example.com/files/data.bin"))
            .await
            .unwrap();
        assert!(matches!(outcome, RetryOutcome::Restarted { old_id: 7, .. }));
        assert_eq!(host.call_count(HostOperation::Erase), 0);
    }

    #[tokio::test]
    async fn test_retry_requires_url() {
        let (host, control) = setup();
        let err = control.retry(&record(1, "/tmp/a.bin", "")).await.unwrap_err();
        assert_eq!(err, ControlError::MissingUrl);
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_retry_download_failure_is_host_error() {
        let (host, control) = setup();
        host.fail_on(HostOperation::Download, "Invalid URL");
        let err = control
            .retry(&record(1, "", "https://example.com/files/data.bin"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::Host {
                operation: HostOperation::Download,
                ..
            }
        ));
    }

    #[test]
    fn test_extract_retry_filename() {
        assert_eq!(
            extract_retry_filename(&record(1, r"C:\dl\report.pdf", "https://x/y.bin")),
            Some("report.pdf".to_string())
        );
        assert_eq!(
            extract_retry_filename(&record(1, "/tmp/download", "https://x/y.bin")),
            Some("y.bin".to_string())
        );
        assert_eq!(extract_retry_filename(&record(1, "", "https://x/")), None);
    }

    // ==================== Auto-resume Tests ====================

    #[tokio::test]
    async fn test_best_effort_resume_resumes_after_delay() {
        let (host, _control) = setup();
        host.insert(host_download(3, HostState::Interrupted, false, Some(true)));
        best_effort_resume(host.clone(), 3, Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(host.get(3).unwrap().state, HostState::InProgress);
    }

    #[tokio::test]
    async fn test_best_effort_resume_swallows_failure() {
        let (host, _control) = setup();
        host.fail_on(HostOperation::Resume, "nope");
        best_effort_resume(host.clone(), 3, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(host.call_count(HostOperation::Resume), 1);
    }
}
