//! The tracking session: one explicitly owned context that ties the host to
//! the ledger and the view.
//!
//! A session holds the host handle, the reconciled ledger, the last raw
//! snapshot per host id, the view state and the user preferences. Host
//! events are handled one at a time through `&mut self`; each handler runs to
//! completion before the next event is processed.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tracker_core::{DownloadSession, MemoryHost, TrackerConfig};
//!
//! let host = Arc::new(MemoryHost::new());
//! let mut session = DownloadSession::new(host, &TrackerConfig::default());
//! session.refresh().await?;
//! for event in events {
//!     session.handle_event(event).await;
//! }
//! let page = session.page();
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::badge;
use crate::config::TrackerConfig;
use crate::control::{self, ControlError, DownloadControl, RetryOutcome};
use crate::host::{DownloadDelta, HostDownload, HostEngine, HostEvent, HostOperation, HostState, SearchQuery};
use crate::ledger::DownloadLedger;
use crate::record::{DownloadRecord, DownloadStatus, RecordPatch};
use crate::settings::{CompletionNotice, DownloadSettings, Notifier, TracingNotifier};
use crate::view::{
    FilterOptions, JsonFilePaginationStore, MemoryPaginationStore, Page, PaginationStore,
    SortOptions, Stats, ViewState, stats,
};

/// Milliseconds since the Unix epoch, from the wall clock.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Reconciliation context for one host.
pub struct DownloadSession {
    control: DownloadControl,
    ledger: DownloadLedger,
    view: ViewState,
    snapshots: HashMap<i64, HostDownload>,
    /// Ids the user cancelled; their next interruption is shown as cancelled.
    cancelled: HashSet<i64>,
    settings: DownloadSettings,
    notifier: Arc<dyn Notifier>,
    auto_resume_delay: Duration,
    background: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for DownloadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSession")
            .field("records", &self.ledger.len())
            .field("snapshots", &self.snapshots.len())
            .field("settings", &self.settings)
            .field("auto_resume_delay", &self.auto_resume_delay)
            .finish_non_exhaustive()
    }
}

impl DownloadSession {
    /// Creates a session with an empty ledger.
    ///
    /// Pagination is restored from `config.pagination_file` (in memory when
    /// unset) and download settings from `config.settings_file`.
    #[must_use]
    pub fn new(engine: Arc<dyn HostEngine>, config: &TrackerConfig) -> Self {
        let store: Arc<dyn PaginationStore> = match &config.pagination_file {
            Some(path) => Arc::new(JsonFilePaginationStore::new(path.clone())),
            None => Arc::new(MemoryPaginationStore::new()),
        };
        let settings = config
            .settings_file
            .as_deref()
            .map(DownloadSettings::load)
            .unwrap_or_default();

        Self {
            control: DownloadControl::new(engine),
            ledger: DownloadLedger::new(),
            view: ViewState::new(store, config.page_size()),
            snapshots: HashMap::new(),
            cancelled: HashSet::new(),
            settings,
            notifier: Arc::new(TracingNotifier),
            auto_resume_delay: config.auto_resume_delay(),
            background: Vec::new(),
        }
    }

    /// Replaces the completion notice sink.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replaces the download settings.
    #[must_use]
    pub fn with_settings(mut self, settings: DownloadSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the pagination store, restoring pagination from it.
    #[must_use]
    pub fn with_pagination_store(mut self, store: Arc<dyn PaginationStore>, default_page_size: usize) -> Self {
        self.view = ViewState::new(store, default_page_size);
        self
    }

    // ==================== Host events ====================

    /// Loads every host record and drops ledger records the host no longer
    /// knows.
    ///
    /// Returns the number of records in the ledger afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Host`] if the host search fails.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> control::Result<usize> {
        let downloads = self
            .control
            .engine()
            .search(SearchQuery::all())
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to load downloads from host");
                ControlError::host(HostOperation::Search, &e)
            })?;

        let now = now_ms();
        let ids: HashSet<i64> = downloads.iter().map(|raw| raw.id).collect();
        self.snapshots.retain(|id, _| ids.contains(id));
        for raw in downloads {
            self.ingest_snapshot(raw, now);
        }
        let pruned = self.ledger.retain_ids(&ids);
        info!(records = self.ledger.len(), pruned, "Refreshed downloads");
        Ok(self.ledger.len())
    }

    /// Handles one host event at the wall-clock time.
    pub async fn handle_event(&mut self, event: HostEvent) {
        self.handle_event_at(event, now_ms()).await;
    }

    /// Handles one host event observed at `now_ms`.
    pub async fn handle_event_at(&mut self, event: HostEvent, now_ms: i64) {
        match event {
            HostEvent::Created(raw) => {
                debug!(id = raw.id, "Host created download");
                self.ingest_snapshot(raw, now_ms);
            }
            HostEvent::Changed(delta) => self.handle_change(delta, now_ms).await,
            HostEvent::Erased { id } => {
                debug!(id, "Host erased download");
                self.snapshots.remove(&id);
                self.cancelled.remove(&id);
                self.ledger.remove(id);
            }
        }
    }

    async fn handle_change(&mut self, delta: DownloadDelta, now_ms: i64) {
        let id = delta.id;
        let snapshot = match self.snapshots.get(&id) {
            Some(existing) => {
                let mut updated = existing.clone();
                match delta.apply_to(&mut updated) {
                    Ok(()) => Some(updated),
                    Err(error) => {
                        warn!(id, error = %error, "Discarding invalid host delta");
                        return;
                    }
                }
            }
            None => self.fetch(id).await,
        };

        if let Some(raw) = snapshot {
            self.ingest_snapshot(raw, now_ms);
        }

        if delta.current_state() == Some(HostState::Complete) {
            self.handle_completion(id).await;
        }

        if delta.is_resumable_interruption() && !self.cancelled.contains(&id) {
            debug!(id, delay_ms = self.auto_resume_delay.as_millis(), "Scheduling auto-resume");
            let handle = control::best_effort_resume(
                Arc::clone(self.control.engine()),
                id,
                self.auto_resume_delay,
            );
            self.background.push(handle);
        }
    }

    async fn handle_completion(&mut self, id: i64) {
        let Some(raw) = self.fetch(id).await else {
            warn!(id, "Completed download not found");
            return;
        };
        if raw.state != HostState::Complete {
            return;
        }

        if self.settings.open_folder
            && let Err(error) = self.control.show(id).await
        {
            warn!(id, error = %error, "Failed to open download folder");
        }
        if self.settings.show_notification {
            let notice = CompletionNotice::new(id, &raw.filename, &self.settings);
            self.notifier.notify(&notice);
        }
    }

    async fn fetch(&self, id: i64) -> Option<HostDownload> {
        match self.control.engine().search(SearchQuery::by_id(id)).await {
            Ok(results) => results.into_iter().next(),
            Err(error) => {
                warn!(id, error = %error, "Host lookup failed");
                None
            }
        }
    }

    fn ingest_snapshot(&mut self, raw: HostDownload, now_ms: i64) {
        let id = raw.id;
        if raw.state == HostState::InProgress {
            self.cancelled.remove(&id);
        }
        self.ledger.ingest(&raw, now_ms);
        self.snapshots.insert(id, raw);
        self.apply_cancellation(id);
    }

    fn apply_cancellation(&mut self, id: i64) {
        if !self.cancelled.contains(&id) {
            return;
        }
        if self.ledger.get(id).is_some_and(|record| record.status == DownloadStatus::Failed) {
            self.ledger.update(
                id,
                RecordPatch {
                    status: Some(DownloadStatus::Cancelled),
                    ..RecordPatch::default()
                },
            );
        }
    }

    /// Waits for scheduled background work such as auto-resumes.
    pub async fn settle(&mut self) {
        for handle in self.background.drain(..) {
            if let Err(error) = handle.await {
                warn!(error = %error, "Background task failed");
            }
        }
    }

    // ==================== User operations ====================

    /// Pauses a download.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Host`] if the host rejects the request.
    pub async fn pause(&self, id: i64) -> control::Result<()> {
        self.control.pause(id).await
    }

    /// Resumes a paused or interrupted download.
    ///
    /// # Errors
    ///
    /// See [`DownloadControl::resume`].
    pub async fn resume(&mut self, id: i64) -> control::Result<()> {
        self.control.resume(id).await?;
        self.cancelled.remove(&id);
        Ok(())
    }

    /// Cancels a download. The record shows as cancelled once the host
    /// reports the interruption.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Host`] if the host rejects the request.
    pub async fn cancel(&mut self, id: i64) -> control::Result<()> {
        self.control.cancel(id).await?;
        self.cancelled.insert(id);
        self.apply_cancellation(id);
        Ok(())
    }

    /// Opens a downloaded file.
    ///
    /// # Errors
    ///
    /// See [`DownloadControl::open`].
    pub async fn open(&self, id: i64) -> control::Result<()> {
        self.control.open(id).await
    }

    /// Reveals a downloaded file in its folder.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Host`] if the host rejects the request.
    pub async fn show(&self, id: i64) -> control::Result<()> {
        self.control.show(id).await
    }

    /// Erases the host record; the ledger follows on the erase event.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Host`] if the host rejects the request.
    pub async fn delete_record(&self, id: i64) -> control::Result<()> {
        self.control.delete_record(id).await
    }

    /// Deletes the file and erases the host record.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Host`] if the erase fails.
    pub async fn delete_file_and_record(&self, id: i64) -> control::Result<()> {
        self.control.delete_file_and_record(id).await
    }

    /// Retries the download recorded under `id`.
    ///
    /// The record's timing is preserved before the host is touched. When the
    /// host starts a new download, the new record takes the old record's slot
    /// (by id, then by URL) or is added if neither is present any more.
    ///
    /// # Errors
    ///
    /// - [`ControlError::NotFound`] if the ledger has no record with `id`
    /// - any error of [`DownloadControl::retry`]
    #[instrument(skip(self))]
    pub async fn retry(&mut self, id: i64) -> control::Result<RetryOutcome> {
        let record = self
            .ledger
            .get(id)
            .cloned()
            .ok_or(ControlError::NotFound { id })?;
        self.ledger.preserve_times(id);

        let outcome = self.control.retry(&record).await?;
        if let RetryOutcome::Restarted { old_id, new_id } = outcome {
            self.cancelled.remove(&old_id);
            self.snapshots.remove(&old_id);
            self.adopt_restarted(old_id, new_id, &record.url).await;
        }
        Ok(outcome)
    }

    async fn adopt_restarted(&mut self, old_id: i64, new_id: i64, url: &str) {
        let Some(raw) = self.fetch(new_id).await else {
            debug!(new_id, "New download not visible yet; waiting for its created event");
            return;
        };
        let now = now_ms();
        let Some(record) = self.ledger.normalize(&raw, now) else {
            return;
        };
        self.snapshots.insert(new_id, raw);

        if self.ledger.replace_by_id(old_id, record.clone()).is_ok() {
            return;
        }
        if self.ledger.replace_by_url(url, record.clone()).is_ok() {
            return;
        }
        self.ledger.upsert(record);
    }

    // ==================== Queries ====================

    /// Records in ledger order.
    #[must_use]
    pub fn records(&self) -> &[DownloadRecord] {
        self.ledger.records()
    }

    #[must_use]
    pub fn ledger(&self) -> &DownloadLedger {
        &self.ledger
    }

    /// Current page of the filtered and sorted records.
    #[must_use]
    pub fn page(&self) -> Page {
        self.view.project(self.ledger.records())
    }

    /// Counts over all records, ignoring the view.
    #[must_use]
    pub fn stats(&self) -> Stats {
        stats(self.ledger.records())
    }

    #[must_use]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    #[must_use]
    pub fn settings(&self) -> DownloadSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: DownloadSettings) {
        self.settings = settings;
    }

    /// Badge label from a fresh host search; empty when the host is
    /// unreachable.
    pub async fn badge_text(&self) -> String {
        match self.control.engine().search(SearchQuery::all()).await {
            Ok(downloads) => badge::badge_text(badge::active_count(&downloads)),
            Err(error) => {
                warn!(error = %error, "Failed to update badge");
                String::new()
            }
        }
    }

    // ==================== View setters ====================

    pub fn set_filter(&mut self, filter: FilterOptions) {
        self.view.set_filter(filter);
    }

    pub fn clear_filters(&mut self) {
        self.view.clear_filters();
    }

    pub fn set_sort(&mut self, sort: SortOptions) {
        self.view.set_sort(sort);
    }

    pub fn set_current_page(&mut self, page: usize) {
        self.view.set_current_page(page);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.view.set_page_size(page_size);
    }
}
