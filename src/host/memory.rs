//! In-process host engine.
//!
//! Keeps raw records in memory and applies host-like state transitions for
//! control requests. Used by integration tests and by the replay CLI, where
//! the event log is the only source of truth.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::{
    DownloadOptions, HostDownload, HostEngine, HostError, HostEvent, HostOperation, HostState,
    SearchQuery,
};

/// Host error text used when a cancelled download is reported back.
const USER_CANCELED: &str = "USER_CANCELED";

/// Request recorded by [`MemoryHost`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCall {
    pub operation: HostOperation,
    pub id: Option<i64>,
}

#[derive(Debug, Default)]
struct HostInner {
    downloads: BTreeMap<i64, HostDownload>,
    next_id: i64,
    faults: HashMap<HostOperation, String>,
    calls: Vec<HostCall>,
}

/// Thread-safe in-memory [`HostEngine`].
#[derive(Debug, Default)]
pub struct MemoryHost {
    inner: Mutex<HostInner>,
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HostInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces a raw record.
    pub fn insert(&self, raw: HostDownload) {
        let mut inner = self.lock();
        inner.next_id = inner.next_id.max(raw.id);
        inner.downloads.insert(raw.id, raw);
    }

    /// Mirrors a host notification into the stored records.
    pub fn observe(&self, event: &HostEvent) {
        match event {
            HostEvent::Created(raw) => self.insert(raw.clone()),
            HostEvent::Changed(delta) => {
                let mut inner = self.lock();
                if let Some(raw) = inner.downloads.get_mut(&delta.id)
                    && let Err(error) = delta.apply_to(raw)
                {
                    debug!(error = %error, "Ignoring mismatched delta");
                }
            }
            HostEvent::Erased { id } => {
                self.lock().downloads.remove(id);
            }
        }
    }

    /// Returns a copy of one raw record.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<HostDownload> {
        self.lock().downloads.get(&id).cloned()
    }

    /// Makes every subsequent call of `operation` fail with `message`.
    pub fn fail_on(&self, operation: HostOperation, message: &str) {
        self.lock().faults.insert(operation, message.to_string());
    }

    /// Removes an injected fault.
    pub fn clear_fault(&self, operation: HostOperation) {
        self.lock().faults.remove(&operation);
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    /// Returns how often `operation` was requested.
    #[must_use]
    pub fn call_count(&self, operation: HostOperation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Records the call and returns the injected fault, if any.
    fn begin(
        &self,
        operation: HostOperation,
        id: Option<i64>,
    ) -> Result<MutexGuard<'_, HostInner>, HostError> {
        let mut inner = self.lock();
        inner.calls.push(HostCall { operation, id });
        if let Some(message) = inner.faults.get(&operation) {
            return Err(HostError::rejected(message.clone()));
        }
        Ok(inner)
    }
}

fn not_found(id: i64) -> HostError {
    HostError::rejected(format!("Invalid download id {id}"))
}

#[async_trait]
impl HostEngine for MemoryHost {
    async fn search(&self, query: SearchQuery) -> Result<Vec<HostDownload>, HostError> {
        let inner = self.begin(HostOperation::Search, query.id)?;
        Ok(inner
            .downloads
            .values()
            .filter(|raw| query.matches(raw))
            .cloned()
            .collect())
    }

    async fn pause(&self, id: i64) -> Result<(), HostError> {
        let mut inner = self.begin(HostOperation::Pause, Some(id))?;
        let raw = inner.downloads.get_mut(&id).ok_or_else(|| not_found(id))?;
        if raw.state != HostState::InProgress {
            return Err(HostError::rejected("Download must be in progress"));
        }
        raw.paused = true;
        raw.can_resume = Some(true);
        Ok(())
    }

    async fn resume(&self, id: i64) -> Result<(), HostError> {
        let mut inner = self.begin(HostOperation::Resume, Some(id))?;
        let raw = inner.downloads.get_mut(&id).ok_or_else(|| not_found(id))?;
        if !raw.is_resumable() {
            return Err(HostError::rejected("DownloadItem.canResume must be true"));
        }
        raw.state = HostState::InProgress;
        raw.paused = false;
        raw.error = None;
        Ok(())
    }

    async fn cancel(&self, id: i64) -> Result<(), HostError> {
        let mut inner = self.begin(HostOperation::Cancel, Some(id))?;
        let raw = inner.downloads.get_mut(&id).ok_or_else(|| not_found(id))?;
        if raw.state == HostState::InProgress {
            raw.state = HostState::Interrupted;
            raw.paused = false;
            raw.can_resume = Some(false);
            raw.error = Some(USER_CANCELED.to_string());
        }
        Ok(())
    }

    async fn erase(&self, query: SearchQuery) -> Result<Vec<i64>, HostError> {
        let mut inner = self.begin(HostOperation::Erase, query.id)?;
        let erased: Vec<i64> = inner
            .downloads
            .values()
            .filter(|raw| query.matches(raw))
            .map(|raw| raw.id)
            .collect();
        for id in &erased {
            inner.downloads.remove(id);
        }
        Ok(erased)
    }

    async fn remove_file(&self, id: i64) -> Result<(), HostError> {
        let mut inner = self.begin(HostOperation::RemoveFile, Some(id))?;
        let raw = inner.downloads.get_mut(&id).ok_or_else(|| not_found(id))?;
        if raw.state != HostState::Complete {
            return Err(HostError::rejected("Download must be complete"));
        }
        raw.exists = Some(false);
        Ok(())
    }

    async fn open(&self, id: i64) -> Result<(), HostError> {
        let inner = self.begin(HostOperation::Open, Some(id))?;
        let raw = inner.downloads.get(&id).ok_or_else(|| not_found(id))?;
        if raw.state != HostState::Complete {
            return Err(HostError::rejected("Download must be complete"));
        }
        if raw.exists == Some(false) {
            return Err(HostError::rejected("File does not exist"));
        }
        Ok(())
    }

    async fn show(&self, id: i64) -> Result<(), HostError> {
        let inner = self.begin(HostOperation::Show, Some(id))?;
        inner.downloads.get(&id).ok_or_else(|| not_found(id))?;
        Ok(())
    }

    async fn download(&self, options: DownloadOptions) -> Result<i64, HostError> {
        let mut inner = self.begin(HostOperation::Download, None)?;
        if options.url.trim().is_empty() {
            return Err(HostError::rejected("Invalid URL"));
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let mut raw = HostDownload::new(id, &options.url);
        raw.filename = options.filename.unwrap_or_default();
        raw.start_time = Some(chrono::Utc::now().to_rfc3339());
        inner.downloads.insert(id, raw);
        debug!(id, url = %options.url, "Started in-memory download");
        Ok(id)
    }
}
