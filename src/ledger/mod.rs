//! Download ledger: the reconciled, in-memory set of download records.
//!
//! The ledger merges normalized host records into one record per host id and
//! keeps the original timing of a logical download stable across retries.
//!
//! # Overview
//!
//! - [`DownloadLedger`] - Ordered record store with reconciliation rules
//! - [`LedgerError`] - Replacement failures
//!
//! # Timing rules
//!
//! A retried download gets a new host id and a fresh start time. The ledger
//! keeps the first observed start time for a URL by consulting, in order:
//!
//! 1. the [`TimePreservationLedger`] entry for the URL, when one exists;
//! 2. otherwise the earliest-starting other record with the same URL, when
//!    its start time is earlier;
//! 3. then, for an id already in the ledger and no preservation entry, the
//!    existing start time when it is earlier.
//!
//! Records that reach a terminal status seed the preservation ledger, as do
//! replacements and explicit [`DownloadLedger::preserve_times`] calls.
//!
//! # Example
//!
//! ```
//! use tracker_core::ledger::DownloadLedger;
//! use tracker_core::host::HostDownload;
//!
//! let mut ledger = DownloadLedger::new();
//! let mut raw = HostDownload::new(1, "https://example.com/a.zip");
//! raw.filename = "/tmp/a.zip".to_string();
//! assert!(ledger.ingest(&raw, 0));
//! assert_eq!(ledger.get(1).map(|r| r.name.as_str()), Some("a.zip"));
//! ```

mod error;

pub use error::LedgerError;

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::convert;
use crate::host::HostDownload;
use crate::preserve::TimePreservationLedger;
use crate::record::{DownloadRecord, DownloadStatus, RecordPatch};
use crate::speed::SpeedEstimator;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ordered collection of reconciled records keyed by host id.
///
/// Insertion order is kept; replacements reuse the slot of the record they
/// replace.
#[derive(Debug, Default)]
pub struct DownloadLedger {
    records: Vec<DownloadRecord>,
    preserved: TimePreservationLedger,
    speed: SpeedEstimator,
}

impl DownloadLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates a normalized record, applying the timing rules.
    pub fn upsert(&mut self, record: DownloadRecord) {
        let mut record = record;
        if record.status != DownloadStatus::Downloading {
            record.speed = 0.0;
            self.speed.clear(record.id);
        }
        let preserved = self.preserved.lookup(&record.url);

        if let Some(times) = preserved {
            record.start_time = times.start_time;
            if times.end_time.is_some() {
                record.end_time = times.end_time;
            }
        } else if let Some(earlier) = self
            .records
            .iter()
            .filter(|other| other.url == record.url && other.id != record.id)
            .min_by_key(|other| other.start_time)
            .filter(|other| other.start_time < record.start_time)
        {
            trace!(
                id = record.id,
                sibling_id = earlier.id,
                start_time = earlier.start_time,
                "Adopting start time from same-url record"
            );
            record.start_time = earlier.start_time;
            record.end_time = earlier.end_time.or(record.end_time);
        }

        match self.position(record.id) {
            Some(index) => {
                let existing = &self.records[index];
                if preserved.is_none() && existing.start_time < record.start_time {
                    record.start_time = existing.start_time;
                    record.end_time = existing.end_time.or(record.end_time);
                }
                self.records[index] = record;
                self.seed_preservation(index);
            }
            None => {
                debug!(id = record.id, name = %record.name, status = %record.status, "Adding download record");
                self.records.push(record);
                self.seed_preservation(self.records.len() - 1);
            }
        }
    }

    /// Normalizes a raw host record and upserts it.
    ///
    /// Returns false when the record was dropped as unresolvable.
    pub fn ingest(&mut self, raw: &HostDownload, now_ms: i64) -> bool {
        match self.normalize(raw, now_ms) {
            Some(record) => {
                self.upsert(record);
                true
            }
            None => false,
        }
    }

    /// Normalizes a raw host record without storing it.
    ///
    /// Shares the ledger's speed estimator, so it counts as an observation.
    pub fn normalize(&mut self, raw: &HostDownload, now_ms: i64) -> Option<DownloadRecord> {
        convert::convert(raw, &mut self.speed, now_ms)
    }

    /// Applies a partial update to the record with `id`.
    ///
    /// Returns whether the record existed. A record that ends up outside
    /// `Downloading` has its speed zeroed and its estimator entry cleared.
    pub fn update(&mut self, id: i64, patch: RecordPatch) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let record = &mut self.records[index];
        patch.apply_to(record);
        if record.status != DownloadStatus::Downloading {
            record.speed = 0.0;
            self.speed.clear(id);
        }
        self.seed_preservation(index);
        true
    }

    /// Replaces the record with `old_id`, keeping its slot and its timing.
    ///
    /// The new record takes the old start time, and the old end time when the
    /// old record has one.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if no record has `old_id`.
    pub fn replace_by_id(&mut self, old_id: i64, record: DownloadRecord) -> Result<()> {
        let index = self.position(old_id).ok_or(LedgerError::NotFound(old_id))?;
        self.replace_at(index, record);
        Ok(())
    }

    /// Replaces the first record with `url`, keeping its slot and its timing.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UrlNotFound`] if no record has `url`.
    pub fn replace_by_url(&mut self, url: &str, record: DownloadRecord) -> Result<()> {
        let index = self
            .records
            .iter()
            .position(|existing| existing.url == url)
            .ok_or_else(|| LedgerError::url_not_found(url))?;
        self.replace_at(index, record);
        Ok(())
    }

    /// Removes the record with `id` and its speed sample.
    ///
    /// Preserved timing for the URL is kept.
    pub fn remove(&mut self, id: i64) -> Option<DownloadRecord> {
        self.speed.clear(id);
        let index = self.position(id)?;
        debug!(id, "Removing download record");
        Some(self.records.remove(index))
    }

    /// Drops every record whose id is not in `ids`; returns how many went.
    pub fn retain_ids(&mut self, ids: &HashSet<i64>) -> usize {
        let before = self.records.len();
        let speed = &mut self.speed;
        self.records.retain(|record| {
            let keep = ids.contains(&record.id);
            if !keep {
                speed.clear(record.id);
            }
            keep
        });
        before - self.records.len()
    }

    /// Records the timing of `id` in the preservation ledger.
    ///
    /// Called before a retry so the restarted download keeps its history even
    /// if the old record disappears first. Returns false if `id` is unknown.
    pub fn preserve_times(&mut self, id: i64) -> bool {
        match self.get(id) {
            Some(record) => {
                let (url, start, end) = (record.url.clone(), record.start_time, record.end_time);
                self.preserved.record_if_absent(&url, start, end);
                true
            }
            None => false,
        }
    }

    /// Drops the speed sample for `id`.
    pub fn clear_speed(&mut self, id: i64) {
        self.speed.clear(id);
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&DownloadRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// First record with `url`, in ledger order.
    #[must_use]
    pub fn find_by_url(&self, url: &str) -> Option<&DownloadRecord> {
        self.records.iter().find(|record| record.url == url)
    }

    /// All records in ledger order.
    #[must_use]
    pub fn records(&self) -> &[DownloadRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read access to the URL timing index.
    #[must_use]
    pub fn preserved(&self) -> &TimePreservationLedger {
        &self.preserved
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    fn replace_at(&mut self, index: usize, record: DownloadRecord) {
        let mut record = record;
        let old = &self.records[index];
        let old_id = old.id;
        self.preserved
            .record_if_absent(&old.url, old.start_time, old.end_time);

        record.start_time = old.start_time;
        record.end_time = old.end_time.or(record.end_time);
        debug!(old_id, new_id = record.id, start_time = record.start_time, "Replacing download record");

        if old_id != record.id {
            self.speed.clear(old_id);
        }
        let new_id = record.id;
        self.records[index] = record;

        // Drop a record already ingested under the new id.
        let mut cursor = 0;
        self.records.retain(|existing| {
            let keep = cursor == index || existing.id != new_id;
            cursor += 1;
            keep
        });
        if let Some(index) = self.position(new_id) {
            self.seed_preservation(index);
        }
    }

    fn seed_preservation(&mut self, index: usize) {
        let record = &self.records[index];
        if record.status.is_terminal() {
            self.preserved
                .record_if_absent(&record.url, record.start_time, record.end_time);
        }
    }
}
