//! URL-keyed memory of the original timing of a logical download.
//!
//! Retrying a download gives it a new host id and a fresh start time. This
//! index keeps the earliest start time (and the first known end time) per
//! source URL so reconciled records keep reporting when the user first
//! downloaded the file. It is a side index: removing a record from the ledger
//! never removes its entry here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Timing remembered for one source URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreservedTimes {
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

/// Side index `url -> PreservedTimes`.
#[derive(Debug, Default, Clone)]
pub struct TimePreservationLedger {
    entries: HashMap<String, PreservedTimes>,
}

impl TimePreservationLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores timing for `url` unless an entry already exists.
    ///
    /// An existing entry only changes in two ways: it adopts an earlier start
    /// time, and it accepts an end time when it has none yet. It never takes a
    /// later start time.
    pub fn record_if_absent(&mut self, url: &str, start_time: i64, end_time: Option<i64>) {
        if url.is_empty() {
            return;
        }
        match self.entries.get_mut(url) {
            Some(entry) => {
                if start_time < entry.start_time {
                    entry.start_time = start_time;
                }
                if entry.end_time.is_none() {
                    entry.end_time = end_time;
                }
            }
            None => {
                trace!(url = %url, start_time, "Preserving download timing");
                self.entries.insert(
                    url.to_string(),
                    PreservedTimes {
                        start_time,
                        end_time,
                    },
                );
            }
        }
    }

    #[must_use]
    pub fn lookup(&self, url: &str) -> Option<PreservedTimes> {
        self.entries.get(url).copied()
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
