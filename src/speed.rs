//! Instantaneous transfer-rate estimation from consecutive byte-count samples.
//!
//! The host reports cumulative bytes only, so the rate is derived from the
//! previous observation of the same id. State lives for the process lifetime
//! and is keyed strictly by host id.

use std::collections::HashMap;

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    bytes: u64,
    timestamp_ms: i64,
}

/// Per-id rolling sample cache.
#[derive(Debug, Default)]
pub struct SpeedEstimator {
    samples: HashMap<i64, Sample>,
}

impl SpeedEstimator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `bytes` observed at `now_ms` and returns bytes per second since
    /// the previous sample.
    ///
    /// The first sample for an id returns 0. A non-positive elapsed time also
    /// returns 0 but still replaces the stored sample. Regressing byte counts
    /// never produce a negative rate.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample(&mut self, id: i64, bytes: u64, now_ms: i64) -> f64 {
        let current = Sample {
            bytes,
            timestamp_ms: now_ms,
        };
        let Some(previous) = self.samples.insert(id, current) else {
            trace!(id, bytes, "First speed sample");
            return 0.0;
        };

        let elapsed_ms = now_ms - previous.timestamp_ms;
        if elapsed_ms <= 0 {
            return 0.0;
        }

        let delta = bytes as f64 - previous.bytes as f64;
        let speed = delta / (elapsed_ms as f64 / 1000.0);
        speed.max(0.0)
    }

    /// Drops the cached sample for `id`.
    pub fn clear(&mut self, id: i64) {
        self.samples.remove(&id);
    }

    /// Returns true when a sample is cached for `id`.
    #[must_use]
    pub fn is_tracking(&self, id: i64) -> bool {
        self.samples.contains_key(&id)
    }

    /// Number of ids currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
