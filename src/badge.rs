//! Active-download counter for an icon badge.

use crate::host::{HostDownload, HostState};

/// Counts above this are shown as `99+`.
pub const BADGE_MAX: usize = 99;

/// Counts raw host records that are transferring, or paused after an
/// interruption and still resumable.
#[must_use]
pub fn active_count(downloads: &[HostDownload]) -> usize {
    downloads
        .iter()
        .filter(|download| match download.state {
            HostState::InProgress => !download.paused,
            HostState::Interrupted => download.paused && download.can_resume == Some(true),
            HostState::Complete => false,
        })
        .count()
}

/// Badge label for `count`: empty for zero, capped at `99+`.
#[must_use]
pub fn badge_text(count: usize) -> String {
    match count {
        0 => String::new(),
        n if n > BADGE_MAX => format!("{BADGE_MAX}+"),
        n => n.to_string(),
    }
}
