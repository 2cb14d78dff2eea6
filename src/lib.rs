//! Download Tracker Core Library
//!
//! This library reconciles the download notifications of a host download
//! engine into one consistent, queryable set of download records. The host
//! performs every transfer; this crate observes it, normalizes its loosely
//! shaped records, keeps timing stable across retries and drives user
//! control actions back through the host.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`host`] - Host engine contract, raw records, deltas and an in-memory host
//! - [`identity`] - Display-name resolution and self-test placeholder filtering
//! - [`classify`] - File type classification
//! - [`convert`] - Normalization of raw host records
//! - [`speed`] - Transfer-rate estimation
//! - [`preserve`] - URL-keyed timing memory across retries
//! - [`ledger`] - The reconciled record store
//! - [`view`] - Filtering, sorting, pagination and stats
//! - [`control`] - Pause, resume, cancel, retry and file actions
//! - [`settings`] - Completion preferences and notices
//! - [`session`] - Event handling context tying the pieces together
//! - [`config`] - Tracker configuration file

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod badge;
pub mod classify;
pub mod config;
pub mod control;
pub mod convert;
pub mod format;
pub mod host;
pub mod identity;
pub mod ledger;
pub mod preserve;
pub mod record;
pub mod session;
pub mod settings;
pub mod speed;
pub mod view;

// Re-export commonly used types
pub use badge::{active_count, badge_text};
pub use config::{ConfigError, TrackerConfig};
pub use control::{ControlError, DownloadControl, RetryOutcome};
pub use format::{format_file_size, format_remaining_time, format_speed};
pub use host::{
    DownloadDelta, DownloadOptions, FieldChange, HostDownload, HostEngine, HostError, HostEvent,
    HostOperation, HostState, MemoryHost, SearchQuery,
};
pub use ledger::{DownloadLedger, LedgerError};
pub use preserve::{PreservedTimes, TimePreservationLedger};
pub use record::{DownloadRecord, DownloadStatus, FileType, RecordPatch};
pub use session::DownloadSession;
pub use settings::{CompletionNotice, DownloadSettings, Notifier, TracingNotifier};
pub use speed::SpeedEstimator;
pub use view::{
    FilterOptions, JsonFilePaginationStore, MemoryPaginationStore, Page, PaginationState,
    PaginationStore, SortBy, SortOptions, SortOrder, Stats, ViewState,
};
