//! Persistence of the user's pagination preference.
//!
//! The stored document is `{"currentPage": n, "pageSize": n}`. A missing or
//! unreadable document loads as nothing stored; the view then starts at page 1
//! with its configured default page size.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default 1-based page.
pub const DEFAULT_CURRENT_PAGE: usize = 1;

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Current page and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    /// Missing or zero values are replaced by [`PaginationState::normalized`].
    #[serde(default)]
    pub current_page: usize,
    #[serde(default)]
    pub page_size: usize,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            current_page: DEFAULT_CURRENT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PaginationState {
    /// Starts at page 1 with `page_size` items per page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            current_page: DEFAULT_CURRENT_PAGE,
            page_size,
        }
        .normalized(DEFAULT_PAGE_SIZE)
    }

    /// Replaces zero values with page 1 and `default_page_size`.
    #[must_use]
    pub fn normalized(self, default_page_size: usize) -> Self {
        Self {
            current_page: if self.current_page == 0 {
                DEFAULT_CURRENT_PAGE
            } else {
                self.current_page
            },
            page_size: if self.page_size == 0 {
                default_page_size.max(1)
            } else {
                self.page_size
            },
        }
    }
}

/// Storage for the pagination preference.
///
/// Implementations never fail outward: problems are logged, a failed load
/// reports nothing stored and a failed save keeps the previous value.
pub trait PaginationStore: Send + Sync + fmt::Debug {
    /// Returns the stored state, if any.
    fn load(&self) -> Option<PaginationState>;

    /// Persists `state`.
    fn save(&self, state: PaginationState);
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct JsonFilePaginationStore {
    path: PathBuf,
}

impl JsonFilePaginationStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PaginationStore for JsonFilePaginationStore {
    fn load(&self) -> Option<PaginationState> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored pagination settings");
                return None;
            }
            Err(error) => {
                warn!(path = %self.path.display(), error = %error, "Failed to read pagination settings");
                return None;
            }
        };

        match serde_json::from_str::<PaginationState>(&contents) {
            Ok(state) => Some(state),
            Err(error) => {
                warn!(path = %self.path.display(), error = %error, "Invalid pagination settings, using defaults");
                None
            }
        }
    }

    fn save(&self, state: PaginationState) {
        let json = match serde_json::to_string(&state) {
            Ok(json) => json,
            Err(error) => {
                warn!(error = %error, "Failed to encode pagination settings");
                return;
            }
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(error) = fs::create_dir_all(parent)
        {
            warn!(path = %parent.display(), error = %error, "Failed to create pagination settings directory");
            return;
        }
        if let Err(error) = fs::write(&self.path, json) {
            warn!(path = %self.path.display(), error = %error, "Failed to save pagination settings");
        }
    }
}

/// Process-local store; starts empty unless seeded.
#[derive(Debug, Default)]
pub struct MemoryPaginationStore {
    state: Mutex<Option<PaginationState>>,
}

impl MemoryPaginationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_state(state: PaginationState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    /// Last saved (or seeded) state.
    #[must_use]
    pub fn stored(&self) -> Option<PaginationState> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PaginationStore for MemoryPaginationStore {
    fn load(&self) -> Option<PaginationState> {
        self.stored()
    }

    fn save(&self, state: PaginationState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Some(state);
    }
}
