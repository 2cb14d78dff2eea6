//! Filtered, sorted and paginated projections of the ledger.
//!
//! Views are computed on demand from the live records; nothing derived is
//! stored. The pipeline is filter, then stable sort, then paginate.

pub mod pagination;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::{DownloadRecord, DownloadStatus, FileType};

pub use pagination::{
    DEFAULT_PAGE_SIZE, JsonFilePaginationStore, MemoryPaginationStore, PaginationState,
    PaginationStore,
};

/// Conjunctive record filter. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub status: Option<DownloadStatus>,
    pub file_type: Option<FileType>,
    /// Case-insensitive substring of the record name.
    pub search_text: Option<String>,
}

impl FilterOptions {
    /// Returns true when `record` passes every set criterion.
    #[must_use]
    pub fn matches(&self, record: &DownloadRecord) -> bool {
        if self.status.is_some_and(|status| record.status != status) {
            return false;
        }
        if self.file_type.is_some_and(|file_type| record.file_type != file_type) {
            return false;
        }
        match self.search_text.as_deref() {
            Some(text) if !text.is_empty() => {
                record.name.to_lowercase().contains(&text.to_lowercase())
            }
            _ => true,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.file_type.is_none()
            && self.search_text.as_deref().is_none_or(str::is_empty)
    }
}

/// Sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Name,
    Size,
    /// Start time.
    #[default]
    Time,
}

impl SortBy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Size => "size",
            Self::Time => "time",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "size" => Ok(Self::Size),
            "time" => Ok(Self::Time),
            _ => Err(format!("invalid sort key: {s}")),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("invalid sort order: {s}")),
        }
    }
}

/// Sort key and direction; defaults to newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOptions {
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl SortOptions {
    fn compare(self, a: &DownloadRecord, b: &DownloadRecord) -> Ordering {
        let ordering = match self.sort_by {
            SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortBy::Size => a.size.cmp(&b.size),
            SortBy::Time => a.start_time.cmp(&b.start_time),
        };
        match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// One page of a projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<DownloadRecord>,
    /// Records passing the filter, across all pages.
    pub total_items: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub page_size: usize,
}

/// Per-status counts over the unfiltered ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub downloading: usize,
    pub completed: usize,
    pub paused: usize,
    pub failed: usize,
}

/// Computes [`Stats`] in a single pass. Cancelled records count toward the
/// total only.
#[must_use]
pub fn stats(records: &[DownloadRecord]) -> Stats {
    records.iter().fold(Stats::default(), |mut stats, record| {
        stats.total += 1;
        match record.status {
            DownloadStatus::Downloading => stats.downloading += 1,
            DownloadStatus::Completed => stats.completed += 1,
            DownloadStatus::Paused => stats.paused += 1,
            DownloadStatus::Failed => stats.failed += 1,
            DownloadStatus::Cancelled => {}
        }
        stats
    })
}

/// Filter, sort and pagination state of the download list.
///
/// Filter and sort changes reset the page without persisting; page and page
/// size changes are written to the [`PaginationStore`].
#[derive(Debug, Clone)]
pub struct ViewState {
    filter: FilterOptions,
    sort: SortOptions,
    pagination: PaginationState,
    store: Arc<dyn PaginationStore>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(Arc::new(MemoryPaginationStore::new()), DEFAULT_PAGE_SIZE)
    }
}

impl ViewState {
    /// Creates a view restoring pagination from `store`.
    ///
    /// With nothing stored the view starts at page 1 with `default_page_size`.
    #[must_use]
    pub fn new(store: Arc<dyn PaginationStore>, default_page_size: usize) -> Self {
        let pagination = store.load().map_or_else(
            || PaginationState::with_page_size(default_page_size),
            |state| state.normalized(default_page_size),
        );
        debug!(
            current_page = pagination.current_page,
            page_size = pagination.page_size,
            "Restored pagination"
        );
        Self {
            filter: FilterOptions::default(),
            sort: SortOptions::default(),
            pagination,
            store,
        }
    }

    #[must_use]
    pub fn filter(&self) -> &FilterOptions {
        &self.filter
    }

    #[must_use]
    pub fn sort(&self) -> SortOptions {
        self.sort
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.pagination.current_page
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.pagination.page_size
    }

    /// Replaces the filter and returns to page 1.
    pub fn set_filter(&mut self, filter: FilterOptions) {
        self.filter = filter;
        self.pagination.current_page = 1;
    }

    /// Clears every filter criterion and returns to page 1.
    pub fn clear_filters(&mut self) {
        self.set_filter(FilterOptions::default());
    }

    /// Replaces the sort and returns to page 1.
    pub fn set_sort(&mut self, sort: SortOptions) {
        self.sort = sort;
        self.pagination.current_page = 1;
    }

    /// Moves to `page` (clamped to at least 1) and persists.
    pub fn set_current_page(&mut self, page: usize) {
        self.pagination.current_page = page.max(1);
        self.store.save(self.pagination);
    }

    /// Changes the page size (clamped to at least 1), returns to page 1 and
    /// persists.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.pagination.page_size = page_size.max(1);
        self.pagination.current_page = 1;
        self.store.save(self.pagination);
    }

    /// Filtered and sorted records, all pages.
    #[must_use]
    pub fn sorted(&self, records: &[DownloadRecord]) -> Vec<DownloadRecord> {
        let mut matching: Vec<DownloadRecord> = records
            .iter()
            .filter(|record| self.filter.matches(record))
            .cloned()
            .collect();
        // Vec::sort_by is stable.
        matching.sort_by(|a, b| self.sort.compare(a, b));
        matching
    }

    /// Projects the current page of `records`.
    ///
    /// A page past the end yields no items but keeps the requested page
    /// number.
    #[must_use]
    pub fn project(&self, records: &[DownloadRecord]) -> Page {
        let sorted = self.sorted(records);
        let page_size = self.pagination.page_size.max(1);
        let current_page = self.pagination.current_page.max(1);
        let total_items = sorted.len();
        let start = (current_page - 1).saturating_mul(page_size);
        let items = sorted.into_iter().skip(start).take(page_size).collect();

        Page {
            items,
            total_items,
            total_pages: total_items.div_ceil(page_size),
            current_page,
            page_size,
        }
    }
}
