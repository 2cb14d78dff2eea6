//! Error types for ledger operations.

use thiserror::Error;

/// Errors that can occur when replacing or mutating ledger records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No record with the given id exists.
    #[error(
        "download record not found: id {0}\n  Suggestion: The record may have been erased by the host; refresh the ledger"
    )]
    NotFound(i64),

    /// No record with the given source URL exists.
    #[error(
        "no download record for url '{url}'\n  Suggestion: The original record may have been deleted before the retry completed"
    )]
    UrlNotFound {
        /// The source URL that was looked up
        url: String,
    },
}

impl LedgerError {
    /// Creates a `UrlNotFound` error for `url`.
    #[must_use]
    pub fn url_not_found(url: &str) -> Self {
        Self::UrlNotFound {
            url: url.to_string(),
        }
    }
}
