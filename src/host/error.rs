//! Error types reported by the host download engine.

use thiserror::Error;

/// Failure reported by the host for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host processed the request and refused it.
    #[error("{message}")]
    Rejected {
        /// Host-supplied error text.
        message: String,
    },

    /// The host download API could not be reached at all.
    #[error("download API is unavailable; make sure the extension is installed correctly")]
    Unavailable,
}

impl HostError {
    /// Creates a `Rejected` error from host-supplied text.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Human-readable message suitable for surfacing to the UI layer.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_displays_host_message_verbatim() {
        let err = HostError::rejected("Download must be in progress");
        assert_eq!(err.to_string(), "Download must be in progress");
        assert_eq!(err.message(), "Download must be in progress");
    }

    #[test]
    fn test_unavailable_message_is_actionable() {
        let msg = HostError::Unavailable.to_string();
        assert!(msg.contains("unavailable"));
    }
}
