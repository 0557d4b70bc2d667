//! Error types for reflex-hub

use thiserror::Error;

/// Result type for reflex-hub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in reflex-hub
#[derive(Debug, Error)]
pub enum Error {
    /// A backward tick asked for more steps than history holds
    ///
    /// Nothing is undone when this is returned.
    #[error("cannot undo {requested} ticks, history holds {}", Self::format_entries(*.available))]
    HistoryExhausted {
        /// Number of steps requested
        requested: usize,
        /// Number of entries in history
        available: usize,
    },

    /// Removing a rule whose source is not registered
    #[error("rule {0:?} is not registered")]
    UnknownRule(String),

    /// Core error
    #[error("core error: {0}")]
    Core(#[from] reflex_core::Error),
}

impl Error {
    /// Whether this error leaves the engine untouched
    pub fn is_rejected_request(&self) -> bool {
        matches!(self, Error::HistoryExhausted { .. } | Error::UnknownRule(_))
    }

    fn format_entries(count: usize) -> String {
        if count == 1 {
            "1 entry".to_string()
        } else {
            format!("{} entries", count)
        }
    }
}

// Compile-time check that Error is Send + Sync for thread-safe error propagation.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_exhausted_message() {
        let err = Error::HistoryExhausted {
            requested: 3,
            available: 1,
        };
        assert_eq!(err.to_string(), "cannot undo 3 ticks, history holds 1 entry");
        assert!(err.is_rejected_request());
    }

    #[test]
    fn test_core_error_converts() {
        let err: Error = reflex_core::Error::DivisionByZero.into();
        assert!(matches!(err, Error::Core(_)));
        assert!(!err.is_rejected_request());
    }
}
