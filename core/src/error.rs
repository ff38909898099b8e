//! Error type shared by every fallible engine operation.

use thiserror::Error;

/// Errors raised by the search engine.
///
/// Every failure is a rejected input; nothing in the engine is retryable and a
/// failed call never leaves partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// A caller-supplied id, word, stop word or query was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SearchError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
