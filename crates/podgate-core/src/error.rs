//! Common error types for podgate.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while validating caller-supplied values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A name is not a legal orchestrator object name.
    #[error("invalid {field} '{value}': {source}")]
    InvalidName {
        /// Which field carried the name.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        source: crate::names::NameError,
    },

    /// A required descriptor field is missing or empty.
    #[error("missing {0}")]
    Missing(&'static str),

    /// The cluster endpoint is not an absolute http(s) URL.
    #[error("invalid endpoint '{0}': expected an absolute http or https URL")]
    InvalidEndpoint(String),
}
