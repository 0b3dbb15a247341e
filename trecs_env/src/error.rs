//! Error types for the trecs environment abstraction.

use thiserror::Error;

/// Errors that can occur while drawing samples.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    /// Distribution parameters are out of their valid domain
    #[error("Invalid parameters for {distribution}: {reason}")]
    InvalidParameters {
        distribution: &'static str,
        reason: String,
    },

    /// Asked for an index or subset from an empty range
    #[error("Empty range: {0}")]
    EmptyRange(String),
}

impl SampleError {
    /// Creates an invalid-parameters error.
    pub fn invalid(distribution: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            distribution,
            reason: reason.into(),
        }
    }

    /// Creates an empty-range error.
    pub fn empty(msg: impl Into<String>) -> Self {
        Self::EmptyRange(msg.into())
    }
}
