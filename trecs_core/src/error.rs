//! Error types for the trecs engine.

use thiserror::Error;
use trecs_env::SampleError;

/// Errors raised by the engine and its modules.
///
/// Numeric edge conditions (a metric that is undefined at timestep 0, a
/// diffusion tree without edges) are not errors; they surface as `None`.
#[derive(Debug, Error)]
pub enum TrecsError {
    /// Measurements were requested but no metric was ever registered
    #[error("No measurement module defined")]
    NoMeasurementModule,

    /// System state was requested but no variable is tracked
    #[error("No system state variables defined")]
    NoStateVariables,

    /// A supplied matrix does not have the required shape
    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A declared dimension disagrees with a supplied representation
    #[error("Dimension conflict for {what}: declared {declared}, representation implies {inferred}")]
    DimensionConflict {
        what: &'static str,
        declared: usize,
        inferred: usize,
    },

    /// The model only supports a fixed number of items
    #[error("{model} requires exactly {expected} item(s), got {actual}")]
    UnsupportedItemCount {
        model: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A matrix that must stay non-negative contains a negative entry
    #[error("Negative entry in {0}")]
    NegativeEntry(String),

    /// A user or item index is out of range
    #[error("Index {index} out of range for {what} (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// A tracked component could not be resolved
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// Users or items are missing (zero-sized)
    #[error("Engine not initialized: {0}")]
    Uninitialized(String),

    /// Registration happened after timesteps elapsed
    #[error("Usage order error: {0}")]
    UsageOrder(String),

    /// A metric or state variable with this name is already registered
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// The random source rejected a request
    #[error("Sampling failed: {0}")]
    Sample(#[from] SampleError),
}

impl TrecsError {
    /// Creates a shape mismatch error.
    pub fn shape(what: impl Into<String>, expected: (usize, usize), actual: (usize, usize)) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Creates a usage-order error.
    pub fn usage_order(msg: impl Into<String>) -> Self {
        Self::UsageOrder(msg.into())
    }

    /// Returns true for errors caused by invalid configuration or inputs.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::UsageOrder(_) | Self::DuplicateName(_))
    }
}

/// Result alias used throughout trecs_core.
pub type Result<T> = std::result::Result<T, TrecsError>;
