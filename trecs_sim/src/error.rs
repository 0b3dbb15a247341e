//! Error types for the simulation harness.

use thiserror::Error;
use trecs_core::TrecsError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Engine error: {0}")]
    Engine(#[from] TrecsError),

    #[error("Export failed: {0}")]
    Export(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
