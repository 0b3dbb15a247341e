//! trecs Scenario Harness
//!
//! Canned end-to-end runs of the trecs engine. Each scenario builds an
//! engine from a single 64-bit seed, runs it, checks the invariants every
//! run must keep and collects its series for export.
//!
//! # Usage
//!
//! ```ignore
//! use trecs_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 100).with_timesteps(50);
//! let result = runner.run(ScenarioId::FriendStar);
//! assert!(result.passed);
//! ```

mod error;
mod exporter;
mod runner;
pub mod scenarios;

pub use error::{Result, SimError};
pub use exporter::{ExportedSeries, SimExport};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
