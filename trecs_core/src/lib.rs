//! trecs Core - Recommender-System Feedback Loop Simulation
//!
//! This library simulates a model mediating repeated interactions between a
//! population of users and a catalog of items:
//! 1. **Run loop**: Predict → Select → Interact → Update → Record, once per timestep
//! 2. **Histories**: aligned metric series and component snapshots, with
//!    index 0 reserved for the pre-simulation state
//! 3. **Models**: content filtering (profile reinforcement) and Bass-style
//!    diffusion over a social graph (virality)

pub mod component;
pub mod content;
pub mod diffusion;
pub mod engine;
pub mod error;
pub mod items;
pub mod measurement;
pub mod metrics;
pub mod report;
pub mod state;
pub mod users;

// Re-export key types for convenience
pub use component::{Component, ComponentKey, Matrix};
pub use content::{ContentFiltering, ContentFilteringConfig};
pub use diffusion::{Diffusion, DiffusionConfig, DiffusionTree};
pub use engine::{ModelBehavior, RecommenderEngine, SystemView};
pub use error::{Result, TrecsError};
pub use items::Items;
pub use measurement::{MeasurementModule, Measurements, Metric, MetricSeries};
pub use metrics::{InfectedFraction, InteractionSpread, RecommendationCoverage};
pub use report::{MemorySink, ReportSink};
pub use state::SystemStateModule;
pub use users::{Feedback, HighestScore, InteractionRule, RandomChoice, Recommendations, Users};
