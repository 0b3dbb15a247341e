//! trecs Environment Abstraction Layer
//!
//! This crate isolates the only source of non-determinism in a trecs
//! simulation: randomness. Every stochastic step of the engine (model
//! initialization, exploration, interaction tie-breaking) draws from a
//! [`RandomSource`] value that is passed in explicitly, never from a
//! process-wide generator.
//!
//! # Core Concept
//!
//! All entropy is derived from a single 64-bit seed, so any run becomes
//! reproducible from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use trecs_env::{NamedDistribution, RandomSource, SeededSource};
//!
//! let mut rng = SeededSource::new(42);
//! let items = rng.sample_matrix(10, 50, NamedDistribution::Bernoulli { p: 0.3 })?;
//! ```

mod distribution;
mod error;
mod random;
mod seeded;

pub use distribution::{derive_seed, NamedDistribution};
pub use error::SampleError;
pub use random::RandomSource;
pub use seeded::SeededSource;
