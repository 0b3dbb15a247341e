//! Core randomness trait consumed by the trecs engine.

use crate::{NamedDistribution, SampleError};
use nalgebra::DMatrix;

/// The central interface for randomness.
///
/// This trait abstracts entropy so that model initialization and the
/// stochastic steps of a run can be replayed exactly.
///
/// # Implementations
///
/// - **Simulation**: `SeededSource` - wraps `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// Implementations must produce the same sequence of values for the same
/// seed and the same sequence of calls. Matrix sampling fills entries in
/// row-major order.
pub trait RandomSource {
    /// Returns the seed this source was created from (for logging).
    fn seed(&self) -> u64;

    /// Draws one sample from a named distribution.
    fn sample(&mut self, distribution: NamedDistribution) -> Result<f64, SampleError>;

    /// Draws an index uniformly from `0..upper`.
    fn index(&mut self, upper: usize) -> Result<usize, SampleError>;

    /// Shuffles a slice of indices in place.
    fn shuffle(&mut self, values: &mut [usize]);

    /// Fills a `rows × cols` matrix with independent samples.
    fn sample_matrix(
        &mut self,
        rows: usize,
        cols: usize,
        distribution: NamedDistribution,
    ) -> Result<DMatrix<f64>, SampleError> {
        let mut data = Vec::with_capacity(rows * cols);
        for _ in 0..rows * cols {
            data.push(self.sample(distribution)?);
        }
        Ok(DMatrix::from_row_slice(rows, cols, &data))
    }

    /// Picks up to `amount` distinct indices from `0..upper`, skipping
    /// anything in `exclude`.
    ///
    /// Returns fewer than `amount` values when the remaining pool is smaller.
    fn choose_distinct(&mut self, upper: usize, amount: usize, exclude: &[usize]) -> Vec<usize> {
        let mut pool: Vec<usize> = (0..upper).filter(|i| !exclude.contains(i)).collect();
        self.shuffle(&mut pool);
        pool.truncate(amount);
        pool
    }
}
