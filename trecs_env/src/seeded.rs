//! Deterministic implementation of RandomSource backed by ChaCha8.

use crate::{NamedDistribution, RandomSource, SampleError};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Binomial, Distribution, Normal, Uniform};

/// Seeded random source.
///
/// Every trecs run owns exactly one of these; two sources built from the
/// same seed yield identical streams.
#[derive(Debug, Clone)]
pub struct SeededSource {
    /// Master seed
    seed: u64,

    /// Underlying generator
    rng: ChaCha8Rng,
}

impl SeededSource {
    /// Creates a new source with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates a source seeded from OS entropy (non-reproducible runs).
    pub fn from_entropy() -> Self {
        let seed: u64 = rand::thread_rng().gen();
        Self::new(seed)
    }
}

impl RandomSource for SeededSource {
    fn seed(&self) -> u64 {
        self.seed
    }

    fn sample(&mut self, distribution: NamedDistribution) -> Result<f64, SampleError> {
        let name = distribution.name();
        match distribution {
            NamedDistribution::Uniform { low, high } => {
                if !(low.is_finite() && high.is_finite()) || low >= high {
                    return Err(SampleError::invalid(
                        name,
                        format!("need finite low < high, got [{}, {})", low, high),
                    ));
                }
                Ok(Uniform::new(low, high).sample(&mut self.rng))
            }
            NamedDistribution::Normal { mean, std_dev } => {
                let normal = Normal::new(mean, std_dev)
                    .map_err(|e| SampleError::invalid(name, e.to_string()))?;
                Ok(normal.sample(&mut self.rng))
            }
            NamedDistribution::AbsNormal { mean, std_dev } => {
                let normal = Normal::new(mean, std_dev)
                    .map_err(|e| SampleError::invalid(name, e.to_string()))?;
                Ok(normal.sample(&mut self.rng).abs())
            }
            NamedDistribution::Bernoulli { p } => {
                let bernoulli =
                    Bernoulli::new(p).map_err(|e| SampleError::invalid(name, e.to_string()))?;
                Ok(if bernoulli.sample(&mut self.rng) { 1.0 } else { 0.0 })
            }
            NamedDistribution::Binomial { n, p } => {
                let binomial =
                    Binomial::new(n, p).map_err(|e| SampleError::invalid(name, e.to_string()))?;
                Ok(binomial.sample(&mut self.rng) as f64)
            }
        }
    }

    fn index(&mut self, upper: usize) -> Result<usize, SampleError> {
        if upper == 0 {
            return Err(SampleError::empty("index range 0..0"));
        }
        Ok(self.rng.gen_range(0..upper))
    }

    fn shuffle(&mut self, values: &mut [usize]) {
        values.shuffle(&mut self.rng);
    }
}
