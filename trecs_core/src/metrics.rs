//! trecs Metrics Module
//! ====================
//!
//! A small catalog of metrics for the measurement module:
//! - **Interaction spread**: how much the interaction histogram moved since
//!   the previous timestep (homogenization signal)
//! - **Recommendation coverage**: share of the catalog shown to anyone
//! - **Infected fraction**: share of users reached by a diffusion
//!
//! All metrics are only ever called after an Update step; the undefined entry
//! at timestep 0 is written by the measurement module itself.

use crate::diffusion::INFECTION_STATE;
use crate::engine::SystemView;
use crate::measurement::Metric;

// =============================================================================
// INTERACTION SPREAD
// =============================================================================

/// L1 distance between consecutive sorted interaction histograms.
///
/// # Formula
/// ```text
/// H_t = sort_desc(interactions per item at t)
/// spread_t = Σ |H_t[j] − H_{t−1}[j]|
/// ```
///
/// `H_0` is all zeros. A spread that shrinks towards zero means users keep
/// concentrating on the same number of items at the same rates.
#[derive(Debug, Clone, Default)]
pub struct InteractionSpread {
    previous: Option<Vec<f64>>,
}

impl InteractionSpread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted (descending) per-item interaction counts.
    pub fn histogram(feedback: &[Option<usize>], num_items: usize) -> Vec<f64> {
        let mut counts = vec![0.0_f64; num_items];
        for item in feedback.iter().flatten() {
            if let Some(count) = counts.get_mut(*item) {
                *count += 1.0;
            }
        }
        counts.sort_by(|a, b| b.total_cmp(a));
        counts
    }
}

impl Metric for InteractionSpread {
    fn name(&self) -> &str {
        "interaction_spread"
    }

    fn measure(&mut self, view: &SystemView<'_>) -> Option<f64> {
        let current = Self::histogram(view.feedback, view.items.num_items());
        let previous = self
            .previous
            .take()
            .unwrap_or_else(|| vec![0.0; current.len()]);

        let spread = current
            .iter()
            .zip(previous.iter().chain(std::iter::repeat(&0.0)))
            .map(|(c, p)| (c - p).abs())
            .sum();

        self.previous = Some(current);
        Some(spread)
    }
}

// =============================================================================
// RECOMMENDATION COVERAGE
// =============================================================================

/// Fraction of catalog items presented to at least one user.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationCoverage;

impl Metric for RecommendationCoverage {
    fn name(&self) -> &str {
        "recommendation_coverage"
    }

    fn measure(&mut self, view: &SystemView<'_>) -> Option<f64> {
        let num_items = view.items.num_items();
        if num_items == 0 {
            return None;
        }
        let mut shown = vec![false; num_items];
        for item in view.recommendations.iter().flatten() {
            if let Some(flag) = shown.get_mut(*item) {
                *flag = true;
            }
        }
        Some(shown.iter().filter(|&&s| s).count() as f64 / num_items as f64)
    }
}

// =============================================================================
// INFECTED FRACTION
// =============================================================================

/// Fraction of users with any non-zero entry in the behavior's
/// `infection_state` component. Undefined for models without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfectedFraction;

impl Metric for InfectedFraction {
    fn name(&self) -> &str {
        "infected_fraction"
    }

    fn measure(&mut self, view: &SystemView<'_>) -> Option<f64> {
        let state = view.behavior.component(INFECTION_STATE)?.value();
        if state.nrows() == 0 {
            return None;
        }
        let infected = state
            .row_iter()
            .filter(|row| row.iter().any(|&v| v != 0.0))
            .count();
        Some(infected as f64 / state.nrows() as f64)
    }
}

// =============================================================================
// TESTS
// =============================================================================
