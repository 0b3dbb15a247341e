//! Reporting sink for finished runs.
//!
//! The engine never draws or writes anything itself; callers that want
//! plots or exports hand results to a [`ReportSink`].

use crate::diffusion::DiffusionTree;

/// Receives finished results for visualization or export.
pub trait ReportSink {
    /// One metric's series, aligned with `timesteps`.
    fn time_series(&mut self, name: &str, timesteps: &[usize], values: &[Option<f64>]);

    /// A finished diffusion forest.
    fn diffusion_tree(&mut self, tree: &DiffusionTree);
}

/// Sink that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub series: Vec<(String, Vec<usize>, Vec<Option<f64>>)>,
    pub trees: Vec<DiffusionTree>,
}

impl ReportSink for MemorySink {
    fn time_series(&mut self, name: &str, timesteps: &[usize], values: &[Option<f64>]) {
        self.series
            .push((name.to_string(), timesteps.to_vec(), values.to_vec()));
    }

    fn diffusion_tree(&mut self, tree: &DiffusionTree) {
        self.trees.push(tree.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentFilteringConfig;
    use crate::metrics::{InteractionSpread, RecommendationCoverage};

    #[test]
    fn test_measurements_reported_in_order() {
        let mut engine = ContentFilteringConfig::default()
            .with_num_users(3)
            .with_num_items(8)
            .with_num_attributes(4)
            .build()
            .unwrap();
        engine
            .add_metrics(vec![
                Box::new(InteractionSpread::new()),
                Box::new(RecommendationCoverage),
            ])
            .unwrap();
        engine.run(2).unwrap();

        let mut sink = MemorySink::default();
        engine.get_measurements().unwrap().report_to(&mut sink);

        assert_eq!(sink.series.len(), 2);
        assert_eq!(sink.series[0].0, "interaction_spread");
        assert_eq!(sink.series[1].0, "recommendation_coverage");
        assert_eq!(sink.series[1].1, vec![0, 1, 2]);
    }
}
