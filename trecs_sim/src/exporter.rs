//! JSON exporter for finished runs.
//!
//! Collects metric series and diffusion forests through the engine's
//! [`ReportSink`] and serializes them for external plotting.

use crate::error::Result;
use serde::Serialize;
use std::io::Write;
use trecs_core::{DiffusionTree, ReportSink};

/// One exported metric series.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedSeries {
    pub name: String,
    pub timesteps: Vec<usize>,

    /// `null` where the metric is undefined
    pub values: Vec<Option<f64>>,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Metric series, in registration order
    pub series: Vec<ExportedSeries>,

    /// Diffusion forests, if the scenario produced any
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diffusion_trees: Vec<DiffusionTree>,

    /// Final results
    pub passed: bool,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            series: Vec::new(),
            diffusion_trees: Vec::new(),
            passed: false,
        }
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool) {
        self.passed = passed;
    }

    /// Last defined value of a series.
    pub fn last_value(&self, name: &str) -> Option<f64> {
        self.series
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.values.iter().rev().flatten().next().copied())
    }

    /// Writes pretty JSON to any writer (stdout, a file).
    pub fn write_to(&self, mut writer: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}

impl ReportSink for SimExport {
    fn time_series(&mut self, name: &str, timesteps: &[usize], values: &[Option<f64>]) {
        self.series.push(ExportedSeries {
            name: name.to_string(),
            timesteps: timesteps.to_vec(),
            values: values.to_vec(),
        });
    }

    fn diffusion_tree(&mut self, tree: &DiffusionTree) {
        self.diffusion_trees.push(tree.clone());
    }
}
