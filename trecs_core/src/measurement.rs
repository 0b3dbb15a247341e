//! Measurement module: one time series per registered metric.
//!
//! Every series starts with an undefined entry (`None`) standing for the
//! pre-simulation state. After that, entry `k` is the value measured right
//! after iteration `k`'s Update step, so all series stay aligned with the
//! `timesteps` index series.

use crate::engine::SystemView;
use crate::error::{Result, TrecsError};
use crate::report::ReportSink;
use serde::Serialize;

/// A quantity derived from the current system state.
pub trait Metric: std::fmt::Debug {
    /// Series name; must be unique per engine.
    fn name(&self) -> &str;

    /// Computes the value after an Update step. `None` means undefined.
    fn measure(&mut self, view: &SystemView<'_>) -> Option<f64>;
}

#[derive(Debug)]
struct RegisteredMetric {
    metric: Box<dyn Metric>,
    values: Vec<Option<f64>>,
}

/// Ordered collection of metrics and their histories.
#[derive(Debug)]
pub struct MeasurementModule {
    metrics: Vec<RegisteredMetric>,
    timesteps: Vec<usize>,
}

impl MeasurementModule {
    pub fn new() -> Self {
        Self {
            metrics: Vec::new(),
            timesteps: vec![0],
        }
    }

    /// Registers metrics. All-or-nothing: on a duplicate name nothing is added.
    ///
    /// Registration is only valid before the first recorded timestep; the
    /// module never backfills history.
    pub fn add_metrics(&mut self, metrics: Vec<Box<dyn Metric>>) -> Result<()> {
        if self.timesteps.len() > 1 {
            return Err(TrecsError::usage_order(
                "metrics must be registered before the first timestep",
            ));
        }

        let mut names: Vec<&str> = self.metrics.iter().map(|m| m.metric.name()).collect();
        for metric in &metrics {
            if names.contains(&metric.name()) {
                return Err(TrecsError::DuplicateName(metric.name().to_string()));
            }
            names.push(metric.name());
        }

        self.metrics.extend(metrics.into_iter().map(|metric| RegisteredMetric {
            metric,
            values: vec![None],
        }));
        Ok(())
    }

    /// Appends one value per metric for the given (already advanced) timestep.
    pub fn measure(&mut self, view: &SystemView<'_>) {
        for registered in &mut self.metrics {
            let value = registered.metric.measure(view);
            registered.values.push(value);
        }
        self.timesteps.push(view.timestep);
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Copies out every series plus the timestep index.
    pub fn get_measurements(&self) -> Result<Measurements> {
        if self.metrics.is_empty() {
            return Err(TrecsError::NoMeasurementModule);
        }
        Ok(Measurements {
            timesteps: self.timesteps.clone(),
            series: self
                .metrics
                .iter()
                .map(|m| MetricSeries {
                    name: m.metric.name().to_string(),
                    values: m.values.clone(),
                })
                .collect(),
        })
    }
}

impl Default for MeasurementModule {
    fn default() -> Self {
        Self::new()
    }
}

/// One metric's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Snapshot of all measurement histories, in registration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurements {
    pub timesteps: Vec<usize>,
    pub series: Vec<MetricSeries>,
}

impl Measurements {
    /// Looks up a series by metric name.
    pub fn get(&self, name: &str) -> Option<&[Option<f64>]> {
        self.series
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.values.as_slice())
    }

    /// Metric names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.name.as_str()).collect()
    }

    /// Hands every series to a reporting sink.
    pub fn report_to(&self, sink: &mut dyn ReportSink) {
        for series in &self.series {
            sink.time_series(&series.name, &self.timesteps, &series.values);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentFilteringConfig;
    use crate::metrics::RecommendationCoverage;

    #[derive(Debug)]
    struct Timestep;

    impl Metric for Timestep {
        fn name(&self) -> &str {
            "timestep"
        }

        fn measure(&mut self, view: &SystemView<'_>) -> Option<f64> {
            Some(view.timestep as f64)
        }
    }

    #[test]
    fn test_empty_module_has_no_measurements() {
        let module = MeasurementModule::new();
        assert!(module.is_empty());
        assert!(matches!(
            module.get_measurements(),
            Err(TrecsError::NoMeasurementModule)
        ));
    }

    #[test]
    fn test_series_aligned_with_timesteps() {
        let mut engine = ContentFilteringConfig::default()
            .with_num_users(3)
            .with_num_items(6)
            .with_num_attributes(2)
            .build()
            .unwrap();
        engine
            .add_metrics(vec![Box::new(Timestep), Box::new(RecommendationCoverage)])
            .unwrap();
        engine.run(3).unwrap();

        let m = engine.get_measurements().unwrap();
        assert_eq!(m.timesteps, vec![0, 1, 2, 3]);
        assert_eq!(m.get("timestep").unwrap(), &[None, Some(1.0), Some(2.0), Some(3.0)]);
        assert!(m.get("missing").is_none());
    }

    #[test]
    fn test_undefined_serializes_as_null() {
        let m = Measurements {
            timesteps: vec![0, 1],
            series: vec![MetricSeries {
                name: "timestep".to_string(),
                values: vec![None, Some(1.0)],
            }],
        };
        let json = serde_json::to_value(&m).unwrap();
        assert!(json["series"][0]["values"][0].is_null());
        assert_eq!(json["series"][0]["values"][1], 1.0);
    }
}
