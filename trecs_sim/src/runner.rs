//! Scenario runner - builds an engine per scenario, runs it and checks the
//! invariants every run must keep.

use crate::error::Result;
use crate::exporter::SimExport;
use crate::scenarios::ScenarioId;

use trecs_core::engine::DEFAULT_TIMESTEPS;
use trecs_core::{
    ComponentKey, ContentFiltering, ContentFilteringConfig, DiffusionConfig, InfectedFraction,
    InteractionSpread, Matrix, RecommendationCoverage, RecommenderEngine, ReportSink,
};
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Timesteps completed, startup included
    pub timesteps: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,

    /// Series and trees for export
    pub export: SimExport,
}

/// Final values of interest for a scenario.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Last interaction spread
    pub interaction_spread: Option<f64>,

    /// Mean coverage over the startup phase
    pub startup_coverage: Option<f64>,

    /// Last recommendation coverage
    pub coverage: Option<f64>,

    /// Share of users infected at the end
    pub infected_fraction: Option<f64>,

    /// Mean pairwise distance in the diffusion forest
    pub structural_virality: Option<f64>,
}

/// Runs canned scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Population size
    num_users: usize,

    /// Catalog size (content filtering only)
    num_items: Option<usize>,

    /// Attribute dimension (content filtering only)
    num_attributes: Option<usize>,

    /// Timesteps per run
    timesteps: usize,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_users: usize) -> Self {
        Self {
            seed,
            num_users,
            num_items: None,
            num_attributes: None,
            timesteps: DEFAULT_TIMESTEPS,
        }
    }

    /// Sets the catalog size.
    pub fn with_items(mut self, num_items: usize) -> Self {
        self.num_items = Some(num_items);
        self
    }

    /// Sets the attribute dimension.
    pub fn with_attributes(mut self, num_attributes: usize) -> Self {
        self.num_attributes = Some(num_attributes);
        self
    }

    /// Sets the number of timesteps.
    pub fn with_timesteps(mut self, timesteps: usize) -> Self {
        self.timesteps = timesteps;
        self
    }

    /// Runs a scenario and returns the result. Engine errors become a
    /// failed result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!(
            "Starting scenario: {} (seed={}) - {}",
            scenario.name(),
            self.seed,
            scenario.description()
        );

        let outcome = match scenario {
            ScenarioId::Homogenization => self.run_content(scenario, 0, false),
            ScenarioId::StartupExploration => {
                self.run_content(scenario, (self.timesteps / 5).max(1), false)
            }
            ScenarioId::ExplorationMix => self.run_content(scenario, 0, true),
            ScenarioId::ViralSpread => self.run_viral_spread(),
            ScenarioId::FriendStar => self.run_friend_star(),
        };

        outcome.unwrap_or_else(|e| {
            warn!("Scenario {} aborted: {}", scenario.name(), e);
            ScenarioResult {
                scenario,
                seed: self.seed,
                passed: false,
                timesteps: 0,
                failure_reason: Some(e.to_string()),
                metrics: ScenarioMetrics::default(),
                export: SimExport::new(scenario.name(), self.seed),
            }
        })
    }

    fn content_config(&self, randomize: bool) -> ContentFilteringConfig {
        let mut config = ContentFilteringConfig::default()
            .with_seed(self.seed)
            .with_num_users(self.num_users)
            .with_randomized_recommendations(randomize);
        if let Some(n) = self.num_items {
            config = config.with_num_items(n);
        }
        if let Some(n) = self.num_attributes {
            config = config.with_num_attributes(n);
        }
        config
    }

    /// SIM-001..003: content filtering with an optional startup phase.
    fn run_content(
        &self,
        scenario: ScenarioId,
        startup: usize,
        randomize: bool,
    ) -> Result<ScenarioResult> {
        let mut engine = self.content_config(randomize).build()?;
        engine.add_metrics(vec![
            Box::new(InteractionSpread::new()),
            Box::new(RecommendationCoverage),
        ])?;
        engine.add_state_variable("predicted_user_profiles", ComponentKey::PredictedUserProfiles)?;

        engine.startup(startup)?;
        engine.run(self.timesteps)?;

        let mut export = SimExport::new(scenario.name(), self.seed);
        let measurements = engine.get_measurements()?;
        measurements.report_to(&mut export);

        let startup_coverage = measurements
            .get("recommendation_coverage")
            .and_then(|series| mean(series.iter().skip(1).take(startup).flatten().copied()));
        let metrics = ScenarioMetrics {
            interaction_spread: export.last_value("interaction_spread"),
            startup_coverage,
            coverage: export.last_value("recommendation_coverage"),
            ..Default::default()
        };
        debug!("{} metrics: {:?}", scenario.name(), metrics);

        let failure = check_content(&engine, startup + self.timesteps)?;
        Ok(self.finish(scenario, engine.timestep(), failure, metrics, export))
    }

    /// SIM-004: diffusion over a generated graph.
    fn run_viral_spread(&self) -> Result<ScenarioResult> {
        let mut engine = DiffusionConfig::default()
            .with_seed(self.seed)
            .with_num_users(self.num_users)
            .build()?;
        engine.add_metric(InfectedFraction)?;
        engine.add_state_variable("infection_state", ComponentKey::behavior("infection_state"))?;

        let mut failure = None;
        let mut infected = engine.behavior().infected_count();
        for _ in 0..self.timesteps {
            engine.run(1)?;
            let now = engine.behavior().infected_count();
            if now < infected {
                failure = Some(format!(
                    "infected count dropped from {} to {} at t={}",
                    infected,
                    now,
                    engine.timestep()
                ));
                break;
            }
            infected = now;
        }

        let virality = engine.get_structural_virality();
        if let Some(v) = virality {
            if !v.is_finite() || v < 1.0 {
                failure.get_or_insert(format!("structural virality {} out of range", v));
            }
        }
        if !engine.verify_system_state()? {
            failure.get_or_insert_with(|| "state history out of sync".to_string());
        }

        let mut export = SimExport::new(ScenarioId::ViralSpread.name(), self.seed);
        engine.get_measurements()?.report_to(&mut export);
        export.diffusion_tree(&engine.diffusion_tree());

        let metrics = ScenarioMetrics {
            infected_fraction: export.last_value("infected_fraction"),
            structural_virality: virality,
            ..Default::default()
        };
        Ok(self.finish(ScenarioId::ViralSpread, engine.timestep(), failure, metrics, export))
    }

    /// SIM-005: five users, user 4 seeded, befriending users 0 and 1.
    fn run_friend_star(&self) -> Result<ScenarioResult> {
        let mut state = Matrix::zeros(5, 1);
        state[(4, 0)] = 1.0;
        let mut engine = DiffusionConfig::default()
            .with_seed(self.seed)
            .with_social_graph(Matrix::zeros(5, 5))
            .with_infection_state(state)
            .with_infection_thresholds(Matrix::from_element(5, 1, 0.2))
            .with_item_representation(Matrix::from_element(1, 1, 0.7))
            .build()?;
        engine.add_friends(4, 0)?;
        engine.add_friends(4, 1)?;
        engine.add_metric(InfectedFraction)?;

        engine.run(self.timesteps.max(2))?;

        let behavior = engine.behavior();
        let virality = engine.get_structural_virality();
        let failure = if !(behavior.is_infected(0) && behavior.is_infected(1)) {
            Some("friends of the seed were not infected".to_string())
        } else if behavior.is_infected(2) || behavior.is_infected(3) {
            Some("infection reached users without an edge".to_string())
        } else {
            match virality {
                Some(v) if (v - 4.0 / 3.0).abs() < 1e-9 => None,
                other => Some(format!("expected virality 4/3, got {:?}", other)),
            }
        };

        let mut export = SimExport::new(ScenarioId::FriendStar.name(), self.seed);
        engine.get_measurements()?.report_to(&mut export);
        export.diffusion_tree(&engine.diffusion_tree());

        let metrics = ScenarioMetrics {
            infected_fraction: export.last_value("infected_fraction"),
            structural_virality: virality,
            ..Default::default()
        };
        Ok(self.finish(ScenarioId::FriendStar, engine.timestep(), failure, metrics, export))
    }

    fn finish(
        &self,
        scenario: ScenarioId,
        timesteps: usize,
        failure_reason: Option<String>,
        metrics: ScenarioMetrics,
        mut export: SimExport,
    ) -> ScenarioResult {
        let passed = failure_reason.is_none();
        export.finalize(passed);
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            timesteps,
            failure_reason,
            metrics,
            export,
        }
    }
}

/// Invariants shared by every content-filtering run.
fn check_content(
    engine: &RecommenderEngine<ContentFiltering>,
    expected_timesteps: usize,
) -> Result<Option<String>> {
    if engine.timestep() != expected_timesteps {
        return Ok(Some(format!(
            "ran {} timesteps, expected {}",
            engine.timestep(),
            expected_timesteps
        )));
    }
    if let Some((user, attribute)) = engine.users().predicted().find_negative() {
        return Ok(Some(format!(
            "negative profile entry at ({}, {})",
            user, attribute
        )));
    }
    let measurements = engine.get_measurements()?;
    if measurements.series.iter().any(|s| s.values.len() != expected_timesteps + 1) {
        return Ok(Some("metric series misaligned".to_string()));
    }
    if !engine.verify_system_state()? {
        return Ok(Some("state history out of sync".to_string()));
    }
    Ok(None)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
