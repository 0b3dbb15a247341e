//! The recommender engine - the per-timestep orchestration loop.
//!
//! # Iteration
//!
//! ```text
//!   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//!   │ Predict  │──►│  Select  │──►│ Interact │──►│  Update  │──►│  Record  │
//!   │ behavior │   │ behavior │   │  Users   │   │ behavior │   │ metrics  │
//!   └──────────┘   └──────────┘   └──────────┘   └──────────┘   │ + state  │
//!                                                               └──────────┘
//! ```
//!
//! The order is fixed. Predict at iteration `t` reads exactly the state left
//! by Update at `t - 1`. Behaviors only see the engine through the
//! [`ModelBehavior`] trait, and the engine is the single owner of every
//! matrix.

use crate::component::{Component, ComponentKey, Matrix};
use crate::error::{Result, TrecsError};
use crate::items::Items;
use crate::measurement::{MeasurementModule, Measurements, Metric};
use crate::state::SystemStateModule;
use crate::users::{Feedback, Recommendations, Users};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use trecs_env::RandomSource;

/// Default number of items presented to each user per iteration.
pub const DEFAULT_ITEMS_PER_ITERATION: usize = 10;

/// Default number of timesteps for `run_default`.
pub const DEFAULT_TIMESTEPS: usize = 50;

/// Name of the predicted score component.
pub const PREDICTED_SCORES: &str = "predicted_scores";

/// Model-specific logic plugged into the run loop.
pub trait ModelBehavior: std::fmt::Debug {
    /// Model name for logs.
    fn name(&self) -> &'static str;

    /// Timesteps executed by `run_default`.
    fn default_timesteps(&self) -> usize {
        DEFAULT_TIMESTEPS
    }

    /// Checks that users and items fit this model. Called once at engine
    /// construction.
    fn validate(&self, _users: &Users, _items: &Items) -> Result<()> {
        Ok(())
    }

    /// Computes `num_users × num_items` scores from the current state.
    fn predict(&self, users: &Users, items: &Items) -> Result<Matrix>;

    /// Chooses, per user, an ordered list of at most `items_per_iteration`
    /// items.
    fn select(
        &mut self,
        scores: &Matrix,
        items_per_iteration: usize,
        rng: &mut dyn RandomSource,
    ) -> Result<Recommendations>;

    /// Mutates predicted state from the users' feedback.
    fn update(&mut self, feedback: &Feedback, users: &mut Users, items: &Items) -> Result<()>;

    /// Looks up a behavior-owned component by name.
    fn component(&self, _name: &str) -> Option<&Component> {
        None
    }
}

impl ModelBehavior for Box<dyn ModelBehavior> {
    fn name(&self) -> &'static str {
        self.as_ref().name()
    }

    fn default_timesteps(&self) -> usize {
        self.as_ref().default_timesteps()
    }

    fn validate(&self, users: &Users, items: &Items) -> Result<()> {
        self.as_ref().validate(users, items)
    }

    fn predict(&self, users: &Users, items: &Items) -> Result<Matrix> {
        self.as_ref().predict(users, items)
    }

    fn select(
        &mut self,
        scores: &Matrix,
        items_per_iteration: usize,
        rng: &mut dyn RandomSource,
    ) -> Result<Recommendations> {
        self.as_mut().select(scores, items_per_iteration, rng)
    }

    fn update(&mut self, feedback: &Feedback, users: &mut Users, items: &Items) -> Result<()> {
        self.as_mut().update(feedback, users, items)
    }

    fn component(&self, name: &str) -> Option<&Component> {
        self.as_ref().component(name)
    }
}

/// Read-only view of the engine handed to metrics and the state module.
#[derive(Clone, Copy)]
pub struct SystemView<'a> {
    /// Number of completed iterations
    pub timestep: usize,
    pub users: &'a Users,
    pub items: &'a Items,
    /// Scores from the most recent Predict step
    pub predicted_scores: &'a Component,
    /// Lists presented in the most recent iteration (empty at timestep 0)
    pub recommendations: &'a [Vec<usize>],
    /// Feedback from the most recent iteration (empty at timestep 0)
    pub feedback: &'a [Option<usize>],
    pub behavior: &'a dyn ModelBehavior,
}

impl<'a> SystemView<'a> {
    /// Resolves a component key against the current state.
    pub fn component(&self, key: &ComponentKey) -> Option<&'a Component> {
        match key {
            ComponentKey::PredictedUserProfiles => Some(self.users.predicted()),
            ComponentKey::ActualUserProfiles => self.users.actual(),
            ComponentKey::ItemAttributes => Some(self.items.attributes()),
            ComponentKey::PredictedScores => Some(self.predicted_scores),
            ComponentKey::Behavior(name) => self.behavior.component(name),
        }
    }
}

/// How the Select step picks items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectionMode {
    /// Ask the behavior
    Model,
    /// Uniformly random items (startup phase)
    Random,
}

// Builds a SystemView from disjoint field borrows so the measurement and
// state modules can be borrowed mutably alongside it.
macro_rules! system_view {
    ($engine:expr) => {
        SystemView {
            timestep: $engine.timestep,
            users: &$engine.users,
            items: &$engine.items,
            predicted_scores: &$engine.predicted_scores,
            recommendations: &$engine.recommendations,
            feedback: &$engine.feedback,
            behavior: &$engine.behavior,
        }
    };
}

/// The run loop.
pub struct RecommenderEngine<B: ModelBehavior> {
    users: Users,
    items: Items,
    behavior: B,
    rng: Box<dyn RandomSource>,
    items_per_iteration: usize,
    predicted_scores: Component,
    recommendations: Recommendations,
    feedback: Feedback,
    measurements: Option<MeasurementModule>,
    system_state: Option<SystemStateModule>,
    timestep: usize,
}

impl<B: ModelBehavior> std::fmt::Debug for RecommenderEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommenderEngine")
            .field("behavior", &self.behavior.name())
            .field("num_users", &self.users.num_users())
            .field("num_items", &self.items.num_items())
            .field("timestep", &self.timestep)
            .finish()
    }
}

impl<B: ModelBehavior> RecommenderEngine<B> {
    /// Assembles an engine from fully initialized parts.
    ///
    /// Fails when users or items are empty, when their attribute dimensions
    /// disagree, or when the behavior rejects them.
    pub fn new(
        users: Users,
        items: Items,
        behavior: B,
        rng: Box<dyn RandomSource>,
        items_per_iteration: usize,
    ) -> Result<Self> {
        if users.num_users() == 0 {
            return Err(TrecsError::Uninitialized("no users".to_string()));
        }
        if items.num_items() == 0 {
            return Err(TrecsError::Uninitialized("no items".to_string()));
        }
        if users.num_attributes() != items.num_attributes() {
            return Err(TrecsError::shape(
                "item_attributes",
                (users.num_attributes(), items.num_items()),
                (items.num_attributes(), items.num_items()),
            ));
        }
        behavior.validate(&users, &items)?;

        let scores = behavior.predict(&users, &items)?;
        check_scores(&scores, &users, &items)?;

        info!(
            "Created {} engine: {} users, {} items, {} attributes (seed={})",
            behavior.name(),
            users.num_users(),
            items.num_items(),
            items.num_attributes(),
            rng.seed()
        );

        Ok(Self {
            users,
            items,
            behavior,
            rng,
            items_per_iteration,
            predicted_scores: Component::new(PREDICTED_SCORES, scores),
            recommendations: Vec::new(),
            feedback: Vec::new(),
            measurements: None,
            system_state: None,
            timestep: 0,
        })
    }

    /// Runs `timesteps` iterations. Zero is a no-op.
    ///
    /// Resumes from the current state; never resets the timestep counter.
    pub fn run(&mut self, timesteps: usize) -> Result<()> {
        self.run_with(timesteps, SelectionMode::Model)
    }

    /// Runs the behavior's default number of timesteps.
    pub fn run_default(&mut self) -> Result<()> {
        self.run(self.behavior.default_timesteps())
    }

    /// Runs iterations that present uniformly random items instead of the
    /// behavior's selection. Predict, Interact, Update and Record still run.
    pub fn startup(&mut self, timesteps: usize) -> Result<()> {
        self.run_with(timesteps, SelectionMode::Random)
    }

    fn run_with(&mut self, timesteps: usize, mode: SelectionMode) -> Result<()> {
        if timesteps == 0 {
            return Ok(());
        }
        info!(
            "Running {} for {} timesteps from t={} ({:?})",
            self.behavior.name(),
            timesteps,
            self.timestep,
            mode
        );
        for _ in 0..timesteps {
            self.step(mode)?;
        }
        Ok(())
    }

    fn step(&mut self, mode: SelectionMode) -> Result<()> {
        // 1. Predict
        let scores = self.behavior.predict(&self.users, &self.items)?;
        check_scores(&scores, &self.users, &self.items)?;

        // 2. Select
        let k = self.items_per_iteration.min(self.items.num_items());
        let recommendations = match mode {
            SelectionMode::Model => self.behavior.select(&scores, k, self.rng.as_mut())?,
            SelectionMode::Random => {
                let mut recs = Vec::with_capacity(self.users.num_users());
                for _ in 0..self.users.num_users() {
                    recs.push(self.rng.choose_distinct(self.items.num_items(), k, &[]));
                }
                recs
            }
        };

        // 3. Interact
        let feedback = self
            .users
            .get_user_feedback(&recommendations, &self.items, self.rng.as_mut())?;

        // 4. Update
        self.behavior
            .update(&feedback, &mut self.users, &self.items)?;

        self.predicted_scores.set(scores);
        self.recommendations = recommendations;
        self.feedback = feedback;
        self.timestep += 1;

        debug!(
            "t={} | interactions={}",
            self.timestep,
            self.feedback.iter().filter(|f| f.is_some()).count()
        );

        // 5. Record
        let view = system_view!(self);
        if let Some(measurements) = self.measurements.as_mut() {
            measurements.measure(&view);
        }
        if let Some(state) = self.system_state.as_mut() {
            state.record(&view)?;
        }
        Ok(())
    }

    /// Registers metrics. Rejected once any timestep has been recorded.
    pub fn add_metrics(&mut self, metrics: Vec<Box<dyn Metric>>) -> Result<()> {
        if self.timestep > 0 {
            warn!("Rejected add_metrics at t={}", self.timestep);
            return Err(TrecsError::usage_order(format!(
                "metrics added at timestep {}; series would be misaligned",
                self.timestep
            )));
        }
        self.measurements
            .get_or_insert_with(MeasurementModule::new)
            .add_metrics(metrics)
    }

    /// Registers a single metric.
    pub fn add_metric(&mut self, metric: impl Metric + 'static) -> Result<()> {
        self.add_metrics(vec![Box::new(metric)])
    }

    /// All metric series plus the timestep index.
    pub fn get_measurements(&self) -> Result<Measurements> {
        self.measurements
            .as_ref()
            .ok_or(TrecsError::NoMeasurementModule)?
            .get_measurements()
    }

    /// Starts tracking a component. Rejected once any timestep has been
    /// recorded.
    pub fn add_state_variable(&mut self, name: impl Into<String>, key: ComponentKey) -> Result<()> {
        let name = name.into();
        if self.timestep > 0 {
            warn!("Rejected state variable '{}' at t={}", name, self.timestep);
            return Err(TrecsError::usage_order(format!(
                "state variable '{}' registered at timestep {}",
                name, self.timestep
            )));
        }
        let view = system_view!(self);
        self.system_state
            .get_or_insert_with(SystemStateModule::new)
            .add_state_variable(name, key, &view)
    }

    /// Name → snapshot history for every tracked component.
    pub fn get_system_state(&self) -> Result<BTreeMap<String, Vec<Matrix>>> {
        self.system_state
            .as_ref()
            .ok_or(TrecsError::NoStateVariables)?
            .get_system_state()
    }

    /// True when every history has `timestep + 1` entries ending in the live
    /// value.
    pub fn verify_system_state(&self) -> Result<bool> {
        let state = self
            .system_state
            .as_ref()
            .filter(|s| !s.is_empty())
            .ok_or(TrecsError::NoStateVariables)?;
        Ok(state.is_consistent(&self.view()))
    }

    pub fn view(&self) -> SystemView<'_> {
        system_view!(self)
    }

    pub fn timestep(&self) -> usize {
        self.timestep
    }

    pub fn users(&self) -> &Users {
        &self.users
    }

    pub fn items(&self) -> &Items {
        &self.items
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn predicted_scores(&self) -> &Matrix {
        self.predicted_scores.value()
    }

    /// Lists presented in the last iteration.
    pub fn recommendations(&self) -> &Recommendations {
        &self.recommendations
    }

    /// Feedback from the last iteration.
    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    pub fn items_per_iteration(&self) -> usize {
        self.items_per_iteration
    }

    /// Mutable access for model-specific operations (e.g. social graph edits).
    /// Callers must follow up with [`Self::refresh_state`].
    pub(crate) fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    pub(crate) fn rng_mut(&mut self) -> &mut dyn RandomSource {
        self.rng.as_mut()
    }

    /// Re-takes the newest snapshot of every tracked variable after an edit
    /// made between iterations.
    pub(crate) fn refresh_state(&mut self) -> Result<()> {
        let view = system_view!(self);
        if let Some(state) = self.system_state.as_mut() {
            state.refresh_last(&view)?;
        }
        Ok(())
    }

    /// Swaps in a resized item matrix and recomputes the scores from it.
    ///
    /// All checks run before anything is replaced.
    pub(crate) fn replace_items(&mut self, attributes: Matrix) -> Result<()> {
        let items = Items::new(attributes);
        if items.num_items() == 0 {
            return Err(TrecsError::Uninitialized("no items".to_string()));
        }
        if items.num_attributes() != self.users.num_attributes() {
            return Err(TrecsError::shape(
                "item_attributes",
                (self.users.num_attributes(), items.num_items()),
                items.attributes().shape(),
            ));
        }
        self.behavior.validate(&self.users, &items)?;
        let scores = self.behavior.predict(&self.users, &items)?;
        check_scores(&scores, &self.users, &items)?;

        info!(
            "Resized catalog at t={}: {} -> {} items",
            self.timestep,
            self.items.num_items(),
            items.num_items()
        );
        self.items = items;
        self.predicted_scores.set(scores);
        self.refresh_state()
    }
}

fn check_scores(scores: &Matrix, users: &Users, items: &Items) -> Result<()> {
    let expected = (users.num_users(), items.num_items());
    if scores.shape() != expected {
        return Err(TrecsError::shape(PREDICTED_SCORES, expected, scores.shape()));
    }
    Ok(())
}
