//! Bass-style diffusion over a social graph.
//!
//! Users are either Susceptible or Infected; Infected is terminal.
//!
//! # Edge convention
//!
//! `social_graph[(u, v)] != 0` means *u listens to v*: an infected `v` can
//! infect `u`. `add_friends` sets both directions, `follow` only one.
//!
//! # Transition rule
//!
//! Evaluated once per iteration from the previous infection state
//! (synchronous update). A susceptible user `u` who engaged with the item
//! becomes infected with item `i` when some `v` with `graph[u, v] != 0` was
//! infected with `i` and `p_i > threshold[u, i]`. The lowest-index such `v`
//! is recorded as the infector.

use crate::component::{Component, Matrix};
use crate::engine::{ModelBehavior, RecommenderEngine, DEFAULT_ITEMS_PER_ITERATION};
use crate::error::{Result, TrecsError};
use crate::items::Items;
use crate::users::{Feedback, Recommendations, Users};
use serde::Serialize;
use tracing::debug;
use trecs_env::{derive_seed, NamedDistribution, RandomSource, SeededSource};

pub const SOCIAL_GRAPH: &str = "social_graph";
pub const INFECTION_STATE: &str = "infection_state";
pub const INFECTION_THRESHOLDS: &str = "infection_thresholds";

/// Default population size.
pub const DEFAULT_NUM_USERS: usize = 100;

/// Default probability of a generated directed edge.
pub const DEFAULT_EDGE_PROBABILITY: f64 = 0.1;

/// Diffusion model behavior.
#[derive(Debug, Clone)]
pub struct Diffusion {
    social_graph: Component,
    infection_state: Component,
    infection_thresholds: Component,

    /// Who infected each user (None for seeds and susceptible users)
    infector: Vec<Option<usize>>,

    /// Update step at which each user was infected (0 for seeds)
    infected_at: Vec<Option<usize>>,

    /// Update steps applied so far
    steps: usize,
}

impl Diffusion {
    /// Creates the behavior from its three matrices.
    ///
    /// Users infected in `infection_state` become roots of the diffusion
    /// forest.
    pub fn new(
        social_graph: Matrix,
        infection_state: Matrix,
        infection_thresholds: Matrix,
    ) -> Result<Self> {
        let num_users = social_graph.nrows();
        if social_graph.ncols() != num_users {
            return Err(TrecsError::shape(
                SOCIAL_GRAPH,
                (num_users, num_users),
                social_graph.shape(),
            ));
        }
        if infection_state.nrows() != num_users {
            return Err(TrecsError::shape(
                INFECTION_STATE,
                (num_users, infection_state.ncols()),
                infection_state.shape(),
            ));
        }
        if infection_thresholds.shape() != infection_state.shape() {
            return Err(TrecsError::shape(
                INFECTION_THRESHOLDS,
                infection_state.shape(),
                infection_thresholds.shape(),
            ));
        }

        let infected_at = (0..num_users)
            .map(|u| infection_state.row(u).iter().any(|&v| v != 0.0).then_some(0))
            .collect();

        Ok(Self {
            social_graph: Component::new(SOCIAL_GRAPH, binarize(social_graph)),
            infection_state: Component::new(INFECTION_STATE, binarize(infection_state)),
            infection_thresholds: Component::new(INFECTION_THRESHOLDS, infection_thresholds),
            infector: vec![None; num_users],
            infected_at,
            steps: 0,
        })
    }

    pub fn num_users(&self) -> usize {
        self.social_graph.value().nrows()
    }

    pub fn social_graph(&self) -> &Matrix {
        self.social_graph.value()
    }

    pub fn infection_state(&self) -> &Matrix {
        self.infection_state.value()
    }

    pub fn infection_thresholds(&self) -> &Matrix {
        self.infection_thresholds.value()
    }

    pub fn is_infected(&self, user: usize) -> bool {
        self.infected_at.get(user).map_or(false, Option::is_some)
    }

    /// Number of currently infected users.
    pub fn infected_count(&self) -> usize {
        self.infected_at.iter().filter(|t| t.is_some()).count()
    }

    fn check_user(&self, user: usize) -> Result<()> {
        if user >= self.num_users() {
            return Err(TrecsError::IndexOutOfRange {
                what: "users",
                index: user,
                len: self.num_users(),
            });
        }
        Ok(())
    }

    /// Adds a friendship: both users listen to each other.
    pub fn add_friends(&mut self, user1: usize, user2: usize) -> Result<()> {
        self.check_user(user1)?;
        self.check_user(user2)?;
        let graph = self.social_graph.value_mut();
        graph[(user1, user2)] = 1.0;
        graph[(user2, user1)] = 1.0;
        Ok(())
    }

    /// Adds a directed edge: `follower` listens to `followee`.
    pub fn follow(&mut self, follower: usize, followee: usize) -> Result<()> {
        self.check_user(follower)?;
        self.check_user(followee)?;
        self.social_graph.value_mut()[(follower, followee)] = 1.0;
        Ok(())
    }

    /// Infector → infectee forest built so far.
    pub fn diffusion_tree(&self) -> DiffusionTree {
        let nodes: Vec<usize> = (0..self.num_users())
            .filter(|&u| self.is_infected(u))
            .collect();
        let edges = self
            .infector
            .iter()
            .enumerate()
            .filter_map(|(user, parent)| parent.map(|p| (p, user)))
            .collect();
        DiffusionTree { nodes, edges }
    }

    /// Mean pairwise distance in the diffusion forest; `None` when nothing
    /// spread beyond the seeds.
    pub fn get_structural_virality(&self) -> Option<f64> {
        self.diffusion_tree().structural_virality()
    }
}

fn binarize(mut m: Matrix) -> Matrix {
    m.iter_mut().for_each(|v| *v = if *v != 0.0 { 1.0 } else { 0.0 });
    m
}

impl ModelBehavior for Diffusion {
    fn name(&self) -> &'static str {
        "diffusion"
    }

    fn validate(&self, users: &Users, items: &Items) -> Result<()> {
        if items.num_items() != 1 {
            return Err(TrecsError::UnsupportedItemCount {
                model: "diffusion",
                expected: 1,
                actual: items.num_items(),
            });
        }
        if users.num_users() != self.num_users() {
            return Err(TrecsError::shape(
                SOCIAL_GRAPH,
                (users.num_users(), users.num_users()),
                self.social_graph.shape(),
            ));
        }
        if self.infection_state.shape() != (self.num_users(), items.num_items()) {
            return Err(TrecsError::shape(
                INFECTION_STATE,
                (self.num_users(), items.num_items()),
                self.infection_state.shape(),
            ));
        }
        Ok(())
    }

    /// `score[u, i] = p_i × (infected neighbors of u for i)`.
    fn predict(&self, _users: &Users, items: &Items) -> Result<Matrix> {
        let mut exposure = self.social_graph.value() * self.infection_state.value();
        let probabilities = items.attributes().value();
        for (item, mut column) in exposure.column_iter_mut().enumerate() {
            column *= probabilities[(0, item)];
        }
        Ok(exposure)
    }

    /// Every user is presented the full candidate set.
    fn select(
        &mut self,
        scores: &Matrix,
        _items_per_iteration: usize,
        _rng: &mut dyn RandomSource,
    ) -> Result<Recommendations> {
        let all: Vec<usize> = (0..scores.ncols()).collect();
        Ok(vec![all; scores.nrows()])
    }

    fn update(&mut self, feedback: &Feedback, _users: &mut Users, items: &Items) -> Result<()> {
        if feedback.len() != self.num_users() {
            return Err(TrecsError::shape(
                "feedback",
                (self.num_users(), 1),
                (feedback.len(), 1),
            ));
        }
        self.steps += 1;

        let previous = self.infection_state.snapshot();
        let graph = self.social_graph.value();
        let thresholds = self.infection_thresholds.value();
        let probabilities = items.attributes().value();
        let num_users = self.num_users();

        let mut newly_infected = Vec::new();
        for (user, choice) in feedback.iter().enumerate() {
            if choice.is_none() {
                continue;
            }
            for item in 0..previous.ncols() {
                let exceeds = probabilities[(0, item)] > thresholds[(user, item)];
                if previous[(user, item)] != 0.0 || !exceeds {
                    continue;
                }
                let source = (0..num_users)
                    .find(|&v| graph[(user, v)] != 0.0 && previous[(v, item)] != 0.0);
                if let Some(source) = source {
                    newly_infected.push((user, item, source));
                }
            }
        }

        for &(user, item, source) in &newly_infected {
            self.infection_state.value_mut()[(user, item)] = 1.0;
            if self.infected_at[user].is_none() {
                self.infected_at[user] = Some(self.steps);
                self.infector[user] = Some(source);
            }
        }

        debug!(
            "Diffusion step {}: {} new infections, {} infected total",
            self.steps,
            newly_infected.len(),
            self.infected_count()
        );
        Ok(())
    }

    fn component(&self, name: &str) -> Option<&Component> {
        match name {
            SOCIAL_GRAPH => Some(&self.social_graph),
            INFECTION_STATE => Some(&self.infection_state),
            INFECTION_THRESHOLDS => Some(&self.infection_thresholds),
            _ => None,
        }
    }
}

/// Directed infector → infectee forest, rooted at the seed users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffusionTree {
    /// Infected users, ascending
    pub nodes: Vec<usize>,

    /// `(infector, infectee)` pairs
    pub edges: Vec<(usize, usize)>,
}

impl DiffusionTree {
    /// Mean shortest-path distance over all connected node pairs.
    ///
    /// Each tree contributes its Wiener index, computed from subtree sizes as
    /// `Σ_edges s · (n − s)`. Pairs in different trees are not connected and
    /// are left out. Returns `None` when the forest has no edge.
    pub fn structural_virality(&self) -> Option<f64> {
        if self.edges.is_empty() {
            return None;
        }

        let index_of = |user: usize| self.nodes.binary_search(&user).ok();
        let n = self.nodes.len();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut has_parent = vec![false; n];
        for &(parent, child) in &self.edges {
            let (p, c) = (index_of(parent)?, index_of(child)?);
            children[p].push(c);
            has_parent[c] = true;
        }

        let mut distance_sum = 0.0;
        let mut pair_count = 0.0;
        for root in (0..n).filter(|&i| !has_parent[i]) {
            // Iterative DFS; reversed visit order gives children before parents
            let mut order = Vec::new();
            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                order.push(node);
                stack.extend(children[node].iter().copied());
            }

            let tree_size = order.len() as f64;
            let mut subtree = vec![1.0_f64; n];
            for &node in order.iter().rev() {
                for &child in &children[node] {
                    subtree[node] += subtree[child];
                    distance_sum += subtree[child] * (tree_size - subtree[child]);
                }
            }
            pair_count += tree_size * (tree_size - 1.0) / 2.0;
        }

        (pair_count > 0.0).then(|| distance_sum / pair_count)
    }
}

/// Construction parameters for a diffusion engine.
#[derive(Debug, Clone)]
pub struct DiffusionConfig {
    /// Master seed for determinism
    pub seed: u64,

    pub num_users: Option<usize>,

    /// Must be 1
    pub num_items: usize,

    /// Unused by selection (every user sees the single item); kept for
    /// parity with other models
    pub items_per_iteration: usize,

    /// `num_users × num_users` adjacency
    pub social_graph: Option<Matrix>,

    /// `1 × num_items` infection probabilities
    pub item_representation: Option<Matrix>,

    /// `num_users × num_items` 0/1
    pub infection_state: Option<Matrix>,

    /// `num_users × num_items`, same scale as the probabilities
    pub infection_thresholds: Option<Matrix>,

    /// Edge probability for a generated graph
    pub edge_probability: f64,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_users: None,
            num_items: 1,
            items_per_iteration: DEFAULT_ITEMS_PER_ITERATION,
            social_graph: None,
            item_representation: None,
            infection_state: None,
            infection_thresholds: None,
            edge_probability: DEFAULT_EDGE_PROBABILITY,
        }
    }
}

impl DiffusionConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_num_users(mut self, n: usize) -> Self {
        self.num_users = Some(n);
        self
    }

    pub fn with_num_items(mut self, n: usize) -> Self {
        self.num_items = n;
        self
    }

    pub fn with_social_graph(mut self, m: Matrix) -> Self {
        self.social_graph = Some(m);
        self
    }

    pub fn with_item_representation(mut self, m: Matrix) -> Self {
        self.item_representation = Some(m);
        self
    }

    pub fn with_infection_state(mut self, m: Matrix) -> Self {
        self.infection_state = Some(m);
        self
    }

    pub fn with_infection_thresholds(mut self, m: Matrix) -> Self {
        self.infection_thresholds = Some(m);
        self
    }

    pub fn with_edge_probability(mut self, p: f64) -> Self {
        self.edge_probability = p;
        self
    }

    fn resolve_num_users(&self) -> Result<usize> {
        let inferred = [
            self.social_graph.as_ref().map(|m| m.nrows()),
            self.infection_state.as_ref().map(|m| m.nrows()),
            self.infection_thresholds.as_ref().map(|m| m.nrows()),
        ];
        let mut num_users = self.num_users;
        for n in inferred.into_iter().flatten() {
            match num_users {
                Some(declared) if declared != n => {
                    return Err(TrecsError::DimensionConflict {
                        what: "num_users",
                        declared,
                        inferred: n,
                    })
                }
                _ => num_users = Some(n),
            }
        }
        Ok(num_users.unwrap_or(DEFAULT_NUM_USERS))
    }

    /// Builds the engine, generating whatever was not supplied.
    pub fn build(self) -> Result<RecommenderEngine<Diffusion>> {
        let num_items = self
            .item_representation
            .as_ref()
            .map_or(self.num_items, |m| m.ncols());
        if num_items != 1 {
            return Err(TrecsError::UnsupportedItemCount {
                model: "diffusion",
                expected: 1,
                actual: num_items,
            });
        }
        let num_users = self.resolve_num_users()?;
        let mut init_rng = SeededSource::new(derive_seed(self.seed, 0));

        let probabilities = match self.item_representation {
            Some(m) => m,
            None => init_rng.sample_matrix(1, num_items, NamedDistribution::unit_uniform())?,
        };
        if probabilities.nrows() != 1 {
            return Err(TrecsError::shape(
                "item_representation",
                (1, num_items),
                probabilities.shape(),
            ));
        }

        let graph = match self.social_graph {
            Some(m) => m,
            None => init_rng.sample_matrix(
                num_users,
                num_users,
                NamedDistribution::Bernoulli {
                    p: self.edge_probability,
                },
            )?,
        };
        let thresholds = match self.infection_thresholds {
            Some(m) => m,
            None => init_rng.sample_matrix(num_users, num_items, NamedDistribution::unit_uniform())?,
        };
        let state = match self.infection_state {
            Some(m) => m,
            None => {
                let mut m = Matrix::zeros(num_users, num_items);
                m[(init_rng.index(num_users)?, 0)] = 1.0;
                m
            }
        };

        let behavior = Diffusion::new(graph, state, thresholds)?;
        // Everyone is receptive; the single item is always engaged with
        let users = Users::new(
            Matrix::zeros(num_users, 1),
            Some(Matrix::from_element(num_users, 1, 1.0)),
        )?;

        RecommenderEngine::new(
            users,
            Items::new(probabilities),
            behavior,
            Box::new(SeededSource::new(derive_seed(self.seed, 1))),
            self.items_per_iteration,
        )
    }
}

impl RecommenderEngine<Diffusion> {
    /// Adds a friendship edge in both directions.
    ///
    /// The newest snapshot of a tracked graph is replaced with the edited
    /// one, so history and live value stay in step.
    pub fn add_friends(&mut self, user1: usize, user2: usize) -> Result<()> {
        self.behavior_mut().add_friends(user1, user2)?;
        self.refresh_state()
    }

    /// Adds a directed edge: `follower` listens to `followee`.
    pub fn follow(&mut self, follower: usize, followee: usize) -> Result<()> {
        self.behavior_mut().follow(follower, followee)?;
        self.refresh_state()
    }

    pub fn get_structural_virality(&self) -> Option<f64> {
        self.behavior().get_structural_virality()
    }

    pub fn diffusion_tree(&self) -> DiffusionTree {
        self.behavior().diffusion_tree()
    }
}
