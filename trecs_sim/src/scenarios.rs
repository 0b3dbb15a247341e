//! Canned simulation scenarios.

use crate::error::SimError;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: content filtering feedback loop, no exploration
    Homogenization,

    /// SIM-002: random presentation phase before the model takes over
    StartupExploration,

    /// SIM-003: content filtering with a random exploration share
    ExplorationMix,

    /// SIM-004: diffusion over a generated social graph
    ViralSpread,

    /// SIM-005: hand-built friendship star around one seed user
    FriendStar,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Homogenization,
            ScenarioId::StartupExploration,
            ScenarioId::ExplorationMix,
            ScenarioId::ViralSpread,
            ScenarioId::FriendStar,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Homogenization => "homogenization",
            ScenarioId::StartupExploration => "startup_exploration",
            ScenarioId::ExplorationMix => "exploration_mix",
            ScenarioId::ViralSpread => "viral_spread",
            ScenarioId::FriendStar => "friend_star",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Homogenization => {
                "Top-k content filtering; track interaction spread and catalog coverage"
            }
            ScenarioId::StartupExploration => {
                "Random items for a startup phase, then top-k; coverage per phase"
            }
            ScenarioId::ExplorationMix => {
                "Top-k mixed with a random share of unseen items every iteration"
            }
            ScenarioId::ViralSpread => {
                "Diffusion of one item from a random seed over a random graph"
            }
            ScenarioId::FriendStar => {
                "Seed user befriends two users; expect both infected, virality 4/3"
            }
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "homogenization" | "sim-001" => Ok(ScenarioId::Homogenization),
            "startup_exploration" | "startup" | "sim-002" => Ok(ScenarioId::StartupExploration),
            "exploration_mix" | "exploration" | "sim-003" => Ok(ScenarioId::ExplorationMix),
            "viral_spread" | "viral" | "sim-004" => Ok(ScenarioId::ViralSpread),
            "friend_star" | "star" | "sim-005" => Ok(ScenarioId::FriendStar),
            _ => Err(SimError::UnknownScenario(s.to_string())),
        }
    }
}
