//! Named numeric containers shared by users, items and behaviors.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Dense real matrix used for every representation in the engine.
pub type Matrix = DMatrix<f64>;

/// A named matrix value.
///
/// Components carry no ownership links to each other; the engine owns all
/// of them and hands out references to each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    name: String,
    value: Matrix,
}

impl Component {
    pub fn new(name: impl Into<String>, value: Matrix) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Matrix {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Matrix {
        &mut self.value
    }

    /// Replaces the value wholesale.
    pub fn set(&mut self, value: Matrix) {
        self.value = value;
    }

    /// Returns `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.value.shape()
    }

    /// Deep copy of the current value.
    pub fn snapshot(&self) -> Matrix {
        self.value.clone()
    }

    /// Returns the first negative entry as `(row, col)`, if any.
    pub fn find_negative(&self) -> Option<(usize, usize)> {
        let (rows, cols) = self.value.shape();
        (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (r, c)))
            .find(|&(r, c)| self.value[(r, c)] < 0.0)
    }
}

/// Address of a component the engine can resolve at any timestep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKey {
    /// `num_users × num_attributes` model estimate
    PredictedUserProfiles,

    /// `num_users × num_attributes` ground truth
    ActualUserProfiles,

    /// `num_attributes × num_items`
    ItemAttributes,

    /// `num_users × num_items` scores from the last Predict step
    PredictedScores,

    /// A component owned by the model behavior, looked up by name
    Behavior(String),
}

impl ComponentKey {
    /// Shorthand for a behavior-owned component.
    pub fn behavior(name: impl Into<String>) -> Self {
        Self::Behavior(name.into())
    }
}

impl std::fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PredictedUserProfiles => write!(f, "predicted_user_profiles"),
            Self::ActualUserProfiles => write!(f, "actual_user_profiles"),
            Self::ItemAttributes => write!(f, "item_attributes"),
            Self::PredictedScores => write!(f, "predicted_scores"),
            Self::Behavior(name) => write!(f, "behavior:{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_deep_copy() {
        let mut c = Component::new("x", Matrix::zeros(2, 2));
        let snap = c.snapshot();

        c.value_mut()[(0, 0)] = 5.0;

        assert_eq!(snap[(0, 0)], 0.0);
        assert_eq!(c.value()[(0, 0)], 5.0);
        assert_eq!(c.shape(), (2, 2));
    }

    #[test]
    fn test_find_negative() {
        let mut c = Component::new("x", Matrix::from_element(3, 2, 1.0));
        assert_eq!(c.find_negative(), None);

        c.value_mut()[(2, 1)] = -0.5;
        assert_eq!(c.find_negative(), Some((2, 1)));
    }

    #[test]
    fn test_component_key_display() {
        assert_eq!(ComponentKey::ItemAttributes.to_string(), "item_attributes");
        assert_eq!(
            ComponentKey::behavior("infection_state").to_string(),
            "behavior:infection_state"
        );
    }
}
