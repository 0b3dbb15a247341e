//! User population and the interaction rule.
//!
//! Users own two preference representations:
//! - **Predicted**: what the model believes; mutated by behaviors
//! - **Actual**: ground truth, hidden from the model; only used here to turn
//!   a presented item list into feedback
//!
//! The choice itself is delegated to an [`InteractionRule`], so a different
//! scoring or selection policy can be plugged in without touching the engine.

use crate::component::{Component, Matrix};
use crate::error::{Result, TrecsError};
use crate::items::Items;
use trecs_env::RandomSource;

/// Name of the predicted profile component.
pub const PREDICTED_USER_PROFILES: &str = "predicted_user_profiles";

/// Name of the actual profile component.
pub const ACTUAL_USER_PROFILES: &str = "actual_user_profiles";

/// Per user, the ordered list of presented item indices.
pub type Recommendations = Vec<Vec<usize>>;

/// Per user, the item they engaged with (if any).
pub type Feedback = Vec<Option<usize>>;

/// Policy that turns a presented list into a single choice.
pub trait InteractionRule: std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Picks at most one item from `presented` for `user`.
    ///
    /// `preferences` is the full `num_users × num_attributes` matrix the
    /// rule should score against.
    fn choose(
        &self,
        user: usize,
        preferences: &Matrix,
        presented: &[usize],
        items: &Items,
        rng: &mut dyn RandomSource,
    ) -> Result<Option<usize>>;
}

/// Default rule: engage with the best-scoring presented item.
///
/// Score is the dot product of the preference row and the item column.
/// Ties go to the item presented first; NaN scores never win.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighestScore;

impl HighestScore {
    fn score(user: usize, preferences: &Matrix, item: usize, items: &Items) -> f64 {
        let attributes = items.attributes().value();
        (0..attributes.nrows())
            .map(|a| preferences[(user, a)] * attributes[(a, item)])
            .sum()
    }
}

impl InteractionRule for HighestScore {
    fn name(&self) -> &str {
        "highest_score"
    }

    fn choose(
        &self,
        user: usize,
        preferences: &Matrix,
        presented: &[usize],
        items: &Items,
        _rng: &mut dyn RandomSource,
    ) -> Result<Option<usize>> {
        let mut best: Option<(usize, f64)> = None;

        for &item in presented {
            let score = Self::score(user, preferences, item, items);
            if score.is_nan() {
                best = best.or(Some((item, f64::NEG_INFINITY)));
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((item, score)),
            }
        }

        Ok(best.map(|(item, _)| item))
    }
}

/// Alternative rule: engage with a uniformly random presented item.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomChoice;

impl InteractionRule for RandomChoice {
    fn name(&self) -> &str {
        "random_choice"
    }

    fn choose(
        &self,
        _user: usize,
        _preferences: &Matrix,
        presented: &[usize],
        _items: &Items,
        rng: &mut dyn RandomSource,
    ) -> Result<Option<usize>> {
        if presented.is_empty() {
            return Ok(None);
        }
        Ok(Some(presented[rng.index(presented.len())?]))
    }
}

/// The user population.
#[derive(Debug)]
pub struct Users {
    predicted: Component,
    actual: Option<Component>,
    rule: Box<dyn InteractionRule>,
    interaction_counts: Vec<u64>,
}

impl Users {
    /// Creates users from a predicted profile and an optional ground truth.
    ///
    /// Both matrices must have the same shape.
    pub fn new(predicted: Matrix, actual: Option<Matrix>) -> Result<Self> {
        if let Some(actual) = &actual {
            if actual.shape() != predicted.shape() {
                return Err(TrecsError::shape(
                    ACTUAL_USER_PROFILES,
                    predicted.shape(),
                    actual.shape(),
                ));
            }
        }

        let num_users = predicted.nrows();
        Ok(Self {
            predicted: Component::new(PREDICTED_USER_PROFILES, predicted),
            actual: actual.map(|m| Component::new(ACTUAL_USER_PROFILES, m)),
            rule: Box::new(HighestScore),
            interaction_counts: vec![0; num_users],
        })
    }

    /// Swaps the interaction rule.
    pub fn with_rule(mut self, rule: Box<dyn InteractionRule>) -> Self {
        self.rule = rule;
        self
    }

    pub fn num_users(&self) -> usize {
        self.predicted.value().nrows()
    }

    pub fn num_attributes(&self) -> usize {
        self.predicted.value().ncols()
    }

    pub fn predicted(&self) -> &Component {
        &self.predicted
    }

    pub fn predicted_mut(&mut self) -> &mut Component {
        &mut self.predicted
    }

    pub fn actual(&self) -> Option<&Component> {
        self.actual.as_ref()
    }

    pub fn rule(&self) -> &dyn InteractionRule {
        self.rule.as_ref()
    }

    /// Number of timesteps in which each user engaged with an item.
    ///
    /// Cumulative over the whole run, startup included.
    pub fn interaction_counts(&self) -> &[u64] {
        &self.interaction_counts
    }

    /// Turns presented lists into feedback.
    ///
    /// Scores against actual preferences when present, else against the
    /// predicted profile.
    pub fn get_user_feedback(
        &mut self,
        recommendations: &Recommendations,
        items: &Items,
        rng: &mut dyn RandomSource,
    ) -> Result<Feedback> {
        if recommendations.len() != self.num_users() {
            return Err(TrecsError::shape(
                "recommendations",
                (self.num_users(), 0),
                (recommendations.len(), 0),
            ));
        }

        if items.num_attributes() != self.num_attributes() {
            return Err(TrecsError::shape(
                "item_attributes",
                (self.num_attributes(), items.num_items()),
                items.attributes().shape(),
            ));
        }

        let preferences = self.actual.as_ref().unwrap_or(&self.predicted).value();
        let mut feedback = Vec::with_capacity(recommendations.len());

        for (user, presented) in recommendations.iter().enumerate() {
            if let Some(&bad) = presented.iter().find(|&&i| i >= items.num_items()) {
                return Err(TrecsError::IndexOutOfRange {
                    what: "items",
                    index: bad,
                    len: items.num_items(),
                });
            }
            let choice = self.rule.choose(user, preferences, presented, items, rng)?;
            if choice.is_some() {
                self.interaction_counts[user] += 1;
            }
            feedback.push(choice);
        }

        Ok(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trecs_env::SeededSource;

    fn items() -> Items {
        // 2 attributes × 3 items
        Items::new(Matrix::from_row_slice(2, 3, &[1.0, 0.0, 1.0, 0.0, 1.0, 1.0]))
    }

    #[test]
    fn test_highest_score_picks_best() {
        let actual = Matrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 2.0]);
        let mut users = Users::new(Matrix::zeros(2, 2), Some(actual)).unwrap();
        let mut rng = SeededSource::new(1);

        let recs = vec![vec![0, 1], vec![0, 1]];
        let feedback = users.get_user_feedback(&recs, &items(), &mut rng).unwrap();

        assert_eq!(feedback, vec![Some(0), Some(1)]);
        assert_eq!(users.interaction_counts(), &[1, 1]);
    }

    #[test]
    fn test_ties_go_to_first_presented() {
        let actual = Matrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let mut users = Users::new(Matrix::zeros(1, 2), Some(actual)).unwrap();
        let mut rng = SeededSource::new(1);

        // Items 0 and 1 both score 1.0
        let feedback = users
            .get_user_feedback(&vec![vec![1, 0]], &items(), &mut rng)
            .unwrap();
        assert_eq!(feedback, vec![Some(1)]);
    }

    #[test]
    fn test_empty_presentation_gives_none() {
        let mut users = Users::new(Matrix::zeros(1, 2), None).unwrap();
        let mut rng = SeededSource::new(1);

        let feedback = users.get_user_feedback(&vec![vec![]], &items(), &mut rng).unwrap();
        assert_eq!(feedback, vec![None]);
        assert_eq!(users.interaction_counts(), &[0]);
    }

    #[test]
    fn test_falls_back_to_predicted_profile() {
        let predicted = Matrix::from_row_slice(1, 2, &[0.0, 3.0]);
        let mut users = Users::new(predicted, None).unwrap();
        let mut rng = SeededSource::new(1);

        let feedback = users
            .get_user_feedback(&vec![vec![0, 1]], &items(), &mut rng)
            .unwrap();
        assert_eq!(feedback, vec![Some(1)]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = Users::new(Matrix::zeros(2, 3), Some(Matrix::zeros(2, 4))).unwrap_err();
        assert!(matches!(err, TrecsError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_out_of_range_item_rejected() {
        let mut users = Users::new(Matrix::zeros(1, 2), None).unwrap();
        let mut rng = SeededSource::new(1);

        let err = users
            .get_user_feedback(&vec![vec![9]], &items(), &mut rng)
            .unwrap_err();
        assert!(matches!(err, TrecsError::IndexOutOfRange { index: 9, .. }));
    }

    #[test]
    fn test_random_choice_rule() {
        let mut users = Users::new(Matrix::zeros(1, 2), None)
            .unwrap()
            .with_rule(Box::new(RandomChoice));
        let mut rng = SeededSource::new(5);

        assert_eq!(users.rule().name(), "random_choice");
        let feedback = users
            .get_user_feedback(&vec![vec![2, 1]], &items(), &mut rng)
            .unwrap();
        assert!(matches!(feedback[0], Some(1) | Some(2)));
    }

    #[test]
    fn test_attribute_mismatch_rejected() {
        let mut users = Users::new(Matrix::zeros(1, 2), None).unwrap();
        let wide = Items::new(Matrix::from_element(3, 2, 1.0));
        let mut rng = SeededSource::new(1);

        let err = users
            .get_user_feedback(&vec![vec![0, 1]], &wide, &mut rng)
            .unwrap_err();
        assert!(matches!(err, TrecsError::ShapeMismatch { .. }));
        assert_eq!(users.interaction_counts(), &[0]);
    }
}
