//! Content filtering: attribute-based recommendation.
//!
//! - **Predict**: `scores = P · A`, where `P` is the predicted
//!   `num_users × num_attributes` profile and `A` the
//!   `num_attributes × num_items` item matrix
//! - **Select**: top-`k` per user, ties to the lower item index, optionally
//!   mixed with random unseen items (exploration)
//! - **Update**: a user who engaged with item `i` gains `A[a, i]` on every
//!   attribute `a` (attribute-weighted increment; for binary items this is a
//!   unit increment on the attributes the item carries). There is no decay,
//!   so `P` stays non-negative as long as `A` is.

use crate::component::Matrix;
use crate::engine::{ModelBehavior, RecommenderEngine, DEFAULT_ITEMS_PER_ITERATION};
use crate::error::{Result, TrecsError};
use crate::items::Items;
use crate::users::{Feedback, Recommendations, Users};
use tracing::debug;
use trecs_env::{derive_seed, NamedDistribution, RandomSource, SeededSource};

/// Default population size.
pub const DEFAULT_NUM_USERS: usize = 100;

/// Default catalog size.
pub const DEFAULT_NUM_ITEMS: usize = 1250;

/// Default attribute dimension.
pub const DEFAULT_NUM_ATTRIBUTES: usize = 1000;

/// Probability an attribute is set on a generated binary item.
const ITEM_ATTRIBUTE_PROBABILITY: f64 = 0.3;

/// Spread of generated user preferences.
const PROFILE_STD_DEV: f64 = 0.8;

/// Content-filtering model behavior.
#[derive(Debug, Clone)]
pub struct ContentFiltering {
    /// Draw a random exploration share each iteration
    randomize_recommended: bool,

    /// Fixed split used when `randomize_recommended` is off
    num_recommended: Option<usize>,
    num_new_items: Option<usize>,
}

impl ContentFiltering {
    pub fn new() -> Self {
        Self {
            randomize_recommended: false,
            num_recommended: None,
            num_new_items: None,
        }
    }

    /// Mixes `n ∈ [0, k)` random items into every list, `n` drawn once per
    /// iteration.
    pub fn with_randomized_recommendations(mut self, enabled: bool) -> Self {
        self.randomize_recommended = enabled;
        self
    }

    /// Fixed split between top-scoring and random items.
    pub fn with_split(mut self, num_recommended: usize, num_new_items: usize) -> Self {
        self.num_recommended = Some(num_recommended);
        self.num_new_items = Some(num_new_items);
        self
    }

    fn split(&self, k: usize, rng: &mut dyn RandomSource) -> Result<(usize, usize)> {
        if self.randomize_recommended {
            let num_new = if k > 0 { rng.index(k)? } else { 0 };
            return Ok((k - num_new, num_new));
        }
        let num_recommended = self.num_recommended.unwrap_or(k).min(k);
        let num_new = self.num_new_items.unwrap_or(0).min(k - num_recommended);
        Ok((num_recommended, num_new))
    }
}

impl Default for ContentFiltering {
    fn default() -> Self {
        Self::new()
    }
}

/// Indices of the `n` highest scores in `row`, ties to the lower index.
pub fn top_k(scores: &Matrix, row: usize, n: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.ncols()).collect();
    // Stable sort keeps lower indices first among equal scores
    indices.sort_by(|&a, &b| scores[(row, b)].total_cmp(&scores[(row, a)]));
    indices.truncate(n);
    indices
}

impl ModelBehavior for ContentFiltering {
    fn name(&self) -> &'static str {
        "content_filtering"
    }

    fn validate(&self, users: &Users, items: &Items) -> Result<()> {
        if let Some((r, c)) = items.attributes().find_negative() {
            return Err(TrecsError::NegativeEntry(format!("item_attributes[{}, {}]", r, c)));
        }
        if let Some((r, c)) = users.predicted().find_negative() {
            return Err(TrecsError::NegativeEntry(format!(
                "predicted_user_profiles[{}, {}]",
                r, c
            )));
        }
        Ok(())
    }

    fn predict(&self, users: &Users, items: &Items) -> Result<Matrix> {
        let profiles = users.predicted().value();
        let attributes = items.attributes().value();
        if profiles.ncols() != attributes.nrows() {
            return Err(TrecsError::shape(
                "item_attributes",
                (profiles.ncols(), attributes.ncols()),
                attributes.shape(),
            ));
        }
        Ok(profiles * attributes)
    }

    fn select(
        &mut self,
        scores: &Matrix,
        items_per_iteration: usize,
        rng: &mut dyn RandomSource,
    ) -> Result<Recommendations> {
        let (num_recommended, num_new) = self.split(items_per_iteration, rng)?;
        debug!("Selecting {} recommended + {} new per user", num_recommended, num_new);

        let mut recommendations = Vec::with_capacity(scores.nrows());
        for user in 0..scores.nrows() {
            let mut presented = top_k(scores, user, num_recommended);
            if num_new > 0 {
                let fresh = rng.choose_distinct(scores.ncols(), num_new, &presented);
                presented.extend(fresh);
            }
            recommendations.push(presented);
        }
        Ok(recommendations)
    }

    fn update(&mut self, feedback: &Feedback, users: &mut Users, items: &Items) -> Result<()> {
        if feedback.len() != users.num_users() {
            return Err(TrecsError::shape(
                "feedback",
                (users.num_users(), 1),
                (feedback.len(), 1),
            ));
        }
        if users.num_attributes() != items.num_attributes() {
            return Err(TrecsError::shape(
                "predicted_user_profiles",
                (users.num_users(), items.num_attributes()),
                users.predicted().shape(),
            ));
        }
        if let Some(&bad) = feedback.iter().flatten().find(|&&i| i >= items.num_items()) {
            return Err(TrecsError::IndexOutOfRange {
                what: "items",
                index: bad,
                len: items.num_items(),
            });
        }

        let attributes = items.attributes().value();
        let profiles = users.predicted_mut().value_mut();

        for (user, choice) in feedback.iter().enumerate() {
            if let Some(item) = *choice {
                for a in 0..attributes.nrows() {
                    profiles[(user, a)] += attributes[(a, item)];
                }
            }
        }
        Ok(())
    }
}

/// Construction parameters for a content-filtering engine.
///
/// Dimensions left as `None` are inferred from supplied representations, then
/// fall back to the defaults. When only one representation is given, the
/// other adopts its attribute dimension and is generated.
#[derive(Debug, Clone)]
pub struct ContentFilteringConfig {
    /// Master seed for determinism
    pub seed: u64,

    pub num_users: Option<usize>,
    pub num_items: Option<usize>,
    pub num_attributes: Option<usize>,

    /// Items presented per user per iteration
    pub items_per_iteration: usize,

    /// Predicted profiles (`num_users × num_attributes`)
    pub user_representation: Option<Matrix>,

    /// Item attributes (`num_attributes × num_items`)
    pub item_representation: Option<Matrix>,

    /// Ground-truth profiles (`num_users × num_attributes`)
    pub actual_user_representation: Option<Matrix>,

    /// Generate actual profiles when none are supplied
    pub actual_user_scores: bool,

    /// Generated items are 0/1 (otherwise column-normalized reals)
    pub binary_items: bool,

    /// Mix a random exploration share into every list
    pub randomize_recommended: bool,

    /// Fixed `(num_recommended, num_new_items)` split per list
    pub split: Option<(usize, usize)>,
}

impl Default for ContentFilteringConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_users: None,
            num_items: None,
            num_attributes: None,
            items_per_iteration: DEFAULT_ITEMS_PER_ITERATION,
            user_representation: None,
            item_representation: None,
            actual_user_representation: None,
            actual_user_scores: true,
            binary_items: true,
            randomize_recommended: false,
            split: None,
        }
    }
}

impl ContentFilteringConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_num_users(mut self, n: usize) -> Self {
        self.num_users = Some(n);
        self
    }

    pub fn with_num_items(mut self, n: usize) -> Self {
        self.num_items = Some(n);
        self
    }

    pub fn with_num_attributes(mut self, n: usize) -> Self {
        self.num_attributes = Some(n);
        self
    }

    pub fn with_items_per_iteration(mut self, k: usize) -> Self {
        self.items_per_iteration = k;
        self
    }

    pub fn with_user_representation(mut self, m: Matrix) -> Self {
        self.user_representation = Some(m);
        self
    }

    pub fn with_item_representation(mut self, m: Matrix) -> Self {
        self.item_representation = Some(m);
        self
    }

    pub fn with_actual_user_representation(mut self, m: Matrix) -> Self {
        self.actual_user_representation = Some(m);
        self
    }

    pub fn with_actual_user_scores(mut self, enabled: bool) -> Self {
        self.actual_user_scores = enabled;
        self
    }

    pub fn with_binary_items(mut self, binary: bool) -> Self {
        self.binary_items = binary;
        self
    }

    pub fn with_randomized_recommendations(mut self, enabled: bool) -> Self {
        self.randomize_recommended = enabled;
        self
    }

    /// Presents `num_recommended` top items plus `num_new_items` random ones.
    pub fn with_split(mut self, num_recommended: usize, num_new_items: usize) -> Self {
        self.split = Some((num_recommended, num_new_items));
        self
    }

    /// Resolves `(num_users, num_items, num_attributes)`.
    pub fn dimensions(&self) -> Result<(usize, usize, usize)> {
        let user_rep = self.user_representation.as_ref().map(|m| m.shape());
        let item_rep = self.item_representation.as_ref().map(|m| m.shape());

        if let (Some((_, ua)), Some((ia, _))) = (user_rep, item_rep) {
            if ua != ia {
                return Err(TrecsError::DimensionConflict {
                    what: "num_attributes",
                    declared: ia,
                    inferred: ua,
                });
            }
        }

        let num_users = reconcile(
            "num_users",
            self.num_users,
            user_rep.map(|(u, _)| u),
            DEFAULT_NUM_USERS,
        )?;
        let num_items = reconcile(
            "num_items",
            self.num_items,
            item_rep.map(|(_, i)| i),
            DEFAULT_NUM_ITEMS,
        )?;
        let num_attributes = reconcile(
            "num_attributes",
            self.num_attributes,
            user_rep.map(|(_, a)| a).or(item_rep.map(|(a, _)| a)),
            DEFAULT_NUM_ATTRIBUTES,
        )?;
        Ok((num_users, num_items, num_attributes))
    }

    /// Builds the engine, generating whatever was not supplied.
    pub fn build(self) -> Result<RecommenderEngine<ContentFiltering>> {
        let (num_users, num_items, num_attributes) = self.dimensions()?;
        let mut init_rng = SeededSource::new(derive_seed(self.seed, 0));

        let items = match self.item_representation {
            Some(m) => m,
            None => generate_items(&mut init_rng, num_attributes, num_items, self.binary_items)?,
        };
        // The model knows nothing about users until they interact
        let predicted = self
            .user_representation
            .unwrap_or_else(|| Matrix::zeros(num_users, num_attributes));
        let actual = match self.actual_user_representation {
            Some(m) => {
                if m.shape() != (num_users, num_attributes) {
                    return Err(TrecsError::shape(
                        "actual_user_profiles",
                        (num_users, num_attributes),
                        m.shape(),
                    ));
                }
                Some(m)
            }
            None if self.actual_user_scores => {
                Some(generate_profiles(&mut init_rng, num_users, num_attributes)?)
            }
            None => None,
        };

        let users = Users::new(predicted, actual)?;
        let mut behavior =
            ContentFiltering::new().with_randomized_recommendations(self.randomize_recommended);
        if let Some((num_recommended, num_new_items)) = self.split {
            behavior = behavior.with_split(num_recommended, num_new_items);
        }
        RecommenderEngine::new(
            users,
            Items::new(items),
            behavior,
            Box::new(SeededSource::new(derive_seed(self.seed, 1))),
            self.items_per_iteration,
        )
    }
}

impl RecommenderEngine<ContentFiltering> {
    /// Grows the catalog by `num_new` generated items.
    ///
    /// New columns are drawn from the engine's random source in the style of
    /// the existing catalog (binary or normalized) and appended after the
    /// current items, so existing indices stay valid. Scores are recomputed
    /// for the larger catalog; metric series and state histories keep their
    /// length.
    pub fn expand_items(&mut self, num_new: usize) -> Result<()> {
        if num_new == 0 {
            return Ok(());
        }
        let binary = self.items().is_binary();
        let num_attributes = self.items().num_attributes();
        let fresh = generate_items(self.rng_mut(), num_attributes, num_new, binary)?;

        let current = self.items().attributes().value();
        let num_items = current.ncols();
        let mut grown = Matrix::zeros(num_attributes, num_items + num_new);
        grown.columns_mut(0, num_items).copy_from(current);
        grown.columns_mut(num_items, num_new).copy_from(&fresh);

        self.replace_items(grown)
    }
}

fn reconcile(
    what: &'static str,
    declared: Option<usize>,
    inferred: Option<usize>,
    default: usize,
) -> Result<usize> {
    match (declared, inferred) {
        (Some(declared), Some(inferred)) if declared != inferred => {
            Err(TrecsError::DimensionConflict {
                what,
                declared,
                inferred,
            })
        }
        (_, Some(n)) | (Some(n), None) => Ok(n),
        (None, None) => Ok(default),
    }
}

/// Generates an `num_attributes × num_items` item matrix.
///
/// Binary items set each attribute with probability 0.3; real-valued items
/// are uniform draws normalized so each item column sums to one.
pub fn generate_items(
    rng: &mut dyn RandomSource,
    num_attributes: usize,
    num_items: usize,
    binary: bool,
) -> Result<Matrix> {
    if binary {
        return Ok(rng.sample_matrix(
            num_attributes,
            num_items,
            NamedDistribution::Bernoulli {
                p: ITEM_ATTRIBUTE_PROBABILITY,
            },
        )?);
    }
    let mut m = rng.sample_matrix(num_attributes, num_items, NamedDistribution::unit_uniform())?;
    for mut column in m.column_iter_mut() {
        let total: f64 = column.sum();
        if total > 0.0 {
            column /= total;
        }
    }
    Ok(m)
}

/// Generates non-negative `num_users × num_attributes` ground-truth
/// preferences.
///
/// Entries are `|Normal(0, 0.8)|`; a row that comes out all zero gets one
/// random entry set to a uniform draw so every user prefers something.
pub fn generate_profiles(
    rng: &mut dyn RandomSource,
    num_users: usize,
    num_attributes: usize,
) -> Result<Matrix> {
    let mut m = rng.sample_matrix(
        num_users,
        num_attributes,
        NamedDistribution::AbsNormal {
            mean: 0.0,
            std_dev: PROFILE_STD_DEV,
        },
    )?;
    if num_attributes == 0 {
        return Ok(m);
    }
    for user in 0..num_users {
        if m.row(user).iter().all(|&v| v == 0.0) {
            let col = rng.index(num_attributes)?;
            m[(user, col)] = rng.sample(NamedDistribution::unit_uniform())?;
        }
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn small() -> ContentFilteringConfig {
        ContentFilteringConfig::default()
            .with_num_users(5)
            .with_num_items(15)
            .with_num_attributes(10)
    }

    #[test]
    fn test_build_dimensions() {
        let engine = small().build().unwrap();

        assert_eq!(engine.users().num_users(), 5);
        assert_eq!(engine.items().num_items(), 15);
        assert_eq!(engine.items().num_attributes(), 10);
        assert_eq!(engine.predicted_scores().shape(), (5, 15));
        assert!(engine.users().actual().is_some());
    }

    #[test]
    fn test_infer_from_user_representation() {
        let engine = ContentFilteringConfig::default()
            .with_user_representation(Matrix::from_element(3, 7, 1.0))
            .build()
            .unwrap();

        assert_eq!(engine.items().attributes().shape(), (7, DEFAULT_NUM_ITEMS));
    }

    #[test]
    fn test_infer_from_item_representation() {
        let engine = ContentFilteringConfig::default()
            .with_item_representation(Matrix::from_element(4, 9, 1.0))
            .build()
            .unwrap();

        assert_eq!(engine.users().predicted().shape(), (DEFAULT_NUM_USERS, 4));
        assert_eq!(engine.items().num_items(), 9);
    }

    #[test]
    fn test_attribute_conflict_rejected() {
        let err = ContentFilteringConfig::default()
            .with_user_representation(Matrix::zeros(3, 7))
            .with_item_representation(Matrix::zeros(6, 9))
            .build()
            .unwrap_err();
        assert!(matches!(err, TrecsError::DimensionConflict { .. }));

        let err = ContentFilteringConfig::default()
            .with_num_users(4)
            .with_user_representation(Matrix::zeros(3, 7))
            .build()
            .unwrap_err();
        assert!(matches!(err, TrecsError::DimensionConflict { what: "num_users", .. }));
    }

    #[test]
    fn test_negative_items_rejected() {
        let mut items = Matrix::from_element(2, 3, 1.0);
        items[(1, 2)] = -1.0;
        let err = ContentFilteringConfig::default()
            .with_item_representation(items)
            .with_num_users(2)
            .build()
            .unwrap_err();
        assert!(matches!(err, TrecsError::NegativeEntry(_)));
    }

    #[test]
    fn test_top_k_ties_by_index() {
        let scores = Matrix::from_row_slice(1, 5, &[1.0, 3.0, 3.0, 0.0, 3.0]);
        assert_eq!(top_k(&scores, 0, 3), vec![1, 2, 4]);
        assert_eq!(top_k(&scores, 0, 10).len(), 5);
    }

    #[test]
    fn test_predict_is_dot_product() {
        let users = Users::new(Matrix::from_row_slice(1, 2, &[1.0, 2.0]), None).unwrap();
        let items = Items::new(Matrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]));

        let scores = ContentFiltering::new().predict(&users, &items).unwrap();
        assert_relative_eq!(scores[(0, 0)], 3.0);
        assert_relative_eq!(scores[(0, 1)], 2.0);
    }

    #[test]
    fn test_update_adds_item_attributes() {
        let mut users = Users::new(Matrix::zeros(2, 3), None).unwrap();
        let items = Items::new(Matrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 0.5, 1.0, 1.0]));
        let mut behavior = ContentFiltering::new();

        behavior.update(&vec![Some(1), None], &mut users, &items).unwrap();
        behavior.update(&vec![Some(1), Some(0)], &mut users, &items).unwrap();

        let p = users.predicted().value();
        assert_relative_eq!(p[(0, 0)], 0.0);
        assert_relative_eq!(p[(0, 1)], 1.0);
        assert_relative_eq!(p[(0, 2)], 2.0);
        assert_relative_eq!(p[(1, 0)], 1.0);
        assert_relative_eq!(p[(1, 2)], 1.0);
    }

    #[test]
    fn test_select_with_fixed_split() {
        let mut behavior = ContentFiltering::new().with_split(2, 2);
        let scores = Matrix::from_row_slice(1, 6, &[5.0, 4.0, 3.0, 2.0, 1.0, 0.0]);
        let mut rng = SeededSource::new(3);

        let recs = behavior.select(&scores, 4, &mut rng).unwrap();
        assert_eq!(recs[0].len(), 4);
        assert_eq!(&recs[0][..2], &[0, 1]);
        assert!(recs[0][2..].iter().all(|i| *i >= 2));
    }

    #[test]
    fn test_randomized_select_has_k_distinct() {
        let mut behavior = ContentFiltering::new().with_randomized_recommendations(true);
        let scores = Matrix::zeros(3, 20);
        let mut rng = SeededSource::new(11);

        for _ in 0..10 {
            let recs = behavior.select(&scores, 5, &mut rng).unwrap();
            for list in recs {
                let mut sorted = list.clone();
                sorted.sort_unstable();
                sorted.dedup();
                assert_eq!(list.len(), 5);
                assert_eq!(sorted.len(), 5);
            }
        }
    }

    #[test]
    fn test_generated_real_items_normalized() {
        let mut rng = SeededSource::new(5);
        let m = generate_items(&mut rng, 4, 6, false).unwrap();
        for column in m.column_iter() {
            assert_relative_eq!(column.sum(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_generated_profiles_have_no_empty_rows() {
        let mut rng = SeededSource::new(5);
        let m = generate_profiles(&mut rng, 20, 3).unwrap();
        for row in m.row_iter() {
            assert!(row.iter().any(|&v| v > 0.0));
            assert!(row.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_predicted_profiles_start_at_zero() {
        let engine = small().build().unwrap();

        assert!(engine.users().predicted().value().iter().all(|&v| v == 0.0));
        assert!(engine.predicted_scores().iter().all(|&v| v == 0.0));
        // Ground truth is still generated
        let actual = engine.users().actual().unwrap().value();
        assert!(actual.row_iter().all(|row| row.iter().any(|&v| v > 0.0)));
    }

    #[test]
    fn test_update_rejects_bad_feedback() {
        let mut users = Users::new(Matrix::zeros(1, 3), None).unwrap();
        let items = Items::new(Matrix::from_element(3, 2, 1.0));
        let mut behavior = ContentFiltering::new();

        let err = behavior.update(&vec![Some(7)], &mut users, &items).unwrap_err();
        assert!(matches!(err, TrecsError::IndexOutOfRange { index: 7, len: 2, .. }));

        let narrow = Items::new(Matrix::from_element(2, 2, 1.0));
        let err = behavior.update(&vec![Some(0)], &mut users, &narrow).unwrap_err();
        assert!(matches!(err, TrecsError::ShapeMismatch { .. }));

        // Nothing was applied
        assert!(users.predicted().value().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_config_split_reaches_behavior() {
        let mut engine = small().with_items_per_iteration(4).with_split(1, 3).build().unwrap();
        engine.run(1).unwrap();

        for list in engine.recommendations() {
            // All scores are zero at t=0, so the single top item is item 0
            assert_eq!(list.len(), 4);
            assert_eq!(list[0], 0);
            assert!(list[1..].iter().all(|&i| i != 0));
        }
    }

    #[test]
    fn test_interaction_counts_span_startup_and_run() {
        let mut engine = small().with_items_per_iteration(3).build().unwrap();
        engine.startup(2).unwrap();
        engine.run(3).unwrap();

        assert_eq!(engine.users().interaction_counts(), &[5, 5, 5, 5, 5]);
    }

    #[test]
    fn test_expand_items() {
        let mut engine = small().build().unwrap();
        engine.add_metric(crate::metrics::RecommendationCoverage).unwrap();
        engine
            .add_state_variable("items", crate::component::ComponentKey::ItemAttributes)
            .unwrap();
        engine.run(2).unwrap();
        let before = engine.items().attributes().snapshot();

        engine.expand_items(6).unwrap();

        assert_eq!(engine.items().num_items(), 21);
        assert_eq!(engine.items().num_attributes(), 10);
        assert_eq!(engine.predicted_scores().shape(), (5, 21));
        assert!(engine.items().is_binary());
        assert_eq!(engine.items().attributes().value().columns(0, 15), before.columns(0, 15));
        assert!(engine.verify_system_state().unwrap());

        engine.run(2).unwrap();
        let m = engine.get_measurements().unwrap();
        assert_eq!(m.timesteps, vec![0, 1, 2, 3, 4]);
        assert_eq!(m.series[0].values.len(), 5);
        let history = &engine.get_system_state().unwrap()["items"];
        assert_eq!(history[1].ncols(), 15);
        assert_eq!(history[4].ncols(), 21);

        engine.expand_items(0).unwrap();
        assert_eq!(engine.items().num_items(), 21);
    }
}
