//! End-to-end scenarios for both model behaviors.

use approx::assert_relative_eq;
use trecs_core::content::DEFAULT_NUM_ITEMS;
use trecs_core::{
    ComponentKey, ContentFilteringConfig, DiffusionConfig, InfectedFraction, InteractionSpread,
    Matrix, MemorySink, RecommendationCoverage, ReportSink, TrecsError,
};

#[test]
fn test_content_filtering_zero_timesteps() {
    let mut engine = ContentFilteringConfig::default()
        .with_num_users(5)
        .with_num_attributes(10)
        .with_num_items(15)
        .build()
        .unwrap();
    engine
        .add_metrics(vec![Box::new(InteractionSpread::new())])
        .unwrap();

    engine.run(0).unwrap();

    let m = engine.get_measurements().unwrap();
    assert_eq!(m.timesteps, vec![0]);
    assert_eq!(m.series.len(), 1);
    assert_eq!(m.series[0].values, vec![None]);
}

#[test]
fn test_diffusion_spreads_from_seed_to_friends() {
    let mut state = Matrix::zeros(5, 1);
    state[(4, 0)] = 1.0;

    let mut engine = DiffusionConfig::default()
        .with_num_users(5)
        .with_social_graph(Matrix::zeros(5, 5))
        .with_infection_state(state)
        .with_infection_thresholds(Matrix::from_element(5, 1, 0.2))
        .with_item_representation(Matrix::from_element(1, 1, 0.7))
        .build()
        .unwrap();
    engine.add_friends(4, 0).unwrap();
    engine.add_friends(4, 1).unwrap();
    engine
        .add_state_variable("infections", ComponentKey::behavior("infection_state"))
        .unwrap();

    engine.run(2).unwrap();

    let history = &engine.get_system_state().unwrap()["infections"];
    assert_eq!(history.len(), 3);
    assert_eq!(history[2][(0, 0)], 1.0);
    assert_eq!(history[2][(1, 0)], 1.0);
    assert_eq!(history[2][(2, 0)], 0.0);
    assert_eq!(history[2][(3, 0)], 0.0);

    // Star with center 4 and leaves 0, 1: distances 1, 1, 2
    let virality = engine.get_structural_virality().unwrap();
    assert!(virality.is_finite() && virality >= 0.0);
    assert_relative_eq!(virality, 4.0 / 3.0);

    let tree = engine.diffusion_tree();
    assert_eq!(tree.nodes, vec![0, 1, 4]);
    assert_eq!(tree.edges, vec![(4, 0), (4, 1)]);
}

#[test]
fn test_virality_undefined_without_spread() {
    let mut state = Matrix::zeros(3, 1);
    state[(0, 0)] = 1.0;
    let mut engine = DiffusionConfig::default()
        .with_social_graph(Matrix::zeros(3, 3))
        .with_infection_state(state)
        .with_infection_thresholds(Matrix::from_element(3, 1, 0.5))
        .with_item_representation(Matrix::from_element(1, 1, 0.9))
        .build()
        .unwrap();

    engine.run(5).unwrap();
    assert_eq!(engine.get_structural_virality(), None);
}

#[test]
fn test_two_metric_registrations_aligned() {
    let mut engine = ContentFilteringConfig::default()
        .with_num_users(8)
        .with_num_items(30)
        .with_num_attributes(6)
        .build()
        .unwrap();
    engine.add_metric(InteractionSpread::new()).unwrap();
    engine.add_metric(RecommendationCoverage).unwrap();

    engine.run(7).unwrap();

    let m = engine.get_measurements().unwrap();
    assert_eq!(m.names(), vec!["interaction_spread", "recommendation_coverage"]);
    assert_eq!(m.series[0].values.len(), m.series[1].values.len());
    assert_eq!(m.timesteps, (0..=7).collect::<Vec<_>>());
}

#[test]
fn test_dimension_inference_symmetric() {
    let from_users = ContentFilteringConfig::default()
        .with_user_representation(Matrix::from_element(6, 4, 0.5))
        .build()
        .unwrap();
    assert_eq!(from_users.items().attributes().shape(), (4, DEFAULT_NUM_ITEMS));

    let from_items = ContentFilteringConfig::default()
        .with_num_users(6)
        .with_item_representation(Matrix::from_element(4, 11, 1.0))
        .build()
        .unwrap();
    assert_eq!(from_items.users().predicted().shape(), (6, 4));
}

#[test]
fn test_diffusion_rejects_shape_errors() {
    let err = DiffusionConfig::default()
        .with_social_graph(Matrix::zeros(4, 4))
        .with_infection_state(Matrix::zeros(5, 1))
        .build()
        .unwrap_err();
    assert!(matches!(err, TrecsError::DimensionConflict { .. }));

    let err = DiffusionConfig::default()
        .with_social_graph(Matrix::zeros(4, 3))
        .build()
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_report_sink_receives_tree_and_series() {
    let mut state = Matrix::zeros(3, 1);
    state[(0, 0)] = 1.0;
    let mut engine = DiffusionConfig::default()
        .with_social_graph(Matrix::zeros(3, 3))
        .with_infection_state(state)
        .with_infection_thresholds(Matrix::zeros(3, 1))
        .with_item_representation(Matrix::from_element(1, 1, 0.5))
        .build()
        .unwrap();
    engine.add_friends(0, 1).unwrap();
    engine.add_friends(1, 2).unwrap();
    engine.add_metric(InfectedFraction).unwrap();
    engine.run(3).unwrap();

    let mut sink = MemorySink::default();
    engine.get_measurements().unwrap().report_to(&mut sink);
    sink.diffusion_tree(&engine.diffusion_tree());

    assert_eq!(sink.series[0].2, vec![None, Some(2.0 / 3.0), Some(1.0), Some(1.0)]);
    assert_eq!(sink.trees[0].edges, vec![(0, 1), (1, 2)]);
}
