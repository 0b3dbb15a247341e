//! Property tests over random configurations.

use proptest::prelude::*;
use trecs_core::{
    ComponentKey, ContentFiltering, ContentFilteringConfig, DiffusionConfig, InfectedFraction,
    InteractionSpread, RecommendationCoverage, RecommenderEngine,
};

fn content_engine(
    seed: u64,
    users: usize,
    items: usize,
    attributes: usize,
    k: usize,
) -> RecommenderEngine<ContentFiltering> {
    ContentFilteringConfig::default()
        .with_seed(seed)
        .with_num_users(users)
        .with_num_items(items)
        .with_num_attributes(attributes)
        .with_items_per_iteration(k)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn series_have_one_entry_per_timestep(
        seed in any::<u64>(),
        users in 1usize..8,
        items in 1usize..20,
        steps in 0usize..6,
    ) {
        let mut engine = content_engine(seed, users, items, 4, 3);
        engine.add_metric(InteractionSpread::new()).unwrap();
        engine.run(steps).unwrap();

        let m = engine.get_measurements().unwrap();
        prop_assert_eq!(m.timesteps.len(), steps + 1);
        prop_assert_eq!(m.series[0].values.len(), steps + 1);
        prop_assert_eq!(m.series[0].values[0], None);
        prop_assert_eq!(m.timesteps.last().copied(), Some(engine.timestep()));
    }

    #[test]
    fn state_history_ends_at_live_value(
        seed in any::<u64>(),
        steps in 0usize..6,
        startup in 0usize..3,
    ) {
        let mut engine = content_engine(seed, 4, 10, 5, 2);
        engine
            .add_state_variable("profiles", ComponentKey::PredictedUserProfiles)
            .unwrap();
        engine
            .add_state_variable("scores", ComponentKey::PredictedScores)
            .unwrap();
        engine.startup(startup).unwrap();
        engine.run(steps).unwrap();

        let state = engine.get_system_state().unwrap();
        prop_assert_eq!(state["profiles"].len(), startup + steps + 1);
        prop_assert_eq!(
            state["profiles"].last().unwrap(),
            engine.users().predicted().value()
        );
        prop_assert!(engine.verify_system_state().unwrap());
    }

    #[test]
    fn same_seed_same_trajectory(seed in any::<u64>(), steps in 1usize..5) {
        let mut a = content_engine(seed, 5, 12, 6, 4);
        let mut b = content_engine(seed, 5, 12, 6, 4);
        for engine in [&mut a, &mut b] {
            engine
                .add_metrics(vec![
                    Box::new(InteractionSpread::new()),
                    Box::new(RecommendationCoverage),
                ])
                .unwrap();
        }
        a.startup(1).unwrap();
        b.startup(1).unwrap();
        a.run(steps).unwrap();
        b.run(steps).unwrap();

        prop_assert_eq!(a.users().predicted().value(), b.users().predicted().value());
        prop_assert_eq!(a.recommendations(), b.recommendations());
        prop_assert_eq!(a.feedback(), b.feedback());
        prop_assert_eq!(a.get_measurements().unwrap(), b.get_measurements().unwrap());
    }

    #[test]
    fn same_seed_same_diffusion(
        seed in any::<u64>(),
        users in 2usize..20,
        steps in 1usize..6,
    ) {
        let build = || {
            let mut engine = DiffusionConfig::default()
                .with_seed(seed)
                .with_num_users(users)
                .with_edge_probability(0.3)
                .build()
                .unwrap();
            engine.add_metric(InfectedFraction).unwrap();
            engine
        };
        let mut a = build();
        let mut b = build();
        a.run(steps).unwrap();
        b.run(steps).unwrap();

        prop_assert_eq!(a.behavior().social_graph(), b.behavior().social_graph());
        prop_assert_eq!(a.behavior().infection_state(), b.behavior().infection_state());
        prop_assert_eq!(a.diffusion_tree(), b.diffusion_tree());
        prop_assert_eq!(a.get_measurements().unwrap(), b.get_measurements().unwrap());
    }

    #[test]
    fn profiles_stay_non_negative(seed in any::<u64>(), steps in 0usize..6) {
        let mut engine = content_engine(seed, 6, 15, 5, 3);
        engine.run(steps).unwrap();
        prop_assert!(engine.users().predicted().find_negative().is_none());
    }

    #[test]
    fn recommendations_are_distinct_and_in_range(
        seed in any::<u64>(),
        items in 1usize..15,
        k in 0usize..20,
    ) {
        let mut engine = content_engine(seed, 3, items, 4, k);
        engine.run(1).unwrap();

        for list in engine.recommendations() {
            let mut sorted = list.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(list.len(), k.min(items));
            prop_assert_eq!(sorted.len(), list.len());
            prop_assert!(list.iter().all(|&i| i < items));
        }
    }

    #[test]
    fn infections_never_recover(
        seed in any::<u64>(),
        users in 2usize..25,
        edge_probability in 0.0f64..0.5,
        steps in 1usize..8,
    ) {
        let mut engine = DiffusionConfig::default()
            .with_seed(seed)
            .with_num_users(users)
            .with_edge_probability(edge_probability)
            .build()
            .unwrap();

        let mut infected = engine.behavior().infected_count();
        for _ in 0..steps {
            engine.run(1).unwrap();
            let now = engine.behavior().infected_count();
            prop_assert!(now >= infected);
            infected = now;
        }

        if let Some(virality) = engine.get_structural_virality() {
            prop_assert!(virality.is_finite());
            prop_assert!(virality >= 1.0);
        }
    }
}
