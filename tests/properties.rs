// Property-based tests over randomly shaped conversion networks.
//
// Every generated event moves one unit from a reactant species to a
// different product species at rate `k * reactant`, so:
// 1. Total mass is conserved and no count goes negative
// 2. The valid/invalid partition always matches the propensities
// 3. The dependency graph is symmetric and reflexive
// 4. Ensembles do not depend on the thread count

#![allow(clippy::unwrap_used)]

use gillespie::{
    EngineConfig, EnsembleOptions, Equilibrium, EventId, Method, NetworkInputs, Propensity,
    ReactionNetwork, SimulationEngine, ZERO_PROPENSITY, run_ensemble,
};
use proptest::prelude::*;

const STEP_LIMIT: u64 = 30;

#[derive(Clone, Debug)]
struct NetworkShape {
    counts: Vec<u32>,
    events: Vec<(usize, usize, f64)>,
}

impl NetworkShape {
    fn build(&self) -> ReactionNetwork {
        let mut inputs = NetworkInputs {
            step_limit: Some(STEP_LIMIT),
            ..Default::default()
        };
        inputs.state.insert("time".into(), vec![0.0]);
        for (idx, &count) in self.counts.iter().enumerate() {
            inputs.state.insert(format!("s{idx}"), vec![f64::from(count)]);
        }
        let n_species = self.counts.len();
        for (idx, &(reactant, product, rate)) in self.events.iter().enumerate() {
            let product = if product == reactant {
                (reactant + 1) % n_species
            } else {
                product
            };
            let id = EventId::from(idx);
            inputs.propensity.insert(
                id.clone(),
                Propensity::expression(&format!("{rate} * s{reactant}")).unwrap(),
            );
            inputs.stoichiometry.insert(
                id,
                [(format!("s{reactant}"), -1), (format!("s{product}"), 1)]
                    .into_iter()
                    .collect(),
            );
        }
        ReactionNetwork::from_inputs(inputs).unwrap()
    }

    fn total(&self) -> f64 {
        self.counts.iter().map(|&count| f64::from(count)).sum()
    }
}

fn shape_strategy() -> impl Strategy<Value = NetworkShape> {
    (2usize..5)
        .prop_flat_map(|n_species| {
            (
                prop::collection::vec(0u32..20, n_species),
                prop::collection::vec((0..n_species, 0..n_species, 0.1f64..2.0), 1..6),
            )
        })
        .prop_map(|(counts, events)| NetworkShape { counts, events })
}

fn method_strategy() -> impl Strategy<Value = Method> {
    prop_oneof![
        Just(Method::Direct),
        Just(Method::FirstReaction),
        Just(Method::NextReaction),
        (1usize..4).prop_map(|families| Method::FamilyPartitioned { families }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn trajectories_conserve_mass(
        shape in shape_strategy(),
        method in method_strategy(),
        seed in any::<u64>(),
    ) {
        let config = EngineConfig { method, trajectories: 1, seed: Some(seed) };
        let mut engine = SimulationEngine::new(shape.build(), config).unwrap();
        let (network, equilibrium) = engine.next_run().unwrap().unwrap();

        prop_assert_eq!(network.len() as u64, network.steps() + 1);
        for pair in network.time().windows(2) {
            prop_assert!(pair[1] > pair[0], "time went from {} to {}", pair[0], pair[1]);
        }
        for entry in 0..network.len() {
            let mut mass = 0.0;
            for (_, values) in network.species_series() {
                prop_assert!(values[entry] >= 0.0);
                mass += values[entry];
            }
            prop_assert_eq!(mass, shape.total());
        }

        match equilibrium {
            Equilibrium::StepLimit => prop_assert_eq!(network.steps(), STEP_LIMIT),
            Equilibrium::Absorbing => prop_assert_eq!(network.valid_events().count(), 0),
            other => prop_assert!(false, "unexpected equilibrium {}", other),
        }
    }

    #[test]
    fn partition_tracks_propensities(
        shape in shape_strategy(),
        method in method_strategy(),
        seed in any::<u64>(),
    ) {
        let config = EngineConfig { method, trajectories: 1, seed: Some(seed) };
        let mut engine = SimulationEngine::new(shape.build(), config).unwrap();
        let (network, _) = engine.next_run().unwrap().unwrap();
        for event in network.event_ids() {
            let rate = network.propensity_of(event).unwrap();
            prop_assert_eq!(network.is_valid(event).unwrap(), rate > ZERO_PROPENSITY);
        }
        prop_assert_eq!(
            network.valid_events().count() + network.invalid_events().count(),
            network.n_events()
        );
    }

    #[test]
    fn dependency_graph_is_symmetric(shape in shape_strategy()) {
        let network = shape.build();
        let graph = network.graph();
        prop_assert_eq!(graph.len(), network.n_events());
        for a in 0..graph.len() {
            prop_assert!(graph.depends_on(a, a));
            for b in 0..graph.len() {
                prop_assert_eq!(graph.depends_on(a, b), graph.depends_on(b, a));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn ensembles_ignore_thread_count(
        shape in shape_strategy(),
        method in method_strategy(),
        seed in any::<u64>(),
    ) {
        let network = shape.build();
        let mut options = EnsembleOptions {
            method,
            trajectories: 4,
            n_threads: Some(1),
            seed: Some(seed),
        };
        let serial = run_ensemble(&network, &options).unwrap();
        options.n_threads = Some(2);
        let parallel = run_ensemble(&network, &options).unwrap();
        prop_assert_eq!(serial, parallel);
    }
}
