// End-to-end runs of the simulation engine over small reaction networks.

#![allow(clippy::unwrap_used)]

use gillespie::{
    DEFAULT_SEED, EngineConfig, EnsembleOptions, Equilibrium, EventId, Method, NetworkDocument,
    NetworkInputs, Propensity, ReactionNetwork, SimError, SimulationEngine, Trajectory,
    run_ensemble,
};

const EXCHANGE: &str = r#"{
    "state": {"a": [10], "b": [0], "time": [0.0]},
    "propensity": {"0": "0.5 * a", "1": "0.5 * b"},
    "stoichiometry": {"0": {"a": -1, "b": 1}, "1": {"a": 1, "b": -1}},
    "step_limit": 10
}"#;

const ALL_METHODS: [Method; 5] = [
    Method::Direct,
    Method::FirstReaction,
    Method::NextReaction,
    Method::FamilyPartitioned { families: 1 },
    Method::FamilyPartitioned { families: 2 },
];

fn load(json: &str) -> ReactionNetwork {
    NetworkDocument::from_json_str(json)
        .unwrap()
        .into_network()
        .unwrap()
}

fn run_once(network: ReactionNetwork, method: Method, seed: u64) -> Trajectory {
    let config = EngineConfig {
        method,
        trajectories: 1,
        seed: Some(seed),
    };
    SimulationEngine::new(network, config)
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
}

fn assert_strictly_increasing(values: &[f64]) {
    for pair in values.windows(2) {
        assert!(pair[1] > pair[0], "time went from {} to {}", pair[0], pair[1]);
    }
}

#[test]
fn exchange_scenario_conserves_mass() {
    for method in ALL_METHODS {
        let trajectory = run_once(load(EXCHANGE), method, 2);
        assert_eq!(trajectory.len(), 11, "{method}");
        assert_eq!(trajectory.steps, 10);
        assert_eq!(trajectory.equilibrium, Equilibrium::StepLimit);
        assert_strictly_increasing(&trajectory.time);

        let a = trajectory.series("a").unwrap();
        let b = trajectory.series("b").unwrap();
        assert_eq!(a[0], 10.0);
        assert_eq!(b[0], 0.0);
        assert_eq!(a[1], 9.0, "{method}: only the forward event can fire first");
        for idx in 0..a.len() {
            assert_eq!(a[idx] + b[idx], 10.0);
        }
        for pair in a.windows(2) {
            assert_eq!((pair[1] - pair[0]).abs(), 1.0);
        }
    }
}

#[test]
fn same_seed_reproduces_trajectory() {
    for method in ALL_METHODS {
        let first = run_once(load(EXCHANGE), method, 17);
        let second = run_once(load(EXCHANGE), method, 17);
        assert_eq!(first.time, second.time, "{method}");
        assert_eq!(first.species, second.species, "{method}");

        let other = run_once(load(EXCHANGE), method, 18);
        assert_ne!(first.time, other.time, "{method}");
    }
}

#[test]
fn default_seed_is_used_when_unset() {
    let engine = SimulationEngine::new(load(EXCHANGE), EngineConfig::default()).unwrap();
    assert_eq!(engine.seed(), DEFAULT_SEED);
    assert_eq!(engine.method(), Method::Direct);
    assert_eq!(engine.remaining(), 1);
}

#[test]
fn engine_runs_consecutive_trajectories_from_one_stream() {
    let config = EngineConfig {
        method: Method::NextReaction,
        trajectories: 3,
        seed: Some(4),
    };
    let mut engine = SimulationEngine::new(load(EXCHANGE), config).unwrap();
    let mut times = Vec::new();
    while let Some(run) = engine.next_run() {
        let (network, equilibrium) = run.unwrap();
        assert_eq!(equilibrium, Equilibrium::StepLimit);
        assert_eq!(network.len(), 11);
        times.push(network.time().to_vec());
    }
    assert_eq!(engine.completed(), 3);
    assert_eq!(engine.remaining(), 0);
    assert_ne!(times[0], times[1]);
    assert_ne!(times[1], times[2]);

    // The last trajectory stays on the network after the engine is done.
    let network = engine.into_network();
    assert_eq!(network.time(), times[2].as_slice());
}

#[test]
fn duration_limit_stops_run() {
    let network = load(
        r#"{
            "state": {"a": [10], "b": [0], "time": [0.0]},
            "propensity": {"0": "0.5 * a", "1": "0.5 * b"},
            "stoichiometry": {"0": {"a": -1, "b": 1}, "1": {"a": 1, "b": -1}},
            "duration_limit": 1.5
        }"#,
    );
    for method in ALL_METHODS {
        let trajectory = run_once(network.clone(), method, 9);
        assert_eq!(trajectory.equilibrium, Equilibrium::Duration);
        let n = trajectory.len();
        assert!(trajectory.time[n - 1] >= 1.5);
        assert!(trajectory.time[n - 2] < 1.5);
    }
}

#[test]
fn death_process_ends_absorbed() {
    let network = load(
        r#"{
            "state": {"a": [5], "time": [0.0]},
            "propensity": {"death": "a"},
            "stoichiometry": {"death": {"a": -1}}
        }"#,
    );
    for method in ALL_METHODS {
        let trajectory = run_once(network.clone(), method, 21);
        assert_eq!(trajectory.equilibrium, Equilibrium::Absorbing);
        assert_eq!(trajectory.len(), 6);
        assert_eq!(trajectory.series("a").unwrap(), &[5.0, 4.0, 3.0, 2.0, 1.0, 0.0]);
    }
}

#[test]
fn hook_stops_run() {
    let mut network = load(
        r#"{
            "state": {"b": [0], "time": [0.0]},
            "propensity": {"birth": "1.0"},
            "stoichiometry": {"birth": {"b": 1}}
        }"#,
    );
    network.add_equilibrium_hook("three", |network: &ReactionNetwork| {
        network.state().get("b").is_some_and(|b| b >= 3.0)
    });
    let trajectory = run_once(network, Method::FirstReaction, 1);
    assert_eq!(trajectory.equilibrium, Equilibrium::Hook("three".into()));
    assert_eq!(trajectory.series("b").unwrap(), &[0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn trajectory_exposes_sojourn_times() {
    let trajectory = run_once(load(EXCHANGE), Method::Direct, 3);
    let sojourn = trajectory.get("sojourn").unwrap();
    assert_eq!(sojourn.len(), trajectory.len());
    assert_eq!(sojourn[0], 0.0);
    assert!(sojourn[1..].iter().all(|&s| s > 0.0));
    let total: f64 = sojourn.iter().sum();
    assert!((total - trajectory.time[10]).abs() < 1e-9);
    assert_eq!(trajectory.get("time").unwrap(), trajectory.time);
    assert!(trajectory.get("missing").is_none());
}

#[test]
fn competing_events_fire_in_proportion_to_propensity() {
    let network = load(
        r#"{
            "state": {"a": [1], "slow": [0], "fast": [0], "time": [0.0]},
            "propensity": {"0": "1.0 * a", "1": "3.0 * a"},
            "stoichiometry": {"0": {"a": -1, "slow": 1}, "1": {"a": -1, "fast": 1}}
        }"#,
    );
    let runs = 4000;
    for method in ALL_METHODS {
        let options = EnsembleOptions {
            method,
            trajectories: runs,
            n_threads: None,
            seed: Some(31),
        };
        let trajectories = run_ensemble(&network, &options).unwrap();
        let fast = trajectories
            .iter()
            .filter(|t| t.series("fast").unwrap()[1] == 1.0)
            .count();
        let share = fast as f64 / runs as f64;
        assert!((share - 0.75).abs() < 0.04, "{method}: share {share}");

        let mean_time: f64 = trajectories.iter().map(|t| t.time[1]).sum::<f64>() / runs as f64;
        assert!((mean_time - 0.25).abs() < 0.02, "{method}: mean {mean_time}");
    }
}

#[test]
fn birth_death_settles_near_stationary_mean() {
    let network = load(
        r#"{
            "state": {"a": [0], "time": [0.0]},
            "propensity": {"birth": "5.0", "death": "0.5 * a"},
            "stoichiometry": {"birth": {"a": 1}, "death": {"a": -1}},
            "duration_limit": 30.0
        }"#,
    );
    let runs = 400;
    for method in ALL_METHODS {
        let options = EnsembleOptions {
            method,
            trajectories: runs,
            n_threads: None,
            seed: Some(8),
        };
        let trajectories = run_ensemble(&network, &options).unwrap();
        let mean = trajectories
            .iter()
            .map(|t| {
                let a = t.series("a").unwrap();
                a[a.len() - 2]
            })
            .sum::<f64>()
            / runs as f64;
        assert!((mean - 10.0).abs() < 0.75, "{method}: mean {mean}");
    }
}

#[test]
fn document_round_trips_through_network() {
    let document = NetworkDocument::from_json_str(EXCHANGE).unwrap();
    let network = document.clone().into_network().unwrap();
    assert_eq!(network.to_document().unwrap(), document);

    // Only the initial entries are written back after a run.
    let mut engine = SimulationEngine::new(network, EngineConfig::default()).unwrap();
    engine.next().unwrap().unwrap();
    assert_eq!(engine.network().len(), 11);
    let written = engine.network().to_document().unwrap();
    assert_eq!(written, document);

    let reparsed = NetworkDocument::from_json_str(&written.to_json_string().unwrap()).unwrap();
    assert_eq!(reparsed, document);
}

#[test]
fn document_accepts_numeric_propensities() {
    let network = load(
        r#"{
            "state": {"a": [0], "time": [0.0]},
            "propensity": {"0": 2.5},
            "stoichiometry": {"0": {"a": 1}}
        }"#,
    );
    let rate = network.propensity_of(&EventId::from("0")).unwrap();
    assert!((rate - 2.5).abs() < 1e-12);
}

#[test]
fn document_rejects_unknown_objects() {
    let result = NetworkDocument::from_json_str(
        r#"{"state": {"a": [1], "time": [0.0]}, "rates": {"0": 1.0}}"#,
    );
    assert!(matches!(result, Err(SimError::UnsupportedObject(msg)) if msg.contains("rates")));
}

#[test]
fn document_rejects_non_numeric_state() {
    let result = NetworkDocument::from_json_str(r#"{"state": {"a": ["ten"], "time": [0.0]}}"#);
    assert!(matches!(result, Err(SimError::Configuration(_))));
}

#[test]
fn document_rejects_malformed_json() {
    assert!(matches!(
        NetworkDocument::from_json_str("{\"state\": "),
        Err(SimError::Json(_))
    ));
}

#[test]
fn native_propensities_cannot_be_written_out() {
    let mut inputs = NetworkInputs::default();
    inputs.state.insert("time".into(), vec![0.0]);
    inputs.state.insert("a".into(), vec![3.0]);
    inputs
        .propensity
        .insert(EventId::from("decay"), Propensity::native(|state| state.get("a").unwrap_or(0.0)));
    inputs
        .stoichiometry
        .insert(EventId::from("decay"), [("a".to_string(), -1)].into_iter().collect());
    let network = ReactionNetwork::from_inputs(inputs).unwrap();

    assert!(matches!(network.to_document(), Err(SimError::Configuration(_))));
    let trajectory = run_once(network, Method::Direct, 5);
    assert_eq!(trajectory.equilibrium, Equilibrium::Absorbing);
    assert_eq!(trajectory.len(), 4);
}
