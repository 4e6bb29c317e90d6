//! Gillespie stochastic simulation of reaction networks.
//!
//! A [`ReactionNetwork`] holds species time series and a set of events,
//! each with a propensity and a stoichiometry. A [`SimulationEngine`] pulls
//! exact sample trajectories from it with one of the [`Method`]s until an
//! [`Equilibrium`] condition stops the run.
//!
//! ```
//! use gillespie::{EngineConfig, Method, NetworkDocument, SimulationEngine};
//!
//! let document = NetworkDocument::from_json_str(r#"{
//!     "state": {"a": [10], "b": [0], "time": [0.0]},
//!     "propensity": {"0": "0.5 * a", "1": "0.5 * b"},
//!     "stoichiometry": {"0": {"a": -1, "b": 1}, "1": {"a": 1, "b": -1}},
//!     "step_limit": 10
//! }"#).unwrap();
//! let network = document.into_network().unwrap();
//! let config = EngineConfig { method: Method::Direct, trajectories: 1, seed: Some(2) };
//! for trajectory in SimulationEngine::new(network, config).unwrap() {
//!     let trajectory = trajectory.unwrap();
//!     assert_eq!(trajectory.len(), 11);
//! }
//! ```

mod dependency;
mod engine;
mod ensemble;
mod equilibrium;
mod error;
mod loader;
mod method;
mod network;
mod propensity;
#[cfg(feature = "python")]
mod python;

pub use dependency::DependencyGraph;
pub use engine::{DEFAULT_SEED, EngineConfig, SimulationEngine, Trajectory};
pub use ensemble::{EnsembleOptions, derive_seed, run_ensemble};
pub use equilibrium::{Equilibrium, EquilibriumHook, Limits};
pub use error::{Result, SimError};
pub use loader::{NetworkDocument, OBJECT_KINDS};
pub use method::Method;
pub use network::{EventId, NetworkInputs, ReactionNetwork, Stoichiometry};
pub use propensity::{
    Propensity, PropensityExpression, SOJOURN_SERIES, StateView, TIME_SERIES, ZERO_PROPENSITY,
    is_species_identifier,
};
