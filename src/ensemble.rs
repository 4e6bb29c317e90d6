use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::info;

use crate::engine::{DEFAULT_SEED, EngineConfig, SimulationEngine, Trajectory};
use crate::error::{Result, SimError};
use crate::method::Method;
use crate::network::ReactionNetwork;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnsembleOptions {
    pub method: Method,
    pub trajectories: usize,
    pub n_threads: Option<usize>,
    pub seed: Option<u64>,
}

impl Default for EnsembleOptions {
    fn default() -> Self {
        Self {
            method: Method::Direct,
            trajectories: 1,
            n_threads: None,
            seed: None,
        }
    }
}

/// Runs independent trajectories in parallel, each on its own clone of
/// `network` and its own stream seeded from `(seed, trajectory index)`.
/// Output order and content do not depend on the thread count.
pub fn run_ensemble(network: &ReactionNetwork, options: &EnsembleOptions) -> Result<Vec<Trajectory>> {
    if options.trajectories == 0 {
        return Err(SimError::InvalidArgument(
            "number of trajectories must be greater than zero".into(),
        ));
    }
    options.method.validate()?;
    info!(
        network_id = %network.id(),
        trajectories = options.trajectories,
        method = %options.method,
        "running ensemble"
    );

    let simulate = || -> Result<Vec<Trajectory>> {
        (0..options.trajectories)
            .into_par_iter()
            .map(|traj_idx| {
                let config = EngineConfig {
                    method: options.method,
                    trajectories: 1,
                    seed: Some(derive_seed(options.seed, traj_idx as u64)),
                };
                let mut engine = SimulationEngine::new(network.clone(), config)?;
                engine.next().ok_or_else(|| {
                    SimError::InvalidArgument(format!("trajectory {} was not produced", traj_idx))
                })?
            })
            .collect()
    };

    match options.n_threads {
        Some(n) => ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| SimError::ThreadPool(e.to_string()))?
            .install(simulate),
        None => simulate(),
    }
}

/// Seed for trajectory `trajectory` of an ensemble: the first word of
/// stream `trajectory` of the ChaCha8 generator keyed by `seed`.
pub fn derive_seed(seed: Option<u64>, trajectory: u64) -> u64 {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.unwrap_or(DEFAULT_SEED));
    rng.set_stream(trajectory);
    rng.next_u64()
}
