use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::equilibrium::Equilibrium;
use crate::error::Result;
use crate::method::{Method, Sampler};
use crate::network::ReactionNetwork;
use crate::propensity::{SOJOURN_SERIES, TIME_SERIES};

pub const DEFAULT_SEED: u64 = 0xDEADBEEFCAFEBABE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub method: Method,
    pub trajectories: usize,
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            method: Method::Direct,
            trajectories: 1,
            seed: None,
        }
    }
}

/// Owned copy of one completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    pub network_id: String,
    pub time: Vec<f64>,
    pub species: BTreeMap<String, Vec<f64>>,
    pub equilibrium: Equilibrium,
    pub steps: u64,
}

impl Trajectory {
    pub(crate) fn capture(network: &ReactionNetwork, equilibrium: Equilibrium) -> Self {
        Self {
            network_id: network.id().to_string(),
            time: network.time().to_vec(),
            species: network
                .species_series()
                .map(|(name, values)| (name.to_string(), values.to_vec()))
                .collect(),
            equilibrium,
            steps: network.steps(),
        }
    }

    pub fn series(&self, name: &str) -> Option<&[f64]> {
        if name == TIME_SERIES {
            return Some(&self.time);
        }
        self.species.get(name).map(Vec::as_slice)
    }

    pub fn sojourn(&self) -> Vec<f64> {
        let mut sojourn = Vec::with_capacity(self.time.len());
        sojourn.extend(self.time.first().copied());
        sojourn.extend(self.time.windows(2).map(|w| w[1] - w[0]));
        sojourn
    }

    /// Named series including the derived `"sojourn"`.
    pub fn get(&self, name: &str) -> Option<Vec<f64>> {
        if name == SOJOURN_SERIES {
            return Some(self.sojourn());
        }
        self.series(name).map(<[f64]>::to_vec)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Finite generator of trajectories over one network. Each pull resets the
/// network, runs the configured method until equilibrium, and yields the
/// result. All pulls draw from the same seeded stream, in order.
pub struct SimulationEngine {
    network: ReactionNetwork,
    method: Method,
    sampler: Sampler,
    rng: ChaCha8Rng,
    seed: u64,
    remaining: usize,
    completed: usize,
}

impl SimulationEngine {
    pub fn new(network: ReactionNetwork, config: EngineConfig) -> Result<Self> {
        config.method.validate()?;
        let seed = config.seed.unwrap_or(DEFAULT_SEED);
        info!(network_id = %network.id(), seed, method = %config.method, "seed set");
        Ok(Self {
            network,
            method: config.method,
            sampler: Sampler::new(config.method),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            remaining: config.trajectories,
            completed: 0,
        })
    }

    pub fn network(&self) -> &ReactionNetwork {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut ReactionNetwork {
        &mut self.network
    }

    pub fn into_network(self) -> ReactionNetwork {
        self.network
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Runs the next trajectory and lends the finished network.
    pub fn next_run(&mut self) -> Option<Result<(&ReactionNetwork, Equilibrium)>> {
        match self.advance()? {
            Ok(equilibrium) => Some(Ok((&self.network, equilibrium))),
            Err(err) => Some(Err(err)),
        }
    }

    fn advance(&mut self) -> Option<Result<Equilibrium>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let start = Instant::now();
        let outcome = self.run_to_equilibrium();
        if let Ok(equilibrium) = &outcome {
            self.completed += 1;
            info!(
                network_id = %self.network.id(),
                trajectory = self.completed,
                steps = self.network.steps(),
                %equilibrium,
                elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
                "simulation complete"
            );
        }
        Some(outcome)
    }

    fn run_to_equilibrium(&mut self) -> Result<Equilibrium> {
        self.network.reset()?;
        debug!(network_id = %self.network.id(), method = %self.method, "trajectory started");
        self.sampler.start(&self.network, &mut self.rng)?;
        loop {
            if let Some(equilibrium) = self.network.equilibrium() {
                return Ok(equilibrium);
            }
            let selection = self.sampler.select(&self.network, &mut self.rng)?;
            self.network
                .apply_step_at(selection.event, selection.sojourn)?;
            self.sampler
                .after_step(&self.network, selection.event, &mut self.rng)?;
        }
    }
}

impl Iterator for SimulationEngine {
    type Item = Result<Trajectory>;

    fn next(&mut self) -> Option<Self::Item> {
        let outcome = self.advance()?;
        Some(outcome.map(|equilibrium| Trajectory::capture(&self.network, equilibrium)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
