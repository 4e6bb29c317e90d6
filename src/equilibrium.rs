use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::network::ReactionNetwork;

/// Why a trajectory stopped. Reaching any of these is a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Equilibrium {
    Duration,
    StepLimit,
    Absorbing,
    Hook(String),
}

impl fmt::Display for Equilibrium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duration => f.write_str("duration"),
            Self::StepLimit => f.write_str("steps"),
            Self::Absorbing => f.write_str("absorbing"),
            Self::Hook(name) => write!(f, "hook '{}'", name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Limits {
    pub duration: f64,
    pub steps: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            duration: f64::INFINITY,
            steps: None,
        }
    }
}

pub type HookFn = dyn Fn(&ReactionNetwork) -> bool + Send + Sync;

#[derive(Clone)]
pub struct EquilibriumHook {
    name: String,
    predicate: Arc<HookFn>,
}

impl EquilibriumHook {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&ReactionNetwork) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for EquilibriumHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EquilibriumHook")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered termination checks; the first one that holds wins.
pub(crate) fn evaluate(network: &ReactionNetwork) -> Option<Equilibrium> {
    let limits = network.limits();
    if network.current_time() >= limits.duration {
        info!(network_id = %network.id(), duration = limits.duration, "exit on duration");
        return Some(Equilibrium::Duration);
    }
    if limits.steps == Some(network.steps()) {
        info!(network_id = %network.id(), steps = network.steps(), "exit on steps");
        return Some(Equilibrium::StepLimit);
    }
    if network.valid_count() == 0 {
        debug!(network_id = %network.id(), "exit on absorbing state");
        return Some(Equilibrium::Absorbing);
    }
    for hook in network.hooks() {
        if (hook.predicate)(network) {
            info!(network_id = %network.id(), hook = %hook.name, "exit on hook");
            return Some(Equilibrium::Hook(hook.name.clone()));
        }
    }
    None
}
