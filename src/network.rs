use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use crate::dependency::{DependencyGraph, SpeciesDelta};
use crate::equilibrium::{self, Equilibrium, EquilibriumHook, Limits};
use crate::error::{Result, SimError};
use crate::propensity::{
    Propensity, SOJOURN_SERIES, StateView, TIME_SERIES, ZERO_PROPENSITY, is_species_identifier,
};

const NETWORK_ID_LEN: usize = 32;

/// Opaque event identifier. Numeric ids order numerically and come before
/// any non-numeric id; the rest order lexicographically.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for EventId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for EventId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u32> for EventId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl From<usize> for EventId {
    fn from(id: usize) -> Self {
        Self(id.to_string())
    }
}

pub type Stoichiometry = BTreeMap<String, i64>;

#[derive(Clone, Debug, Default)]
pub struct NetworkInputs {
    pub id: Option<String>,
    pub state: BTreeMap<String, Vec<f64>>,
    pub propensity: BTreeMap<EventId, Propensity>,
    pub stoichiometry: BTreeMap<EventId, Stoichiometry>,
    pub duration_limit: Option<f64>,
    pub step_limit: Option<u64>,
}

#[derive(Clone, Debug)]
struct Event {
    id: EventId,
    stoichiometry: Stoichiometry,
    deltas: Vec<SpeciesDelta>,
    propensity: Propensity,
}

/// Parts of a network that never change after construction.
#[derive(Debug)]
struct Topology {
    species: Vec<String>,
    species_index: HashMap<String, usize>,
    events: Vec<Event>,
    event_index: HashMap<EventId, usize>,
    graph: DependencyGraph,
}

/// Reaction network state: species time series, events partitioned into
/// valid and invalid sets, and the dependency graph used to keep that
/// partition current after each step.
///
/// Clones share the immutable topology and own their series, partition
/// and hooks, so each clone can run its own trajectory.
#[derive(Clone)]
pub struct ReactionNetwork {
    id: String,
    topology: Arc<Topology>,
    time: Vec<f64>,
    series: Vec<Vec<f64>>,
    valid: BTreeSet<usize>,
    invalid: BTreeSet<usize>,
    steps: u64,
    limits: Limits,
    hooks: Vec<EquilibriumHook>,
}

fn configuration_error(network_id: &str, message: String) -> SimError {
    error!(network_id, "{}", message);
    SimError::Configuration(message)
}

fn check_series(network_id: &str, name: &str, values: &[f64]) -> Result<()> {
    if values.is_empty() {
        return Err(configuration_error(
            network_id,
            format!("series '{}' must not be empty", name),
        ));
    }
    if values.iter().any(|value| !value.is_finite()) {
        return Err(configuration_error(
            network_id,
            format!("series '{}' must contain finite numbers", name),
        ));
    }
    Ok(())
}

fn random_network_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NETWORK_ID_LEN)
        .map(char::from)
        .collect()
}

impl ReactionNetwork {
    pub fn from_inputs(inputs: NetworkInputs) -> Result<Self> {
        let NetworkInputs {
            id,
            mut state,
            propensity: mut propensities,
            stoichiometry,
            duration_limit,
            step_limit,
        } = inputs;
        let id = id.unwrap_or_else(random_network_id);

        let propensity_ids: BTreeSet<&EventId> = propensities.keys().collect();
        let stoichiometry_ids: BTreeSet<&EventId> = stoichiometry.keys().collect();
        if propensity_ids != stoichiometry_ids {
            return Err(configuration_error(
                &id,
                "propensity and stoichiometry must name the same events".into(),
            ));
        }

        let time = state.remove(TIME_SERIES).ok_or_else(|| {
            configuration_error(&id, "state requires a `time` series".into())
        })?;
        check_series(&id, TIME_SERIES, &time)?;
        if time.windows(2).any(|w| w[1] <= w[0]) {
            return Err(configuration_error(
                &id,
                "time series must be strictly increasing".into(),
            ));
        }

        let mut species = Vec::with_capacity(state.len());
        let mut series = Vec::with_capacity(state.len());
        for (name, values) in state {
            if !is_species_identifier(&name) || name == SOJOURN_SERIES {
                return Err(configuration_error(
                    &id,
                    format!("invalid species identifier '{}'", name),
                ));
            }
            check_series(&id, &name, &values)?;
            if values.len() != time.len() {
                return Err(configuration_error(
                    &id,
                    format!(
                        "series '{}' length {} does not match time length {}",
                        name,
                        values.len(),
                        time.len()
                    ),
                ));
            }
            species.push(name);
            series.push(values);
        }
        let species_index: HashMap<String, usize> = species
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        let duration = duration_limit.unwrap_or(f64::INFINITY);
        if duration.is_nan() || duration < 0.0 {
            return Err(configuration_error(
                &id,
                format!("duration limit {} must be non-negative", duration),
            ));
        }

        let mut events = Vec::with_capacity(stoichiometry.len());
        for (event_id, event_stoichiometry) in stoichiometry {
            let mut deltas = Vec::new();
            for (name, &delta) in &event_stoichiometry {
                if name == TIME_SERIES {
                    return Err(configuration_error(
                        &id,
                        format!("stoichiometry of event {} cannot change `time`", event_id),
                    ));
                }
                let species_idx = *species_index.get(name).ok_or_else(|| {
                    configuration_error(
                        &id,
                        format!(
                            "stoichiometry of event {} refers to unknown species '{}'",
                            event_id, name
                        ),
                    )
                })?;
                if delta != 0 {
                    deltas.push(SpeciesDelta {
                        species: species_idx,
                        delta,
                    });
                }
            }
            let propensity = propensities.remove(&event_id).ok_or_else(|| {
                configuration_error(&id, format!("event {} has no propensity", event_id))
            })?;
            propensity
                .check_identifiers(event_id.as_str(), &species_index)
                .inspect_err(|err| error!(network_id = %id, "{}", err))?;
            events.push(Event {
                id: event_id,
                stoichiometry: event_stoichiometry,
                deltas,
                propensity,
            });
        }

        let deltas: Vec<Vec<SpeciesDelta>> = events.iter().map(|e| e.deltas.clone()).collect();
        let graph = DependencyGraph::build(species.len(), &deltas);
        let event_index = events
            .iter()
            .enumerate()
            .map(|(idx, event)| (event.id.clone(), idx))
            .collect();

        let mut network = Self {
            id,
            topology: Arc::new(Topology {
                species,
                species_index,
                events,
                event_index,
                graph,
            }),
            time,
            series,
            valid: BTreeSet::new(),
            invalid: BTreeSet::new(),
            steps: 0,
            limits: Limits {
                duration,
                steps: step_limit,
            },
            hooks: Vec::new(),
        };
        network.repartition()?;
        debug!(
            network_id = %network.id,
            species = network.topology.species.len(),
            events = network.topology.events.len(),
            valid = network.valid.len(),
            "network constructed"
        );
        Ok(network)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    /// Number of entries in every series.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn current_time(&self) -> f64 {
        self.time[self.time.len() - 1]
    }

    pub fn species_names(&self) -> &[String] {
        &self.topology.species
    }

    pub fn species_series(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.topology
            .species
            .iter()
            .map(String::as_str)
            .zip(self.series.iter().map(Vec::as_slice))
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Full series for `name`. `"sojourn"` is derived from `time` as the
    /// first time followed by successive waiting times.
    pub fn series(&self, name: &str) -> Result<Cow<'_, [f64]>> {
        if name == TIME_SERIES {
            return Ok(Cow::Borrowed(self.time.as_slice()));
        }
        if name == SOJOURN_SERIES {
            let mut sojourn = Vec::with_capacity(self.time.len());
            sojourn.push(self.time[0]);
            sojourn.extend(self.time.windows(2).map(|w| w[1] - w[0]));
            return Ok(Cow::Owned(sojourn));
        }
        match self.topology.species_index.get(name) {
            Some(&idx) => Ok(Cow::Borrowed(self.series[idx].as_slice())),
            None => {
                error!(network_id = %self.id, key = name, "bad or missing series");
                Err(SimError::NotFound(format!("series '{}'", name)))
            }
        }
    }

    pub fn state(&self) -> StateView<'_> {
        StateView::new(
            &self.topology.species_index,
            &self.series,
            self.current_time(),
        )
    }

    pub fn n_events(&self) -> usize {
        self.topology.events.len()
    }

    /// Event ids in enumeration order.
    pub fn event_ids(&self) -> impl Iterator<Item = &EventId> {
        self.topology.events.iter().map(|event| &event.id)
    }

    pub fn valid_events(&self) -> impl Iterator<Item = &EventId> {
        self.valid.iter().map(|&idx| &self.topology.events[idx].id)
    }

    pub fn invalid_events(&self) -> impl Iterator<Item = &EventId> {
        self.invalid.iter().map(|&idx| &self.topology.events[idx].id)
    }

    pub fn is_valid(&self, event: &EventId) -> Result<bool> {
        self.event_index(event).map(|idx| self.valid.contains(&idx))
    }

    pub fn propensity_of(&self, event: &EventId) -> Result<f64> {
        let idx = self.event_index(event)?;
        self.propensity_at(idx)
    }

    pub fn dependents(&self, event: &EventId) -> Result<Vec<&EventId>> {
        let idx = self.event_index(event)?;
        Ok(self
            .topology
            .graph
            .dependents(idx)
            .iter()
            .map(|&dep| &self.topology.events[dep].id)
            .collect())
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.topology.graph
    }

    pub fn add_equilibrium_hook<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&ReactionNetwork) -> bool + Send + Sync + 'static,
    {
        self.hooks.push(EquilibriumHook::new(name, predicate));
    }

    pub fn equilibrium(&self) -> Option<Equilibrium> {
        equilibrium::evaluate(self)
    }

    pub fn is_equilibrium(&self) -> bool {
        self.equilibrium().is_some()
    }

    /// Fires `event`: advances time by `sojourn`, appends one entry to every
    /// species series and re-validates the events that depend on `event`.
    pub fn apply_step(&mut self, event: &EventId, sojourn: f64) -> Result<()> {
        let idx = self.event_index(event)?;
        if !sojourn.is_finite() || sojourn <= 0.0 {
            return Err(SimError::InvalidArgument(format!(
                "sojourn {} must be finite and positive",
                sojourn
            )));
        }
        self.apply_step_at(idx, sojourn)
    }

    /// Truncates every series to its initial entry and rebuilds the
    /// partition against that state.
    pub fn reset(&mut self) -> Result<()> {
        self.time.truncate(1);
        for values in &mut self.series {
            values.truncate(1);
        }
        self.steps = 0;
        self.repartition()
    }

    pub(crate) fn apply_step_at(&mut self, event: usize, sojourn: f64) -> Result<()> {
        let next_time = self.current_time() + sojourn;
        if !(next_time > self.current_time()) || !next_time.is_finite() {
            return Err(SimError::DegenerateState(format!(
                "step of event {} by {} does not advance time {} of network {}",
                self.topology.events[event].id,
                sojourn,
                self.current_time(),
                self.id
            )));
        }
        self.time.push(next_time);
        for values in &mut self.series {
            let last = values[values.len() - 1];
            values.push(last);
        }
        for delta in &self.topology.events[event].deltas {
            let values = &mut self.series[delta.species];
            let last = values.len() - 1;
            values[last] += delta.delta as f64;
        }
        self.steps += 1;
        self.revalidate(event)
    }

    pub(crate) fn event_index(&self, event: &EventId) -> Result<usize> {
        self.topology
            .event_index
            .get(event)
            .copied()
            .ok_or_else(|| SimError::NotFound(format!("event {}", event)))
    }

    pub(crate) fn event_id(&self, event: usize) -> &EventId {
        &self.topology.events[event].id
    }

    pub(crate) fn event_stoichiometry(&self, event: usize) -> &Stoichiometry {
        &self.topology.events[event].stoichiometry
    }

    pub(crate) fn event_propensity(&self, event: usize) -> &Propensity {
        &self.topology.events[event].propensity
    }

    pub(crate) fn valid_indices(&self) -> &BTreeSet<usize> {
        &self.valid
    }

    pub(crate) fn valid_count(&self) -> usize {
        self.valid.len()
    }

    pub(crate) fn hooks(&self) -> &[EquilibriumHook] {
        &self.hooks
    }

    pub(crate) fn dependents_at(&self, event: usize) -> &[usize] {
        self.topology.graph.dependents(event)
    }

    /// Current propensity of `event`. Infinite and NaN values are errors,
    /// never a signal to stop.
    pub(crate) fn propensity_at(&self, event: usize) -> Result<f64> {
        let event = &self.topology.events[event];
        let value = event
            .propensity
            .evaluate(&self.state())
            .and_then(|value| {
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(format!("non-finite propensity {}", value))
                }
            });
        value.map_err(|reason| {
            error!(network_id = %self.id, event = %event.id, steps = self.steps, "{}", reason);
            SimError::Propensity {
                event: event.id.to_string(),
                reason,
            }
        })
    }

    fn repartition(&mut self) -> Result<()> {
        self.valid.clear();
        self.invalid.clear();
        for idx in 0..self.topology.events.len() {
            if self.propensity_at(idx)? > ZERO_PROPENSITY {
                self.valid.insert(idx);
            } else {
                self.invalid.insert(idx);
            }
        }
        Ok(())
    }

    fn revalidate(&mut self, fired: usize) -> Result<()> {
        let topology = Arc::clone(&self.topology);
        for &dep in topology.graph.dependents(fired) {
            let propensity = self.propensity_at(dep)?;
            if propensity > ZERO_PROPENSITY {
                if self.invalid.remove(&dep) {
                    self.valid.insert(dep);
                    debug!(network_id = %self.id, event = %topology.events[dep].id, "event validated");
                }
            } else if self.valid.remove(&dep) {
                self.invalid.insert(dep);
                debug!(network_id = %self.id, event = %topology.events[dep].id, "event invalidated");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ReactionNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionNetwork")
            .field("id", &self.id)
            .field("species", &self.topology.species)
            .field("events", &self.topology.events.len())
            .field("steps", &self.steps)
            .field("limits", &self.limits)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
