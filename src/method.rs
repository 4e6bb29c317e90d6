//! Event selection algorithms.
//!
//! Every algorithm answers the same question, "which valid event fires
//! next, and after how long", and consumes the random stream in a fixed
//! order so that a seed pins the whole trajectory:
//!
//! - Direct: two draws per step.
//! - First-reaction: one draw per valid event per step.
//! - Next-reaction: one draw per valid event at trajectory start, then one
//!   per fired event and per newly enabled dependent.
//! - Family-partitioned: one draw per non-empty family plus one.

use rand::Rng;
use rand::distributions::{Distribution, Open01};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SimError};
use crate::network::ReactionNetwork;
use crate::propensity::ZERO_PROPENSITY;

const DEFAULT_FAMILIES: usize = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Direct,
    FirstReaction,
    NextReaction,
    FamilyPartitioned {
        families: usize,
    },
}

impl Method {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::FamilyPartitioned { families: 0 } => Err(SimError::InvalidArgument(
                "family-partitioned method requires at least one family".into(),
            )),
            _ => Ok(()),
        }
    }
}

impl FromStr for Method {
    type Err = SimError;

    fn from_str(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "direct" => Ok(Self::Direct),
            "first-reaction" => Ok(Self::FirstReaction),
            "next-reaction" => Ok(Self::NextReaction),
            "family" | "first-family" | "family-partitioned" => Ok(Self::FamilyPartitioned {
                families: DEFAULT_FAMILIES,
            }),
            _ => Err(SimError::InvalidArgument(format!(
                "unrecognized method '{}'",
                name
            ))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::FirstReaction => f.write_str("first-reaction"),
            Self::NextReaction => f.write_str("next-reaction"),
            Self::FamilyPartitioned { families } => write!(f, "family-partitioned({})", families),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Selection {
    pub event: usize,
    pub sojourn: f64,
}

#[inline]
fn waiting_time<R: Rng + ?Sized>(rng: &mut R, rate: f64) -> f64 {
    let u: f64 = Open01.sample(rng);
    -u.ln() / rate
}

fn degenerate(network: &ReactionNetwork, total: f64) -> SimError {
    SimError::DegenerateState(format!(
        "total propensity {} of network {} at step {} is not positive",
        total,
        network.id(),
        network.steps()
    ))
}

fn valid_weights(network: &ReactionNetwork) -> Result<(Vec<(usize, f64)>, f64)> {
    let mut weights = Vec::with_capacity(network.valid_count());
    let mut total = 0.0;
    for &idx in network.valid_indices() {
        let propensity = network.propensity_at(idx)?;
        total += propensity;
        weights.push((idx, propensity));
    }
    Ok((weights, total))
}

/// First entry whose running sum reaches `target`. Rounding can leave the
/// sum just short of the total; the last positive entry is the fallback.
pub(crate) fn select_cumulative(weights: &[(usize, f64)], target: f64) -> usize {
    let mut cumulative = 0.0;
    let mut fallback = weights[0].0;
    for &(idx, weight) in weights {
        cumulative += weight;
        if weight > 0.0 {
            fallback = idx;
            if cumulative >= target {
                return idx;
            }
        }
    }
    fallback
}

pub(crate) fn direct<R: Rng + ?Sized>(network: &ReactionNetwork, rng: &mut R) -> Result<Selection> {
    let (weights, total) = valid_weights(network)?;
    if !(total > 0.0) {
        return Err(degenerate(network, total));
    }
    let sojourn = waiting_time(rng, total);
    let u: f64 = Open01.sample(rng);
    let event = select_cumulative(&weights, u * total);
    Ok(Selection { event, sojourn })
}

pub(crate) fn first_reaction<R: Rng + ?Sized>(
    network: &ReactionNetwork,
    rng: &mut R,
) -> Result<Selection> {
    let mut best: Option<Selection> = None;
    for &idx in network.valid_indices() {
        let propensity = network.propensity_at(idx)?;
        let u: f64 = Open01.sample(rng);
        let sojourn = if propensity > 0.0 {
            -u.ln() / propensity
        } else {
            f64::INFINITY
        };
        let better = match best {
            Some(current) => sojourn < current.sojourn,
            None => sojourn.is_finite(),
        };
        if better {
            best = Some(Selection {
                event: idx,
                sojourn,
            });
        }
    }
    best.ok_or_else(|| degenerate(network, 0.0))
}

/// Splits `len` items into `families` contiguous ranges of `len / families`,
/// the last range taking the remainder.
pub(crate) fn family_ranges(len: usize, families: usize) -> Vec<std::ops::Range<usize>> {
    let size = len / families;
    (0..families)
        .map(|family| {
            let start = family * size;
            let end = if family + 1 == families {
                len
            } else {
                start + size
            };
            start..end
        })
        .collect()
}

pub(crate) fn family_partitioned<R: Rng + ?Sized>(
    network: &ReactionNetwork,
    families: usize,
    rng: &mut R,
) -> Result<Selection> {
    let (weights, total) = valid_weights(network)?;
    if !(total > 0.0) {
        return Err(degenerate(network, total));
    }
    let mut winner: Option<(std::ops::Range<usize>, f64, f64)> = None;
    for range in family_ranges(weights.len(), families) {
        if range.is_empty() {
            continue;
        }
        let aggregate: f64 = weights[range.clone()].iter().map(|&(_, w)| w).sum();
        if !(aggregate > 0.0) {
            continue;
        }
        let sojourn = waiting_time(rng, aggregate);
        if winner.as_ref().is_none_or(|(_, _, best)| sojourn < *best) {
            winner = Some((range, aggregate, sojourn));
        }
    }
    let (range, aggregate, sojourn) = winner.ok_or_else(|| degenerate(network, total))?;
    let u: f64 = Open01.sample(rng);
    let event = select_cumulative(&weights[range], u * aggregate);
    Ok(Selection { event, sojourn })
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Scheduled {
    time: f64,
    event: usize,
}

impl Eq for Scheduled {}

// Reversed so that `BinaryHeap` pops the earliest time, then the lowest event.
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.event.cmp(&self.event))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Absolute firing times for the next-reaction method. Stale heap entries
/// are dropped lazily when they surface.
#[derive(Clone, Debug, Default)]
pub(crate) struct NextReactionSchedule {
    times: Vec<f64>,
    propensities: Vec<f64>,
    queue: BinaryHeap<Scheduled>,
}

impl NextReactionSchedule {
    fn schedule(&mut self, event: usize, time: f64) {
        self.times[event] = time;
        if time.is_finite() {
            self.queue.push(Scheduled { time, event });
        }
    }

    fn start<R: Rng + ?Sized>(&mut self, network: &ReactionNetwork, rng: &mut R) -> Result<()> {
        let n_events = network.n_events();
        self.times.clear();
        self.times.resize(n_events, f64::INFINITY);
        self.propensities.clear();
        self.propensities.resize(n_events, 0.0);
        self.queue.clear();
        let now = network.current_time();
        for &idx in network.valid_indices() {
            let propensity = network.propensity_at(idx)?;
            self.propensities[idx] = propensity;
            if propensity > ZERO_PROPENSITY {
                self.schedule(idx, now + waiting_time(rng, propensity));
            }
        }
        Ok(())
    }

    fn select(&mut self, network: &ReactionNetwork) -> Result<Selection> {
        let now = network.current_time();
        while let Some(&top) = self.queue.peek() {
            if top.time == self.times[top.event] {
                return Ok(Selection {
                    event: top.event,
                    sojourn: top.time - now,
                });
            }
            self.queue.pop();
        }
        Err(degenerate(network, 0.0))
    }

    fn after_step<R: Rng + ?Sized>(
        &mut self,
        network: &ReactionNetwork,
        fired: usize,
        rng: &mut R,
    ) -> Result<()> {
        let now = network.current_time();
        let dependents = network.dependents_at(fired);
        for &dep in dependents {
            let propensity = network.propensity_at(dep)?;
            let previous = self.propensities[dep];
            let time = if propensity <= ZERO_PROPENSITY {
                f64::INFINITY
            } else if dep != fired && previous > ZERO_PROPENSITY && self.times[dep].is_finite() {
                (self.times[dep] - now) * (previous / propensity) + now
            } else {
                now + waiting_time(rng, propensity)
            };
            self.propensities[dep] = propensity;
            self.schedule(dep, time);
        }
        if dependents.binary_search(&fired).is_err() {
            let propensity = self.propensities[fired];
            let time = if propensity > ZERO_PROPENSITY {
                now + waiting_time(rng, propensity)
            } else {
                f64::INFINITY
            };
            self.schedule(fired, time);
        }
        Ok(())
    }
}

/// Per-trajectory runtime for a [`Method`].
#[derive(Clone, Debug)]
pub(crate) enum Sampler {
    Direct,
    FirstReaction,
    NextReaction(NextReactionSchedule),
    FamilyPartitioned { families: usize },
}

impl Sampler {
    pub(crate) fn new(method: Method) -> Self {
        match method {
            Method::Direct => Self::Direct,
            Method::FirstReaction => Self::FirstReaction,
            Method::NextReaction => Self::NextReaction(NextReactionSchedule::default()),
            Method::FamilyPartitioned { families } => Self::FamilyPartitioned { families },
        }
    }

    pub(crate) fn start<R: Rng + ?Sized>(
        &mut self,
        network: &ReactionNetwork,
        rng: &mut R,
    ) -> Result<()> {
        match self {
            Self::NextReaction(schedule) => schedule.start(network, rng),
            _ => Ok(()),
        }
    }

    pub(crate) fn select<R: Rng + ?Sized>(
        &mut self,
        network: &ReactionNetwork,
        rng: &mut R,
    ) -> Result<Selection> {
        match self {
            Self::Direct => direct(network, rng),
            Self::FirstReaction => first_reaction(network, rng),
            Self::NextReaction(schedule) => schedule.select(network),
            Self::FamilyPartitioned { families } => family_partitioned(network, *families, rng),
        }
    }

    pub(crate) fn after_step<R: Rng + ?Sized>(
        &mut self,
        network: &ReactionNetwork,
        fired: usize,
        rng: &mut R,
    ) -> Result<()> {
        match self {
            Self::NextReaction(schedule) => schedule.after_step(network, fired, rng),
            _ => Ok(()),
        }
    }
}
