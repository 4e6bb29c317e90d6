//! Event-to-event dependency graph.
//!
//! Two events are adjacent when the sets of species they change (non-zero
//! delta) intersect. The relation is symmetric, and an event that changes
//! no species has no neighbours at all, itself included.
//!
//! The graph is built once per network. Events are indexed by the species
//! they touch and each event's neighbours are the union over its species
//! buckets, which yields the same adjacency as comparing every pair of
//! events. Building costs `O(Σ_s |bucket_s|²)` over species buckets plus
//! sorting each neighbour list; in the worst case, every event touching
//! every species, that is `O(E²·S)` like the pairwise comparison.

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SpeciesDelta {
    pub species: usize,
    pub delta: i64,
}

#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub(crate) fn build(n_species: usize, deltas: &[Vec<SpeciesDelta>]) -> Self {
        let mut species_events: Vec<Vec<usize>> = vec![Vec::new(); n_species];
        for (event, event_deltas) in deltas.iter().enumerate() {
            for delta in event_deltas {
                species_events[delta.species].push(event);
            }
        }

        let mut dependents = vec![Vec::new(); deltas.len()];
        let mut visit_markers = vec![0usize; deltas.len()];
        for (event, deps) in dependents.iter_mut().enumerate() {
            let mark = event + 1;
            for delta in &deltas[event] {
                for &other in &species_events[delta.species] {
                    if visit_markers[other] != mark {
                        visit_markers[other] = mark;
                        deps.push(other);
                    }
                }
            }
            deps.sort_unstable();
        }
        Self { dependents }
    }

    /// Events whose validity must be re-checked after `event` fires, ascending.
    pub fn dependents(&self, event: usize) -> &[usize] {
        &self.dependents[event]
    }

    pub fn depends_on(&self, a: usize, b: usize) -> bool {
        self.dependents[a].binary_search(&b).is_ok()
    }

    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}
