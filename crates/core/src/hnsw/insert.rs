//! HNSW batch insertion.
//!
//! A batch is appended to the arena first (items plus unconnected nodes with drawn
//! levels), then each new node is connected in id order:
//!
//! 1. Greedy ef=1 descent from the entry point down to the node's level + 1.
//! 2. On each layer from `min(level, entry_level)` down to 0: beam search with
//!    `ef_construction`, select neighbors, connect both directions, prune overflowing
//!    lists, and continue from the closest selected neighbor.
//! 3. Promote the node to entry point if its level exceeds the current one.

use crate::error::{HnswError, Result};
use crate::hnsw::distance::Distance;
use crate::hnsw::graph::{HnswConfig, Topology};
use crate::hnsw::index::{HnswIndex, IndexState};
use crate::hnsw::progress::{CancellationToken, ProgressReporter};
use crate::hnsw::random::RandomSource;
use crate::hnsw::search::{descend, search_layer, TravelingCosts};
use crate::hnsw::select::select_neighbors;
use crate::hnsw::visited::VisitedSet;
use std::ops::Range;
use tracing::{debug, warn};

/// Reusable buffers for one batch.
struct Scratch {
    visited: VisitedSet,
    layer: Vec<(f32, u32)>,
    prune: Vec<(f32, u32)>,
}

impl<D: Distance> HnswIndex<D> {
    /// Inserts a batch of items. Returns the id range assigned to them, in input order.
    pub fn add_items<V: AsRef<[f32]>>(
        &mut self,
        items: &[V],
        rng: &mut dyn RandomSource,
    ) -> Result<Range<u32>> {
        self.add_items_with(items, rng, None, None)
    }

    /// [`Self::add_items`] with progress reporting and cooperative cancellation.
    ///
    /// All vectors are validated before anything is stored. If the token is cancelled
    /// the call returns [`HnswError::Cancelled`] and the index stays in
    /// [`IndexState::Building`]; every later call then fails with
    /// [`HnswError::IncompleteBuild`]. Indexes loaded from storage refuse with
    /// [`HnswError::ReadOnly`].
    pub fn add_items_with<V: AsRef<[f32]>>(
        &mut self,
        items: &[V],
        rng: &mut dyn RandomSource,
        progress: Option<&dyn ProgressReporter>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Range<u32>> {
        if self.read_only {
            return Err(HnswError::ReadOnly);
        }
        self.ensure_usable()?;
        self.core.items().check_dimensions(items)?;
        if items.is_empty() {
            let n = self.len() as u32;
            return Ok(n..n);
        }

        self.state = IndexState::Building;
        let ids = self.core.append(items, rng, &self.config);
        let total = ids.len();
        let mut scratch = Scratch {
            visited: VisitedSet::with_len(self.len()),
            layer: Vec::with_capacity(self.config().ef_construction + 1),
            prune: Vec::with_capacity(self.config().m_max0 + 1),
        };

        for (position, node) in ids.clone().enumerate() {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                warn!(
                    inserted = position,
                    total, "batch insert cancelled, index left incomplete"
                );
                return Err(HnswError::Cancelled);
            }
            self.insert_node(node, &mut scratch);
            if let Some(reporter) = progress {
                reporter.progress(position, total);
            }
        }

        self.state = IndexState::Ready;
        if let Some(cache) = self.core.cache.as_ref() {
            debug!(
                nodes = self.len(),
                hit_rate = cache.hit_rate(),
                lookups = cache.lookups(),
                "distance cache stats"
            );
        }
        debug!(
            added = total,
            nodes = self.len(),
            max_layer = ?self.max_layer(),
            "batch inserted"
        );
        Ok(ids)
    }

    fn insert_node(&mut self, node: u32, scratch: &mut Scratch) {
        let Some(entry) = self.entry_point else {
            self.entry_point = Some(node);
            return;
        };

        let config = &self.config;
        let core = &mut self.core;
        let topology = &mut core.topology;
        let level = topology.layer(node);
        let entry_level = topology.layer(entry);
        let mut costs =
            TravelingCosts::for_node(node, &core.items, &self.distance, core.cache.as_mut());

        // Phase 1: greedy descent through the layers above the node's level
        let (mut best, _) = descend(
            topology,
            entry,
            &mut costs,
            level.min(entry_level),
            &mut scratch.visited,
            &mut scratch.layer,
        );

        // Phase 2: connect on every shared layer
        for layer in (0..=level.min(entry_level)).rev() {
            scratch.layer.clear();
            search_layer(
                topology,
                best,
                &mut costs,
                layer,
                config.ef_construction,
                &mut scratch.visited,
                &mut scratch.layer,
            );
            let selected = select_neighbors(
                &scratch.layer,
                config.capacity(layer),
                layer,
                topology,
                &mut costs,
                config,
            );

            let mut best_dist = costs.from_anchor(best);
            for &(dist, neighbor) in &selected {
                connect(topology, &mut costs, config, node, neighbor, layer, &mut scratch.prune);
                connect(topology, &mut costs, config, neighbor, node, layer, &mut scratch.prune);
                if dist < best_dist {
                    best = neighbor;
                    best_dist = dist;
                }
            }
        }

        // Phase 3: promote
        if level > entry_level {
            self.entry_point = Some(node);
        }
    }
}

/// Adds `to` to `from`'s list on `layer`, re-selecting the list if it overflows.
///
/// Pruning is anchored at `from` and uses the configured selection policy, so the
/// list never exceeds the layer capacity.
fn connect<D: Distance + ?Sized>(
    topology: &mut Topology,
    costs: &mut TravelingCosts<'_, D>,
    config: &HnswConfig,
    from: u32,
    to: u32,
    layer: usize,
    prune: &mut Vec<(f32, u32)>,
) {
    if from == to {
        return;
    }
    let capacity = config.capacity(layer);
    let list = topology.neighbors_mut(from, layer);
    if list.contains(&to) {
        return;
    }
    list.push(to);
    if list.len() <= capacity {
        return;
    }

    let current = std::mem::take(list);
    let mut from_costs = costs.anchored_at(from);
    prune.clear();
    prune.extend(current.iter().map(|&id| (from_costs.from_anchor(id), id)));
    let kept = select_neighbors(prune.as_slice(), capacity, layer, topology, &mut from_costs, config);
    let list = topology.neighbors_mut(from, layer);
    list.extend(kept.into_iter().map(|(_, id)| id));
}
