//! HNSW search algorithms: single-layer beam search and multi-layer KNN.
//!
//! Distances are measured from an *anchor*: either an existing node (during
//! construction, where pairwise results are memoized) or an external query vector.
//! [`TravelingCosts`] binds the anchor to the item arena, the distance function, and
//! the optional cache, so the traversal code never has to care which case it is in.

use crate::error::{HnswError, Result};
use crate::hnsw::cache::DistanceCache;
use crate::hnsw::distance::Distance;
use crate::hnsw::graph::{ItemStore, Topology};
use crate::hnsw::index::{HnswIndex, Neighbor};
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::collections::BinaryHeap;

thread_local! {
    /// Thread-local VisitedSet pool for queries, reused across searches on the same thread.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::default());
}

/// The point distances are measured from.
#[derive(Debug, Clone, Copy)]
enum Anchor<'q> {
    Node(u32),
    Query(&'q [f32]),
}

/// Distance oracle anchored at a node or a query.
///
/// Node-to-node distances go through the cache when one is attached.
pub struct TravelingCosts<'a, D: ?Sized> {
    anchor: Anchor<'a>,
    items: &'a ItemStore,
    distance: &'a D,
    cache: Option<&'a mut DistanceCache>,
}

impl<'a, D: Distance + ?Sized> TravelingCosts<'a, D> {
    pub fn for_node(
        node: u32,
        items: &'a ItemStore,
        distance: &'a D,
        cache: Option<&'a mut DistanceCache>,
    ) -> Self {
        Self {
            anchor: Anchor::Node(node),
            items,
            distance,
            cache,
        }
    }

    pub fn for_query(query: &'a [f32], items: &'a ItemStore, distance: &'a D) -> Self {
        Self {
            anchor: Anchor::Query(query),
            items,
            distance,
            cache: None,
        }
    }

    /// The anchor's node id, if it is a node.
    pub fn anchor_node(&self) -> Option<u32> {
        match self.anchor {
            Anchor::Node(id) => Some(id),
            Anchor::Query(_) => None,
        }
    }

    /// Distance from the anchor to node `id`.
    #[inline]
    pub fn from_anchor(&mut self, id: u32) -> f32 {
        match self.anchor {
            Anchor::Node(node) => self.between(node, id),
            Anchor::Query(q) => self.distance.distance(q, self.items.get(id)),
        }
    }

    /// Distance between two nodes.
    #[inline]
    pub fn between(&mut self, a: u32, b: u32) -> f32 {
        let items = self.items;
        let distance = self.distance;
        match self.cache.as_deref_mut() {
            Some(cache) => {
                cache.get_or_compute(a, b, || distance.distance(items.get(a), items.get(b)))
            }
            None => distance.distance(items.get(a), items.get(b)),
        }
    }

    /// Same arena, distance, and cache, re-anchored at `node`.
    pub fn anchored_at(&mut self, node: u32) -> TravelingCosts<'_, D> {
        TravelingCosts {
            anchor: Anchor::Node(node),
            items: self.items,
            distance: self.distance,
            cache: self.cache.as_deref_mut(),
        }
    }
}

/// A candidate during search: (negative distance, internal_id).
/// BinaryHeap is a max-heap; we use negative distance for min-heap behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    neg_distance: OrderedFloat<f32>,
    id: u32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.neg_distance
            .cmp(&other.neg_distance)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A result entry: (distance, internal_id). Max-heap by distance for pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    id: u32,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Beam search over a single layer, starting at `entry`.
///
/// Appends up to `ef` `(distance, id)` pairs to `out`, ascending by distance with ties
/// broken by id. Each call opens a new epoch in `visited`, sized to the topology.
/// Returns the number of nodes whose distance was evaluated.
pub fn search_layer<D: Distance + ?Sized>(
    topology: &Topology,
    entry: u32,
    costs: &mut TravelingCosts<'_, D>,
    layer: usize,
    ef: usize,
    visited: &mut VisitedSet,
    out: &mut Vec<(f32, u32)>,
) -> usize {
    let ef = ef.max(1);
    visited.begin(topology.len());
    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef + 1);

    visited.mark(entry);
    let entry_dist = costs.from_anchor(entry);
    let mut evaluated = 1;
    candidates.push(Candidate {
        neg_distance: OrderedFloat(-entry_dist),
        id: entry,
    });
    results.push(ResultEntry {
        distance: OrderedFloat(entry_dist),
        id: entry,
    });
    // Cached worst distance, avoids repeated heap peeks in the hot loop
    let mut worst_dist = entry_dist;

    while let Some(candidate) = candidates.pop() {
        let c_dist = -candidate.neg_distance.0;
        if results.len() >= ef && c_dist > worst_dist {
            break;
        }

        for &neighbor_id in topology.neighbors(candidate.id, layer) {
            if !visited.mark(neighbor_id) {
                continue;
            }
            let dist = costs.from_anchor(neighbor_id);
            evaluated += 1;

            if results.len() < ef || dist < worst_dist {
                candidates.push(Candidate {
                    neg_distance: OrderedFloat(-dist),
                    id: neighbor_id,
                });
                results.push(ResultEntry {
                    distance: OrderedFloat(dist),
                    id: neighbor_id,
                });
                if results.len() > ef {
                    results.pop(); // remove worst
                }
                worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
            }
        }
    }

    out.extend(
        results
            .into_sorted_vec()
            .into_iter()
            .map(|r| (r.distance.0, r.id)),
    );
    evaluated
}

/// Greedy ef=1 descent from `entry` (on its top layer) down to `bottom`, exclusive.
/// Returns the closest node found on layer `bottom + 1` (or `entry` if there is
/// nothing to descend) and the number of distance evaluations spent.
pub(crate) fn descend<D: Distance + ?Sized>(
    topology: &Topology,
    entry: u32,
    costs: &mut TravelingCosts<'_, D>,
    bottom: usize,
    visited: &mut VisitedSet,
    buf: &mut Vec<(f32, u32)>,
) -> (u32, usize) {
    let mut current = entry;
    let mut evaluated = 0;
    let top = topology.layer(entry);
    for layer in ((bottom + 1)..=top).rev() {
        buf.clear();
        evaluated += search_layer(topology, current, costs, layer, 1, visited, buf);
        if let Some(&(_, nearest)) = buf.first() {
            current = nearest;
        }
    }
    (current, evaluated)
}

impl<D: Distance> HnswIndex<D> {
    /// The `k` approximate nearest items to `query`, closest first.
    ///
    /// The layer-0 beam is `max(k, ef_search)`. Returns fewer than `k` results only
    /// when fewer than `k` items are reachable on layer 0.
    pub fn k_nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.k_nearest_with_ef(query, k, self.config().ef_search)
    }

    /// [`Self::k_nearest`] with an explicit layer-0 beam width (raised to `k` if smaller).
    pub fn k_nearest_with_ef(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<Neighbor>> {
        self.ensure_usable()?;
        if query.len() != self.dimension() {
            return Err(HnswError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        let entry_point = match self.entry_point() {
            Some(ep) if k > 0 => ep,
            _ => return Ok(Vec::new()),
        };
        let ef = ef.max(k);
        let core = self.core();

        SEARCH_VISITED.with(|cell| {
            let mut visited = cell.borrow_mut();

            let mut costs = TravelingCosts::for_query(query, core.items(), self.distance());
            let mut buf = Vec::with_capacity(ef + 1);
            let (start, upper) = descend(
                core.topology(),
                entry_point,
                &mut costs,
                0,
                &mut *visited,
                &mut buf,
            );

            buf.clear();
            let bottom =
                search_layer(core.topology(), start, &mut costs, 0, ef, &mut *visited, &mut buf);
            tracing::trace!(evaluated = upper + bottom, k, ef, "query visited nodes");
            buf.truncate(k);
            Ok(buf
                .into_iter()
                .map(|(distance, id)| Neighbor { id, distance })
                .collect())
        })
    }

    /// The `k` nearest items to stored item `id`. The item itself is normally the
    /// first result.
    pub fn k_nearest_to_item(&self, id: u32, k: usize) -> Result<Vec<Neighbor>> {
        let item = self.item(id)?;
        self.k_nearest(item, k)
    }
}
