//! Neighbor selection for connecting and pruning.
//!
//! Candidates arrive as `(distance_to_anchor, id)` pairs. The anchor of the
//! [`TravelingCosts`] is the node whose neighbor list is being chosen.

use crate::hnsw::distance::Distance;
use crate::hnsw::graph::{HnswConfig, NeighbourHeuristic, Topology};
use crate::hnsw::search::TravelingCosts;
use std::collections::HashSet;

/// Chooses at most `count` neighbors from `candidates`, sorted ascending by distance.
///
/// Duplicate ids and the anchor node itself are ignored. Returns exactly
/// `min(count, admissible candidates)` entries.
pub fn select_neighbors<D: Distance + ?Sized>(
    candidates: &[(f32, u32)],
    count: usize,
    layer: usize,
    topology: &Topology,
    costs: &mut TravelingCosts<'_, D>,
    config: &HnswConfig,
) -> Vec<(f32, u32)> {
    let pool = sorted_pool(candidates, costs.anchor_node());
    match config.neighbour_heuristic {
        NeighbourHeuristic::Simple => select_simple(pool, count),
        NeighbourHeuristic::Heuristic => select_heuristic(
            pool,
            count,
            layer,
            topology,
            costs,
            config.expand_best_selection,
            config.keep_pruned_connections,
        ),
    }
}

fn by_distance(a: &(f32, u32), b: &(f32, u32)) -> std::cmp::Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1))
}

fn sorted_pool(candidates: &[(f32, u32)], exclude: Option<u32>) -> Vec<(f32, u32)> {
    let mut pool: Vec<(f32, u32)> = candidates
        .iter()
        .copied()
        .filter(|&(_, id)| Some(id) != exclude)
        .collect();
    pool.sort_unstable_by(by_distance);
    let mut seen = HashSet::with_capacity(pool.len());
    pool.retain(|&(_, id)| seen.insert(id));
    pool
}

fn select_simple(mut pool: Vec<(f32, u32)>, count: usize) -> Vec<(f32, u32)> {
    pool.truncate(count);
    pool
}

/// Diversity heuristic (HNSW paper, Algorithm 4).
///
/// A candidate `c` is admitted iff `d(c, target) < d(c, s)` for every already admitted
/// `s`. With `expand`, the candidates' own neighbors on `layer` form a secondary pool
/// that is considered after the primary one. With `keep_pruned`, rejected candidates
/// backfill the result closest-first until `count` is reached.
fn select_heuristic<D: Distance + ?Sized>(
    pool: Vec<(f32, u32)>,
    count: usize,
    layer: usize,
    topology: &Topology,
    costs: &mut TravelingCosts<'_, D>,
    expand: bool,
    keep_pruned: bool,
) -> Vec<(f32, u32)> {
    if count == 0 {
        return Vec::new();
    }

    let mut secondary = Vec::new();
    if expand {
        let mut seen: HashSet<u32> = pool.iter().map(|&(_, id)| id).collect();
        if let Some(target) = costs.anchor_node() {
            seen.insert(target);
        }
        for &(_, c) in &pool {
            for &n in topology.neighbors(c, layer) {
                if seen.insert(n) {
                    secondary.push((costs.from_anchor(n), n));
                }
            }
        }
        secondary.sort_unstable_by(by_distance);
    }

    let mut admitted: Vec<(f32, u32)> = Vec::with_capacity(count);
    let mut discarded: Vec<(f32, u32)> = Vec::new();

    for &(d, c) in pool.iter().chain(secondary.iter()) {
        if admitted.len() >= count {
            break;
        }
        let diverse = admitted.iter().all(|&(_, s)| d < costs.between(c, s));
        if diverse {
            admitted.push((d, c));
        } else if keep_pruned {
            discarded.push((d, c));
        }
    }

    if keep_pruned && admitted.len() < count {
        discarded.sort_unstable_by(by_distance);
        let missing = count - admitted.len();
        admitted.extend(discarded.into_iter().take(missing));
        admitted.sort_unstable_by(by_distance);
    }
    admitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::distance::DistanceMetric;
    use crate::hnsw::graph::ItemStore;

    /// Target node 0 at the origin, a tight cluster to the right, one point to the left.
    fn fixture() -> ItemStore {
        let mut items = ItemStore::new(2);
        for p in [
            [0.0f32, 0.0], // 0: target
            [1.0, 0.0],    // 1
            [1.1, 0.0],    // 2: behind 1
            [1.2, 0.1],    // 3: behind 1
            [-2.0, 0.0],   // 4: other side
        ] {
            items.push(&p);
        }
        items
    }

    fn candidates(items: &ItemStore, ids: &[u32]) -> Vec<(f32, u32)> {
        let metric = DistanceMetric::Euclidean;
        ids.iter()
            .map(|&id| (metric.distance(items.get(0), items.get(id)), id))
            .collect()
    }

    fn config(heuristic: NeighbourHeuristic, expand: bool, keep_pruned: bool) -> HnswConfig {
        HnswConfig {
            neighbour_heuristic: heuristic,
            expand_best_selection: expand,
            keep_pruned_connections: keep_pruned,
            ..HnswConfig::new(4, 10)
        }
    }

    fn ids(selected: &[(f32, u32)]) -> Vec<u32> {
        selected.iter().map(|&(_, id)| id).collect()
    }

    #[test]
    fn test_simple_takes_closest() {
        let items = fixture();
        let metric = DistanceMetric::Euclidean;
        let topo = Topology::default();
        let mut costs = TravelingCosts::for_node(0, &items, &metric, None);
        let cands = candidates(&items, &[4, 3, 1, 2]);
        let cfg = config(NeighbourHeuristic::Simple, false, false);
        let sel = select_neighbors(&cands, 3, 0, &topo, &mut costs, &cfg);
        assert_eq!(ids(&sel), vec![1, 2, 3]);
    }

    #[test]
    fn test_heuristic_prefers_diverse_directions() {
        let items = fixture();
        let metric = DistanceMetric::Euclidean;
        let topo = Topology::default();
        let mut costs = TravelingCosts::for_node(0, &items, &metric, None);
        let cands = candidates(&items, &[1, 2, 3, 4]);
        let cfg = config(NeighbourHeuristic::Heuristic, false, false);
        let sel = select_neighbors(&cands, 3, 0, &topo, &mut costs, &cfg);
        assert_eq!(ids(&sel), vec![1, 4]);
    }

    #[test]
    fn test_keep_pruned_backfills_to_count() {
        let items = fixture();
        let metric = DistanceMetric::Euclidean;
        let topo = Topology::default();
        let mut costs = TravelingCosts::for_node(0, &items, &metric, None);
        let cands = candidates(&items, &[1, 2, 3, 4]);
        let cfg = config(NeighbourHeuristic::Heuristic, false, true);
        let sel = select_neighbors(&cands, 3, 0, &topo, &mut costs, &cfg);
        assert_eq!(ids(&sel), vec![1, 2, 4]);
    }

    #[test]
    fn test_expand_considers_neighbors_of_candidates() {
        let items = fixture();
        let metric = DistanceMetric::Euclidean;
        let mut topo = Topology::default();
        for _ in 0..5 {
            topo.push_node(0);
        }
        // only node 1 is a candidate, but it knows about 4
        topo.neighbors_mut(1, 0).push(4);
        let mut costs = TravelingCosts::for_node(0, &items, &metric, None);
        let cands = candidates(&items, &[1]);

        let cfg = config(NeighbourHeuristic::Heuristic, false, false);
        let sel = select_neighbors(&cands, 2, 0, &topo, &mut costs, &cfg);
        assert_eq!(ids(&sel), vec![1]);

        let cfg = config(NeighbourHeuristic::Heuristic, true, false);
        let sel = select_neighbors(&cands, 2, 0, &topo, &mut costs, &cfg);
        assert_eq!(ids(&sel), vec![1, 4]);
    }

    #[test]
    fn test_duplicates_and_self_are_ignored() {
        let items = fixture();
        let metric = DistanceMetric::Euclidean;
        let topo = Topology::default();
        let mut costs = TravelingCosts::for_node(0, &items, &metric, None);
        let mut cands = candidates(&items, &[1, 1, 0, 2]);
        cands.push(cands[0]);
        let cfg = config(NeighbourHeuristic::Simple, false, false);
        let sel = select_neighbors(&cands, 10, 0, &topo, &mut costs, &cfg);
        assert_eq!(ids(&sel), vec![1, 2]);
    }

    #[test]
    fn test_zero_count_selects_nothing() {
        let items = fixture();
        let metric = DistanceMetric::Euclidean;
        let topo = Topology::default();
        let mut costs = TravelingCosts::for_node(0, &items, &metric, None);
        let cands = candidates(&items, &[1, 2]);
        for heuristic in [NeighbourHeuristic::Simple, NeighbourHeuristic::Heuristic] {
            let cfg = config(heuristic, true, true);
            assert!(select_neighbors(&cands, 0, 0, &topo, &mut costs, &cfg).is_empty());
        }
    }
}
