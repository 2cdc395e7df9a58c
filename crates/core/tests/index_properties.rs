use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallworld_core::hnsw::DistanceCacheKind;
use smallworld_core::vector_ops::{almost_equal, normalized};
use smallworld_core::{
    Distance, DistanceMetric, HnswConfig, HnswError, HnswIndex, IndexState, NeighbourHeuristic,
    SeededRandom,
};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn unit_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let v: Vec<f32> = (0..dim).map(|_| rng.gen::<f32>()).collect();
            normalized(&v)
        })
        .collect()
}

fn build(items: &[Vec<f32>], config: HnswConfig, seed: u64) -> HnswIndex {
    let mut index = HnswIndex::new(items[0].len(), DistanceMetric::CosineUnit, config)
        .expect("valid config");
    index
        .add_items(items, &mut SeededRandom::from_seed(seed))
        .expect("build");
    index
}

fn exact_top_k(items: &[Vec<f32>], query: &[f32], k: usize) -> Vec<u32> {
    let mut scored: Vec<(f32, u32)> = items
        .iter()
        .enumerate()
        .map(|(i, v)| (DistanceMetric::CosineUnit.distance(query, v), i as u32))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    scored.into_iter().take(k).map(|(_, id)| id).collect()
}

fn recall(index: &HnswIndex, items: &[Vec<f32>], queries: &[u32], k: usize, ef: usize) -> f64 {
    let mut total = 0.0;
    for &q in queries {
        let query = &items[q as usize];
        let truth: HashSet<u32> = exact_top_k(items, query, k).into_iter().collect();
        let found = index.k_nearest_with_ef(query, k, ef).expect("query");
        let hits = found.iter().filter(|n| truth.contains(&n.id)).count();
        total += hits as f64 / k as f64;
    }
    total / queries.len() as f64
}

#[test]
fn test_concrete_scenario_200_by_16() {
    let items = unit_vectors(200, 16, 42);
    let index = build(&items, HnswConfig::new(8, 40), 42);

    let result = index.k_nearest_to_item(0, 10).expect("query");
    assert_eq!(result.len(), 10);
    assert_eq!(result[0].id, 0);
    let score = index.distance().similarity(result[0].distance);
    assert!(
        almost_equal(score as f64, 1.0, 1e-5),
        "self similarity should be 1.0, got {score}"
    );

    let queries: Vec<u32> = (0..20).collect();
    let r = recall(&index, &items, &queries, 10, 10);
    assert!(r >= 0.9, "recall@10 = {r}");
}

#[test]
fn test_results_sorted_and_bounded() {
    let items = unit_vectors(150, 8, 1);
    let index = build(&items, HnswConfig::new(6, 32), 1);
    let query = normalized(&[0.3, 0.1, 0.9, 0.2, 0.4, 0.4, 0.8, 0.0]);
    for k in [1, 5, 20, 400] {
        let found = index.k_nearest(&query, k).expect("query");
        if k <= 20 {
            assert_eq!(found.len(), k);
        } else {
            assert!(found.len() <= items.len());
        }
        for pair in found.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        let distinct: HashSet<u32> = found.iter().map(|n| n.id).collect();
        assert_eq!(distinct.len(), found.len());
    }
}

/// With the default beam (`ef = k`), a k=1 query is a greedy walk on layer 0 and can
/// stop at a local minimum next to the item. Wider `k` or an explicit beam closes the gap.
#[test]
fn test_every_item_finds_itself() {
    let items = unit_vectors(200, 16, 42);
    let index = build(&items, HnswConfig::new(8, 40), 42);
    assert_eq!(index.config().ef_search, 0);

    let misses = |k: usize| {
        (0..items.len() as u32)
            .filter(|&id| {
                let found = index.k_nearest_to_item(id, k).expect("query");
                !found.iter().any(|n| n.id == id)
            })
            .count()
    };
    let greedy = misses(1);
    let wide = misses(10);
    assert!(greedy <= items.len() / 10, "{greedy} items missed themselves at k=1");
    assert!(wide <= 2, "{wide} items missed themselves at k=10");

    for id in 0..items.len() as u32 {
        let found = index.k_nearest_with_ef(&items[id as usize], 1, 64).expect("query");
        assert_eq!(found[0].id, id, "item {id} not its own nearest neighbor at ef=64");
    }
}

#[test]
fn test_graph_invariants_for_every_policy() {
    let items = unit_vectors(250, 10, 3);
    for heuristic in [NeighbourHeuristic::Simple, NeighbourHeuristic::Heuristic] {
        for expand in [false, true] {
            for keep_pruned in [false, true] {
                let config = HnswConfig {
                    neighbour_heuristic: heuristic,
                    expand_best_selection: expand,
                    keep_pruned_connections: keep_pruned,
                    ..HnswConfig::new(5, 24)
                };
                let index = build(&items, config.clone(), 3);
                let ep = index.entry_point().expect("entry point");
                let max_layer = index.max_layer().expect("max layer");
                for id in 0..index.len() as u32 {
                    let top = index.node_layer(id).expect("node");
                    assert!(top <= max_layer);
                    for layer in 0..=top {
                        let list = index.neighbors(id, layer).expect("node");
                        assert!(
                            list.len() <= config.capacity(layer),
                            "{heuristic:?}/{expand}/{keep_pruned}: node {id} layer {layer} has {}",
                            list.len()
                        );
                        let distinct: HashSet<&u32> = list.iter().collect();
                        assert_eq!(distinct.len(), list.len());
                        assert!(!list.contains(&id));
                        for &n in list {
                            assert!(index.node_layer(n).expect("neighbor") >= layer);
                        }
                    }
                }
                assert_eq!(index.node_layer(ep).expect("entry"), max_layer);
                assert!(recall(&index, &items, &[0, 10, 20, 30], 5, 50) > 0.5);
            }
        }
    }
}

#[test]
fn test_cache_strategy_does_not_change_graph() {
    let items = unit_vectors(180, 8, 5);
    let base = HnswConfig::new(6, 30);
    let dense = build(
        &items,
        HnswConfig {
            distance_cache: DistanceCacheKind::Dense,
            ..base.clone()
        },
        5,
    );
    let hashed = build(
        &items,
        HnswConfig {
            distance_cache: DistanceCacheKind::Hashed,
            initial_distance_cache_size: 4,
            ..base.clone()
        },
        5,
    );
    let uncached = build(
        &items,
        HnswConfig {
            enable_distance_cache: false,
            ..base
        },
        5,
    );
    assert_eq!(dense.core().topology(), hashed.core().topology());
    assert_eq!(dense.core().topology(), uncached.core().topology());
    assert!(dense.distance_cache_hit_rate().expect("cache") > 0.0);
    assert!(uncached.distance_cache_hit_rate().is_none());
}

#[test]
fn test_incremental_batches() {
    let items = unit_vectors(120, 8, 6);
    let mut index =
        HnswIndex::new(8, DistanceMetric::CosineUnit, HnswConfig::new(6, 40)).expect("config");
    let mut rng = SeededRandom::from_seed(6);
    assert_eq!(index.add_items(&items[..50], &mut rng).expect("batch"), 0..50);
    assert_eq!(index.add_items(&items[50..], &mut rng).expect("batch"), 50..120);
    assert_eq!(index.len(), 120);
    assert_eq!(index.state(), IndexState::Ready);
    let r = recall(&index, &items, &[0, 60, 119], 5, 40);
    assert!(r >= 0.8, "recall after incremental build = {r}");
}

#[test]
fn test_recall_grows_with_construction_and_query_beam() {
    let items = unit_vectors(400, 16, 21);
    let queries: Vec<u32> = (0..40).map(|i| i * 10).collect();
    let seeds = [1u64, 2, 3, 4];

    let mut by_construction = Vec::new();
    for ef_construction in [8, 32, 128] {
        let mean: f64 = seeds
            .iter()
            .map(|&s| {
                let index = build(&items, HnswConfig::new(4, ef_construction), s);
                recall(&index, &items, &queries, 10, 10)
            })
            .sum::<f64>()
            / seeds.len() as f64;
        by_construction.push(mean);
    }
    for pair in by_construction.windows(2) {
        assert!(pair[1] + 0.03 >= pair[0], "{by_construction:?}");
    }

    let index = build(&items, HnswConfig::new(4, 32), 7);
    let by_beam: Vec<f64> = [10, 20, 40, 80]
        .iter()
        .map(|&ef| recall(&index, &items, &queries, 10, ef))
        .collect();
    for pair in by_beam.windows(2) {
        assert!(pair[1] + 0.02 >= pair[0], "{by_beam:?}");
    }
}

#[test]
fn test_empty_graph_queries() {
    let index =
        HnswIndex::new(4, DistanceMetric::Cosine, HnswConfig::default()).expect("config");
    for k in [0, 1, 10, 1000] {
        assert!(index.k_nearest(&[0.1, 0.2, 0.3, 0.4], k).expect("query").is_empty());
    }
    assert!(matches!(
        index.k_nearest_to_item(0, 1),
        Err(HnswError::NodeOutOfRange { .. })
    ));
}

#[test]
fn test_query_dimension_mismatch() {
    let items = unit_vectors(10, 4, 2);
    let index = build(&items, HnswConfig::new(4, 10), 2);
    assert!(matches!(
        index.k_nearest(&[1.0, 0.0], 3),
        Err(HnswError::DimensionMismatch {
            expected: 4,
            actual: 2
        })
    ));
}

#[test]
fn test_concurrent_queries_match_sequential() {
    let items = unit_vectors(500, 16, 8);
    let index = Arc::new(build(&items, HnswConfig::new(8, 64), 8));
    let expected: Vec<_> = (0..40u32)
        .map(|q| index.k_nearest(&items[q as usize], 10).expect("query"))
        .collect();

    let items = Arc::new(items);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            let items = Arc::clone(&items);
            std::thread::spawn(move || {
                (0..40u32)
                    .map(|q| index.k_nearest(&items[q as usize], 10).expect("query"))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("thread"), expected);
    }
}

#[test]
fn test_panicking_distance_leaves_index_unusable() {
    let calls = AtomicUsize::new(0);
    let flaky = move |a: &[f32], b: &[f32]| -> f32 {
        if calls.fetch_add(1, Ordering::Relaxed) > 200 {
            panic!("distance backend failed");
        }
        DistanceMetric::Euclidean.distance(a, b)
    };
    let items = unit_vectors(100, 4, 4);
    let mut index = HnswIndex::new(4, flaky, HnswConfig::new(4, 16)).expect("config");
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        index.add_items(&items, &mut SeededRandom::from_seed(4))
    }));
    assert!(outcome.is_err());
    assert_eq!(index.state(), IndexState::Building);
    assert!(matches!(
        index.k_nearest(&items[0], 1),
        Err(HnswError::IncompleteBuild)
    ));
    let mut sink = Vec::new();
    assert!(matches!(
        index.serialize(&mut sink),
        Err(HnswError::IncompleteBuild)
    ));
}

#[test]
fn test_custom_closure_distance() {
    let manhattan = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum() };
    let items: Vec<Vec<f32>> = (0..64).map(|i| vec![(i % 8) as f32, (i / 8) as f32]).collect();
    let mut index = HnswIndex::new(2, manhattan, HnswConfig::new(4, 32)).expect("config");
    index
        .add_items(&items, &mut SeededRandom::from_seed(12))
        .expect("build");
    let found = index.k_nearest_with_ef(&[3.0, 4.0], 1, 32).expect("query");
    assert_eq!(found[0].id, 35);
    assert_eq!(found[0].distance, 0.0);
}
