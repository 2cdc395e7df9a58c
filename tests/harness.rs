use smallworld::dataset::{normalize_all, random_vectors};
use smallworld::eval::find_k_for_recall;
use smallworld::hnsw_ranker::build_config;
use smallworld::{
    evaluate, run_seeds, ExactRanker, HeapRanker, HnswRanker, Ranker, SharedIndex,
};
use smallworld_core::vector_ops::cosine_similarity_unit;
use smallworld_core::{DistanceMetric, HnswConfig, HnswIndex, SeededRandom};
use std::sync::Arc;
use tempfile::TempDir;

fn unit_dataset(n: usize, dim: usize, seed: u64) -> Arc<Vec<Vec<f32>>> {
    let mut v = random_vectors(n, dim, seed);
    normalize_all(&mut v);
    Arc::new(v)
}

fn seeds() -> Vec<usize> {
    (0..30).map(|i| i * 13).collect()
}

#[test]
fn test_hnsw_ranker_builds_then_loads() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let vectors = unit_dataset(400, 16, 1);
    let config = build_config(8, 64, vectors.len());

    let built = HnswRanker::init_with(
        tmp.path(),
        "random",
        Arc::clone(&vectors),
        config.clone(),
        &mut SeededRandom::from_seed(1),
    )
    .expect("build");
    let paths = built.paths().clone();
    assert!(paths.graph.exists());
    assert!(paths.vectors.exists());
    let dump = std::fs::read_to_string(&paths.debug).expect("debug dump");
    assert!(dump.starts_with("nodes=400"));
    assert!(paths
        .graph
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == "random-dim16-m8-ef64-400-16.gf"));

    let loaded = HnswRanker::init_with(
        tmp.path(),
        "random",
        Arc::clone(&vectors),
        config,
        &mut SeededRandom::from_seed(99),
    )
    .expect("load");
    assert_eq!(loaded.data_size(), 400);
    assert_eq!(loaded.dimension(), 16);
    assert!(!built.index().search(|index| index.is_read_only()));
    assert!(loaded.index().search(|index| index.is_read_only()));
    for seed in seeds() {
        assert_eq!(
            built.rank(seed, 10).expect("rank"),
            loaded.rank(seed, 10).expect("rank")
        );
    }
}

#[test]
fn test_hnsw_recall_against_exact_baseline() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let vectors = unit_dataset(500, 16, 2);
    let exact = ExactRanker::new(Arc::clone(&vectors), cosine_similarity_unit);
    let heap = HeapRanker::new(Arc::clone(&vectors), cosine_similarity_unit);
    let hnsw = HnswRanker::init_with(
        tmp.path(),
        "random",
        Arc::clone(&vectors),
        build_config(8, 80, vectors.len()),
        &mut SeededRandom::from_seed(2),
    )
    .expect("build");

    let seeds = seeds();
    let truth = run_seeds(&exact, &seeds, 10, 2).expect("exact");
    let heap_run = run_seeds(&heap, &seeds, 10, 2).expect("heap");
    let heap_eval = evaluate(&heap_run, "k=10", 16, 500, Some(&truth));
    assert_eq!(heap_eval.recall, Some(1.0));
    assert_eq!(heap_eval.wrong_scores, Some(0));

    let hnsw_run = run_seeds(&hnsw, &seeds, 10, 4).expect("hnsw");
    let eval = evaluate(&hnsw_run, "k=10", 16, 500, Some(&truth));
    let recall = eval.recall.expect("recall");
    assert!(recall >= 0.75, "recall = {recall}");
    assert_eq!(eval.wrong_scores, Some(0));

    let json = serde_json::to_string(&eval).expect("json");
    assert!(json.contains("\"recall\""));
}

#[test]
fn test_find_k_for_recall_widens_until_target() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let vectors = unit_dataset(600, 24, 3);
    let exact = ExactRanker::new(Arc::clone(&vectors), cosine_similarity_unit);
    let hnsw = HnswRanker::init_with(
        tmp.path(),
        "random",
        Arc::clone(&vectors),
        build_config(4, 16, vectors.len()),
        &mut SeededRandom::from_seed(3),
    )
    .expect("build");

    let seeds = seeds();
    let truth = run_seeds(&exact, &seeds, 10, 0).expect("exact");
    let sweep = find_k_for_recall(&hnsw, &seeds, &truth, 0.95, 0).expect("sweep");
    assert!(sweep.reached, "recall {} at k={}", sweep.recall, sweep.k);
    assert_eq!(sweep.k % 10, 0);
    assert!(sweep.recall > 0.95);

    let exact_sweep = find_k_for_recall(&exact, &seeds, &truth, 0.99, 0).expect("sweep");
    assert_eq!(exact_sweep.k, 10);
}

#[test]
fn test_rescore_restores_exact_scores() {
    let vectors = unit_dataset(300, 12, 4);
    // Rank with a reduced view (first half of each vector), then rescore on the originals.
    let reduced: Arc<Vec<Vec<f32>>> = Arc::new(
        vectors
            .iter()
            .map(|v| smallworld_core::vector_ops::normalized(&v[..6]))
            .collect(),
    );
    let exact = ExactRanker::new(Arc::clone(&vectors), cosine_similarity_unit);
    let coarse = HeapRanker::new(reduced, cosine_similarity_unit);

    let seeds = seeds();
    let truth = run_seeds(&exact, &seeds, 5, 0).expect("exact");
    let mut run = run_seeds(&coarse, &seeds, 300, 0).expect("coarse");
    run.rescore(&seeds, &vectors, cosine_similarity_unit, 5);
    let eval = evaluate(&run, "rescored", 12, 300, Some(&truth));
    assert_eq!(eval.recall, Some(1.0));
    assert_eq!(eval.wrong_scores, Some(0));
}

#[test]
fn test_shared_index_build_and_search() {
    let vectors = unit_dataset(150, 8, 5);
    let index =
        HnswIndex::new(8, DistanceMetric::CosineUnit, HnswConfig::new(6, 40)).expect("config");
    let shared = SharedIndex::new(index);
    let ids = shared
        .build(|index| index.add_items(&vectors[..], &mut SeededRandom::from_seed(5)))
        .expect("build");
    assert_eq!(ids, 0..150);
    let hit = shared
        .search(|index| index.k_nearest_with_ef(&vectors[42], 1, 32))
        .expect("query");
    assert_eq!(hit[0].id, 42);
}
