//! Rankers produce the top-`k` most similar items for a seed item.
//!
//! A seed is the index of a dataset item used as the query. Every ranker returns
//! results sorted by descending similarity, ties broken by ascending id, so two
//! exact rankers agree item for item.

use crate::error::Result;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One ranked item: dataset index and similarity score (higher is better).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scored {
    pub id: u32,
    pub score: f32,
}

/// Descending score, then ascending id.
fn by_score_desc(a: &Scored, b: &Scored) -> Ordering {
    b.score.total_cmp(&a.score).then(a.id.cmp(&b.id))
}

fn top_scores(mut scored: Vec<Scored>, k: usize) -> Vec<Scored> {
    scored.sort_by(by_score_desc);
    scored.truncate(k);
    scored
}

pub trait Ranker: Sync {
    fn name(&self) -> &str;

    /// Top-`k` items for the dataset item at `seed`.
    fn rank(&self, seed: usize, k: usize) -> Result<Vec<Scored>>;

    fn data_size(&self) -> usize;

    fn dimension(&self) -> usize;
}

/// Scores every item and fully sorts.
pub struct ExactRanker<F> {
    vectors: Arc<Vec<Vec<f32>>>,
    similarity: F,
}

impl<F> ExactRanker<F>
where
    F: Fn(&[f32], &[f32]) -> f32 + Sync,
{
    pub fn new(vectors: Arc<Vec<Vec<f32>>>, similarity: F) -> Self {
        Self { vectors, similarity }
    }
}

impl<F> Ranker for ExactRanker<F>
where
    F: Fn(&[f32], &[f32]) -> f32 + Sync,
{
    fn name(&self) -> &str {
        "exact"
    }

    fn rank(&self, seed: usize, k: usize) -> Result<Vec<Scored>> {
        let query = &self.vectors[seed];
        let scored = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| Scored {
                id: i as u32,
                score: (self.similarity)(query, v),
            })
            .collect();
        Ok(top_scores(scored, k))
    }

    fn data_size(&self) -> usize {
        self.vectors.len()
    }

    fn dimension(&self) -> usize {
        self.vectors.first().map_or(0, Vec::len)
    }
}

/// Scores every item but keeps only a bounded min-heap of the best `k`.
pub struct HeapRanker<F> {
    vectors: Arc<Vec<Vec<f32>>>,
    similarity: F,
}

impl<F> HeapRanker<F>
where
    F: Fn(&[f32], &[f32]) -> f32 + Sync,
{
    pub fn new(vectors: Arc<Vec<Vec<f32>>>, similarity: F) -> Self {
        Self { vectors, similarity }
    }
}

impl<F> Ranker for HeapRanker<F>
where
    F: Fn(&[f32], &[f32]) -> f32 + Sync,
{
    fn name(&self) -> &str {
        "heap"
    }

    fn rank(&self, seed: usize, k: usize) -> Result<Vec<Scored>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = &self.vectors[seed];
        // Key order: higher score first, then lower id. The heap top is the worst kept item.
        let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<u32>)>> =
            BinaryHeap::with_capacity(k + 1);
        for (i, v) in self.vectors.iter().enumerate() {
            let key = (OrderedFloat((self.similarity)(query, v)), Reverse(i as u32));
            if heap.len() < k {
                heap.push(Reverse(key));
            } else if heap.peek().is_some_and(|worst| key > worst.0) {
                heap.pop();
                heap.push(Reverse(key));
            }
        }
        // Ascending by Reverse(key) is descending by key.
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse((score, Reverse(id)))| Scored {
                id,
                score: score.into_inner(),
            })
            .collect())
    }

    fn data_size(&self) -> usize {
        self.vectors.len()
    }

    fn dimension(&self) -> usize {
        self.vectors.first().map_or(0, Vec::len)
    }
}

/// Results of ranking a list of seeds, in seed order.
#[derive(Debug, Clone)]
pub struct RankRun {
    pub name: String,
    pub k: usize,
    pub results: Vec<Vec<Scored>>,
    pub elapsed: Duration,
}

impl RankRun {
    /// Mean wall-clock milliseconds per seed.
    pub fn avg_ms(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.elapsed.as_secs_f64() * 1000.0 / self.results.len() as f64
    }

    /// Re-scores every result with `similarity` over `vectors`, re-sorts, and keeps the
    /// top `k`. Used when ranking ran over reduced vectors and the final order should
    /// come from the originals. The time spent is added to `elapsed`.
    pub fn rescore<F>(&mut self, seeds: &[usize], vectors: &[Vec<f32>], similarity: F, k: usize)
    where
        F: Fn(&[f32], &[f32]) -> f32,
    {
        let started = Instant::now();
        for (result, &seed) in self.results.iter_mut().zip(seeds) {
            let query = &vectors[seed];
            let rescored = result
                .iter()
                .map(|s| Scored {
                    id: s.id,
                    score: similarity(query, &vectors[s.id as usize]),
                })
                .collect();
            *result = top_scores(rescored, k);
        }
        self.k = k;
        self.elapsed += started.elapsed();
    }
}

/// Ranks every seed on a rayon pool of `parallelism` threads (`0` lets rayon decide).
pub fn run_seeds(
    ranker: &dyn Ranker,
    seeds: &[usize],
    k: usize,
    parallelism: usize,
) -> Result<RankRun> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism)
        .build()?;
    let started = Instant::now();
    let results = pool.install(|| {
        seeds
            .par_iter()
            .map(|&seed| ranker.rank(seed, k))
            .collect::<Result<Vec<_>>>()
    })?;
    let elapsed = started.elapsed();
    tracing::debug!(
        ranker = ranker.name(),
        seeds = seeds.len(),
        k,
        elapsed_ms = elapsed.as_millis() as u64,
        "ranked seeds"
    );
    Ok(RankRun {
        name: ranker.name().to_string(),
        k,
        results,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{normalize_all, random_vectors};
    use smallworld_core::vector_ops::cosine_similarity_unit;

    fn data() -> Arc<Vec<Vec<f32>>> {
        let mut v = random_vectors(300, 8, 11);
        normalize_all(&mut v);
        Arc::new(v)
    }

    #[test]
    fn test_exact_and_heap_agree() {
        let vectors = data();
        let exact = ExactRanker::new(Arc::clone(&vectors), cosine_similarity_unit);
        let heap = HeapRanker::new(Arc::clone(&vectors), cosine_similarity_unit);
        for seed in [0, 17, 299] {
            for k in [1, 10, 300, 500] {
                assert_eq!(exact.rank(seed, k).unwrap(), heap.rank(seed, k).unwrap());
            }
        }
    }

    #[test]
    fn test_seed_ranks_first() {
        let vectors = data();
        let exact = ExactRanker::new(Arc::clone(&vectors), cosine_similarity_unit);
        let top = exact.rank(42, 5).unwrap();
        assert_eq!(top[0].id, 42);
        for pair in top.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_heap_ties_prefer_lower_ids() {
        let vectors = Arc::new(vec![vec![1.0, 0.0]; 6]);
        let heap = HeapRanker::new(vectors, cosine_similarity_unit);
        let ids: Vec<u32> = heap.rank(3, 3).unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(heap.rank(0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_run_seeds_keeps_seed_order() {
        let vectors = data();
        let exact = ExactRanker::new(Arc::clone(&vectors), cosine_similarity_unit);
        let seeds = [5, 1, 200, 7];
        let run = run_seeds(&exact, &seeds, 3, 2).unwrap();
        assert_eq!(run.results.len(), seeds.len());
        for (result, &seed) in run.results.iter().zip(&seeds) {
            assert_eq!(result[0].id as usize, seed);
        }
        assert_eq!(run.name, "exact");
    }

    #[test]
    fn test_rescore_reorders_and_truncates() {
        let vectors = data();
        let mut run = RankRun {
            name: "manual".to_string(),
            k: 4,
            results: vec![vec![
                Scored { id: 9, score: 0.0 },
                Scored { id: 3, score: 0.0 },
                Scored { id: 0, score: 0.0 },
                Scored { id: 50, score: 0.0 },
            ]],
            elapsed: Duration::ZERO,
        };
        run.rescore(&[0], &vectors, cosine_similarity_unit, 2);
        assert_eq!(run.k, 2);
        assert_eq!(run.results[0].len(), 2);
        assert_eq!(run.results[0][0].id, 0);
        assert!(run.results[0][0].score >= run.results[0][1].score);
    }
}
