//! Recall and score-agreement of a ranker run against exact ground truth.

use crate::error::Result;
use crate::ranker::{run_seeds, RankRun, Ranker, Scored};
use serde::{Deserialize, Serialize};
use smallworld_core::vector_ops::{almost_equal, DEFAULT_EPSILON};

/// Summary of one ranker run, printable as a tab-separated row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub ranker: String,
    pub label: String,
    pub dimension: usize,
    pub data_size: usize,
    pub seeds: usize,
    /// Mean milliseconds per seed.
    pub avg_ms: f64,
    /// Mean ground-truth milliseconds per seed.
    pub ground_truth_ms: f64,
    pub speed_up: f64,
    /// Absent when no ground truth was supplied.
    pub recall: Option<f64>,
    pub wrong_scores: Option<usize>,
}

impl Evaluation {
    pub fn header() -> &'static str {
        "Ranker\tLabel\tDim\tDataSize\tSeeds\tAvg ms/seed\tAvg GT ms/seed\tSpeed up\tRecall\tWrong scores"
    }

    pub fn row(&self) -> String {
        let recall = self.recall.map_or_else(|| "-".to_string(), |r| format!("{r:.4}"));
        let wrong = self
            .wrong_scores
            .map_or_else(|| "-".to_string(), |w| w.to_string());
        format!(
            "[{}]\t[{}]\t{}\t{}\t{}\t{:.2}\t{:.2}\t{:.2}\t{}\t{}",
            self.ranker,
            self.label,
            self.dimension,
            self.data_size,
            self.seeds,
            self.avg_ms,
            self.ground_truth_ms,
            self.speed_up,
            recall,
            wrong
        )
    }
}

/// Recall and mismatched-score count of `results` against `ground_truth`.
///
/// With `k` the length of the first ground-truth list, only the first `k` results of
/// each seed count. Recall is hits over `k`, averaged over seeds. A hit whose score
/// is not [`almost_equal`] to the ground-truth score counts as a wrong score.
pub fn score_against(results: &[Vec<Scored>], ground_truth: &[Vec<Scored>]) -> (f64, usize) {
    let k = ground_truth.first().map_or(0, Vec::len);
    if k == 0 || ground_truth.is_empty() {
        return (0.0, 0);
    }
    let mut hits = 0usize;
    let mut wrong = 0usize;
    for (i, truth) in ground_truth.iter().enumerate() {
        let Some(found) = results.get(i) else {
            continue;
        };
        let top = &found[..found.len().min(k)];
        for expected in truth {
            if let Some(hit) = top.iter().find(|s| s.id == expected.id) {
                hits += 1;
                if !almost_equal(hit.score as f64, expected.score as f64, DEFAULT_EPSILON) {
                    wrong += 1;
                }
            }
        }
    }
    let recall = hits as f64 / k as f64 / ground_truth.len() as f64;
    (recall, wrong)
}

/// Evaluates `run` with `label`. `ground_truth` is the exact run over the same seeds.
pub fn evaluate(
    run: &RankRun,
    label: &str,
    dimension: usize,
    data_size: usize,
    ground_truth: Option<&RankRun>,
) -> Evaluation {
    let avg_ms = run.avg_ms();
    let ground_truth_ms = ground_truth.map_or(0.0, RankRun::avg_ms);
    let speed_up = if avg_ms > 0.0 {
        ground_truth_ms / avg_ms
    } else {
        0.0
    };
    let scored = ground_truth.map(|gt| score_against(&run.results, &gt.results));
    Evaluation {
        ranker: run.name.clone(),
        label: label.to_string(),
        dimension,
        data_size,
        seeds: run.results.len(),
        avg_ms,
        ground_truth_ms,
        speed_up,
        recall: scored.map(|(r, _)| r),
        wrong_scores: scored.map(|(_, w)| w),
    }
}

/// Outcome of [`find_k_for_recall`]: the last `k` tried and its run.
#[derive(Debug, Clone)]
pub struct RecallSweep {
    pub k: usize,
    pub recall: f64,
    /// Whether `recall` exceeded the target. When false, `k` is the largest tried.
    pub reached: bool,
    pub run: RankRun,
}

/// Largest multiple of the ground-truth `k` tried by [`find_k_for_recall`].
pub const MAX_RECALL_MULTIPLE: usize = 10;

/// Asks `ranker` for `k = m * gt_k` results, `m` in `1..=MAX_RECALL_MULTIPLE`, until
/// the recall of its top `gt_k` against `ground_truth` exceeds `desired`.
pub fn find_k_for_recall(
    ranker: &dyn Ranker,
    seeds: &[usize],
    ground_truth: &RankRun,
    desired: f64,
    parallelism: usize,
) -> Result<RecallSweep> {
    let gt_k = ground_truth.k.max(1);
    let mut multiple = 1;
    loop {
        let k = gt_k * multiple;
        let run = run_seeds(ranker, seeds, k, parallelism)?;
        let (recall, _) = score_against(&run.results, &ground_truth.results);
        let reached = recall > desired;
        tracing::info!(ranker = ranker.name(), k, recall, desired, reached, "recall sweep");
        if reached || multiple == MAX_RECALL_MULTIPLE {
            return Ok(RecallSweep {
                k,
                recall,
                reached,
                run,
            });
        }
        multiple += 1;
    }
}
