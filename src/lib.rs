//! # smallworld
//!
//! Benchmark harness for the [`smallworld_core`] HNSW index: exact and heap-based
//! baselines, an HNSW-backed ranker, recall evaluation, and dataset helpers.
//!
//! ## Architecture
//!
//! ```text
//! dataset (random / raw file) → Ranker { Exact, Heap, Hnsw }
//!                             → run_seeds (rayon pool) → evaluate (recall, wrong scores)
//! HnswRanker: load <name>.gf + .vec, or build in batches and save both
//! ```

/// Error type for harness operations.
pub mod error;
/// Synthetic vectors, normalization, raw vector files, and the bincode vector sidecar.
pub mod dataset;
/// Recall and score-agreement evaluation, and the recall-driven `k` sweep.
pub mod eval;
/// HNSW-backed ranker: model files and batch building.
pub mod hnsw_ranker;
/// Build progress reporting through `tracing`.
pub mod progress;
/// The `Ranker` trait, exact baselines, and parallel seed runs.
pub mod ranker;
/// Single-writer/many-reader wrapper around an index.
pub mod shared;

pub use error::{BenchError, Result};
pub use eval::{evaluate, find_k_for_recall, Evaluation, RecallSweep};
pub use hnsw_ranker::HnswRanker;
pub use progress::LogProgress;
pub use ranker::{run_seeds, ExactRanker, HeapRanker, RankRun, Ranker, Scored};
pub use shared::SharedIndex;
