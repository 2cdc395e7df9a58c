//! Error type for the benchmark harness.

use smallworld_core::HnswError;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Index(#[from] HnswError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("vector sidecar error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("report serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Input vectors that are empty, ragged, or truncated.
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
}
