//! # smallworld-core
//!
//! In-memory HNSW approximate nearest neighbor index over `f32` vectors, with a
//! checksummed binary graph format for persistence.
//!
//! The crate has no async or I/O framework dependencies; persistence works on any
//! `std::io::Read`/`Write`.

/// Global configuration constants: limits, defaults, and format identifiers.
pub mod config;
/// Error type shared by the index and persistence layers.
pub mod error;
/// HNSW approximate nearest neighbor index: graph structure, search, insertion, and distance metrics.
pub mod hnsw;
/// Graph serialization and atomic file persistence.
pub mod storage;
/// Vector arithmetic: dot products, norms, and tolerant float comparison.
pub mod vector_ops;

pub use error::{HnswError, Result};
pub use hnsw::{
    CancellationToken, Distance, DistanceCacheKind, DistanceMetric, HnswConfig, HnswIndex,
    IndexState, NeighbourHeuristic, Neighbor, ProgressReporter, RandomSource, SeededRandom,
};
