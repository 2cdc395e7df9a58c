//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor index.
//!
//! Items are appended to a contiguous `f32` arena; node `i` of the graph is item `i`.
//! The graph uses a Struct-of-Arrays layout: vectors, neighbor lists, and layer
//! assignments live in separate arrays indexed by node id.
//!
//! Construction memoizes node-to-node distances in a [`cache::DistanceCache`];
//! queries never touch it, so any number of threads may search a shared `&HnswIndex`.

/// Construction-time pairwise distance memo (dense or hashed).
pub mod cache;
/// Distance trait and built-in metrics: cosine, euclidean, and dot product.
pub mod distance;
/// Configuration, item arena, and multi-layer topology.
pub mod graph;
/// The index type, its lifecycle state, accessors, and debug dump.
pub mod index;
/// Batch insertion with bidirectional connections and pruning.
pub mod insert;
/// Progress callbacks and cancellation for long builds.
pub mod progress;
/// Layer-level randomness.
pub mod random;
/// Single-layer beam search and multi-layer KNN.
pub mod search;
/// Simple and heuristic neighbor selection.
pub mod select;
/// Generation-based visited set for efficient graph traversal.
pub mod visited;

pub use cache::DistanceCacheKind;
pub use distance::{Distance, DistanceMetric};
pub use graph::{HnswConfig, NeighbourHeuristic};
pub use index::{HnswIndex, IndexState, Neighbor};
pub use progress::{CancellationToken, ProgressReporter};
pub use random::{RandomSource, SeededRandom};
