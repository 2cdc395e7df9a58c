//! Global configuration constants for smallworld.
//!
//! Tuning defaults, input validation limits, and persisted-format identifiers are
//! defined here. Runtime parameters live in [`HnswConfig`](crate::hnsw::HnswConfig).

/// Default number of links per node on layers above 0.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64. Default: 16.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default beam width while inserting (efConstruction).
///
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default query beam floor. `0` means the beam width equals the requested `k`.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 0;

/// Maximum number of layers in the graph. Drawn levels are clamped below this.
pub const HNSW_DEFAULT_MAX_LAYERS: usize = 16;

/// Upper bound accepted for `max_layers` (layers are persisted as `u32`, stored as `u8`).
pub const HNSW_MAX_LAYERS_LIMIT: usize = 255;

/// Maximum allowed vector dimension.
pub const MAX_DIMENSION: usize = 65_536;

/// Slot cap of the hashed distance cache (2^24 entries, ~192 MB).
pub const DISTANCE_CACHE_MAX_ENTRIES: usize = 1 << 24;

/// Node count assumed by the hashed distance cache when no size hint is given.
pub const DISTANCE_CACHE_DEFAULT_POINTS: usize = 1024;

/// Magic bytes at the start of a serialized graph.
pub const GRAPH_MAGIC: &[u8; 4] = b"SWG1";

/// Current serialized graph format version.
pub const GRAPH_FORMAT_VERSION: u32 = 1;
