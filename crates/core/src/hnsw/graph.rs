//! HNSW graph storage and configuration.
//!
//! [`HnswConfig`] holds the tuning parameters. [`GraphCore`] owns the item vectors,
//! the per-node multi-layer adjacency, and the optional construction-time distance
//! cache. Nodes are addressed by dense `u32` ids: an id is simultaneously the item
//! index, the node index, and the value stored in neighbor lists.

use crate::config;
use crate::error::{HnswError, Result};
use crate::hnsw::cache::{DistanceCache, DistanceCacheKind};
use crate::hnsw::random::{random_level, RandomSource};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Neighbor-selection policy applied when connecting and pruning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighbourHeuristic {
    /// Closest `count` candidates.
    Simple,
    /// Diversity-aware selection: a candidate is admitted only if it is closer to the
    /// target than to every neighbor admitted before it.
    Heuristic,
}

/// Configuration parameters for an HNSW index.
///
/// Controls the trade-off between build speed, search speed, recall, and memory usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum links per node on layers above 0.
    pub m: usize,
    /// Maximum links per node on layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Beam width while inserting (efConstruction / "construction pruning").
    pub ef_construction: usize,
    /// Minimum query beam width. `0` means the beam equals the requested `k`.
    #[serde(default)]
    pub ef_search: usize,
    /// Maximum number of layers; drawn levels are clamped to `max_layers - 1`.
    pub max_layers: usize,
    pub neighbour_heuristic: NeighbourHeuristic,
    /// Also consider the candidates' own neighbors when selecting.
    pub expand_best_selection: bool,
    /// Backfill with candidates rejected by the heuristic until the target count is met.
    pub keep_pruned_connections: bool,
    /// Memoize pairwise node distances while building.
    pub enable_distance_cache: bool,
    /// Node count the distance cache is sized for up front.
    pub initial_distance_cache_size: usize,
    pub distance_cache: DistanceCacheKind,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            m_max0: config::HNSW_DEFAULT_M * 2,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            max_layers: config::HNSW_DEFAULT_MAX_LAYERS,
            neighbour_heuristic: NeighbourHeuristic::Heuristic,
            expand_best_selection: false,
            keep_pruned_connections: true,
            enable_distance_cache: true,
            initial_distance_cache_size: 0,
            distance_cache: DistanceCacheKind::Hashed,
        }
    }
}

impl HnswConfig {
    /// Default configuration with the given `m` and efConstruction (`m_max0 = 2m`).
    pub fn new(m: usize, ef_construction: usize) -> Self {
        Self {
            m,
            m_max0: m * 2,
            ef_construction,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.m < 2 {
            return Err(HnswError::InvalidConfig(format!("m must be >= 2, got {}", self.m)));
        }
        if self.m_max0 < self.m {
            return Err(HnswError::InvalidConfig(format!(
                "m_max0 ({}) must be >= m ({})",
                self.m_max0, self.m
            )));
        }
        if self.ef_construction == 0 {
            return Err(HnswError::InvalidConfig(
                "ef_construction must be >= 1".to_string(),
            ));
        }
        if self.max_layers == 0 || self.max_layers > config::HNSW_MAX_LAYERS_LIMIT {
            return Err(HnswError::InvalidConfig(format!(
                "max_layers must be in 1..={}, got {}",
                config::HNSW_MAX_LAYERS_LIMIT,
                self.max_layers
            )));
        }
        Ok(())
    }

    /// Neighbor-list capacity at `layer`: `m_max0` on layer 0, `m` above.
    #[inline]
    pub fn capacity(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }
}

/// Contiguous arena of fixed-dimension item vectors.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    dimension: usize,
    data: Vec<f32>,
}

impl ItemStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// O(1) slice into the arena.
    #[inline]
    pub fn get(&self, id: u32) -> &[f32] {
        let start = id as usize * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// Appends a vector whose length was already checked against the dimension.
    pub(crate) fn push(&mut self, vector: &[f32]) {
        debug_assert_eq!(vector.len(), self.dimension);
        self.data.extend_from_slice(vector);
    }

    /// Checks every vector's length before anything is stored.
    pub fn check_dimensions<V: AsRef<[f32]>>(&self, items: &[V]) -> Result<()> {
        for item in items {
            let actual = item.as_ref().len();
            if actual != self.dimension {
                return Err(HnswError::DimensionMismatch {
                    expected: self.dimension,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Multi-layer adjacency in Struct-of-Arrays form.
///
/// `neighbors[id][layer]` is the neighbor list of node `id` on `layer`; every node has
/// one list per layer `0..=layers[id]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    neighbors: Vec<Vec<Vec<u32>>>,
    layers: Vec<u8>,
}

impl Topology {
    pub(crate) fn from_parts(neighbors: Vec<Vec<Vec<u32>>>, layers: Vec<u8>) -> Self {
        debug_assert_eq!(neighbors.len(), layers.len());
        Self { neighbors, layers }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Highest layer node `id` participates in.
    #[inline]
    pub fn layer(&self, id: u32) -> usize {
        self.layers[id as usize] as usize
    }

    /// Neighbors of `id` on `layer`; empty above the node's top layer.
    #[inline]
    pub fn neighbors(&self, id: u32, layer: usize) -> &[u32] {
        self.neighbors[id as usize]
            .get(layer)
            .map_or(&[], |list| list.as_slice())
    }

    #[inline]
    pub(crate) fn neighbors_mut(&mut self, id: u32, layer: usize) -> &mut Vec<u32> {
        &mut self.neighbors[id as usize][layer]
    }

    /// Appends a node with empty lists on layers `0..=level`. Returns its id.
    pub(crate) fn push_node(&mut self, level: usize) -> u32 {
        let id = self.layers.len() as u32;
        self.neighbors.push(vec![Vec::new(); level + 1]);
        self.layers.push(level as u8);
        id
    }
}

/// Items, adjacency, and the construction-time distance cache.
#[derive(Debug)]
pub struct GraphCore {
    pub(crate) items: ItemStore,
    pub(crate) topology: Topology,
    pub(crate) cache: Option<DistanceCache>,
}

impl GraphCore {
    pub fn new(dimension: usize) -> Self {
        Self {
            items: ItemStore::new(dimension),
            topology: Topology::default(),
            cache: None,
        }
    }

    pub(crate) fn from_parts(items: ItemStore, topology: Topology) -> Self {
        Self {
            items,
            topology,
            cache: None,
        }
    }

    pub fn len(&self) -> usize {
        self.topology.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topology.is_empty()
    }

    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Stores a batch of (pre-validated) items and creates their nodes with freshly
    /// drawn levels. Nodes start unconnected. Grows the distance cache if enabled.
    pub(crate) fn append<V: AsRef<[f32]>>(
        &mut self,
        items: &[V],
        rng: &mut dyn RandomSource,
        config: &HnswConfig,
    ) -> Range<u32> {
        let start = self.topology.len() as u32;
        for item in items {
            self.items.push(item.as_ref());
            let level = random_level(rng, config.m, config.max_layers);
            self.topology.push_node(level);
        }
        let end = self.topology.len() as u32;

        if config.enable_distance_cache {
            let points = self.len().max(config.initial_distance_cache_size);
            match self.cache.as_mut() {
                Some(cache) => cache.resize(points),
                None => self.cache = Some(DistanceCache::new(config.distance_cache, points)),
            }
        }
        start..end
    }
}
