//! The HNSW index: owns the graph, its configuration, and the build state.

use crate::config;
use crate::error::{HnswError, Result};
use crate::hnsw::distance::{Distance, DistanceMetric};
use crate::hnsw::graph::{GraphCore, HnswConfig};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write as _;

/// Lifecycle of an index.
///
/// `Building` is only observable after a batch was interrupted (cancellation or a
/// panic inside the distance function); such an index refuses further use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Building,
    Ready,
}

/// A search hit: item id and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: u32,
    pub distance: f32,
}

/// Hierarchical Navigable Small World graph over fixed-dimension `f32` vectors.
///
/// Queries take `&self` and may run concurrently; insertion takes `&mut self`.
#[derive(Debug)]
pub struct HnswIndex<D = DistanceMetric> {
    pub(crate) config: HnswConfig,
    pub(crate) distance: D,
    pub(crate) core: GraphCore,
    pub(crate) entry_point: Option<u32>,
    pub(crate) state: IndexState,
    /// Set on indexes rebuilt from storage; they answer queries but take no inserts.
    pub(crate) read_only: bool,
}

impl<D: Distance> HnswIndex<D> {
    pub fn new(dimension: usize, distance: D, config: HnswConfig) -> Result<Self> {
        if dimension == 0 || dimension > config::MAX_DIMENSION {
            return Err(HnswError::InvalidDimension(dimension));
        }
        config.validate()?;
        Ok(Self {
            config,
            distance,
            core: GraphCore::new(dimension),
            entry_point: None,
            state: IndexState::Empty,
            read_only: false,
        })
    }

    /// A read-only index over a decoded graph.
    pub(crate) fn from_core(
        config: HnswConfig,
        distance: D,
        core: GraphCore,
        entry_point: Option<u32>,
    ) -> Self {
        let state = if core.is_empty() {
            IndexState::Empty
        } else {
            IndexState::Ready
        };
        Self {
            config,
            distance,
            core,
            entry_point,
            state,
            read_only: true,
        }
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    pub fn distance(&self) -> &D {
        &self.distance
    }

    pub fn dimension(&self) -> usize {
        self.core.items().dimension()
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    /// `true` for an index loaded from storage.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    pub fn core(&self) -> &GraphCore {
        &self.core
    }

    /// Fraction of construction-time distance lookups served from the cache, if one exists.
    pub fn distance_cache_hit_rate(&self) -> Option<f64> {
        self.core.cache.as_ref().map(|cache| cache.hit_rate())
    }

    /// Top layer of the entry point, or `None` for an empty graph.
    pub fn max_layer(&self) -> Option<usize> {
        self.entry_point.map(|ep| self.core.topology().layer(ep))
    }

    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if self.state == IndexState::Building {
            return Err(HnswError::IncompleteBuild);
        }
        Ok(())
    }

    fn check_id(&self, id: u32) -> Result<()> {
        if id as usize >= self.len() {
            return Err(HnswError::NodeOutOfRange {
                id,
                count: self.len(),
            });
        }
        Ok(())
    }

    /// The stored vector of item `id`.
    pub fn item(&self, id: u32) -> Result<&[f32]> {
        self.check_id(id)?;
        Ok(self.core.items().get(id))
    }

    /// Top layer of node `id`.
    pub fn node_layer(&self, id: u32) -> Result<usize> {
        self.check_id(id)?;
        Ok(self.core.topology().layer(id))
    }

    /// Neighbors of node `id` on `layer` (empty above the node's top layer).
    pub fn neighbors(&self, id: u32, layer: usize) -> Result<&[u32]> {
        self.check_id(id)?;
        Ok(self.core.topology().neighbors(id, layer))
    }

    /// Human-readable dump of the graph: per layer, a breadth-first walk from the
    /// entry point listing every reached node and its neighbors.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let Some(entry) = self.entry_point else {
            out.push_str("empty graph\n");
            return out;
        };
        let topology = self.core.topology();
        let top = topology.layer(entry);
        let _ = writeln!(
            out,
            "nodes={} dimension={} entry={} max_layer={}",
            self.len(),
            self.dimension(),
            entry,
            top
        );

        for layer in (0..=top).rev() {
            let mut seen = vec![false; self.len()];
            let mut queue = VecDeque::from([entry]);
            seen[entry as usize] = true;
            while let Some(node) = queue.pop_front() {
                let neighbors = topology.neighbors(node, layer);
                let mut sorted = neighbors.to_vec();
                sorted.sort_unstable();
                let _ = writeln!(
                    out,
                    "L{layer} ({node} : {} / {}) -> {sorted:?}",
                    neighbors.len(),
                    self.config.capacity(layer)
                );
                for &n in neighbors {
                    if !std::mem::replace(&mut seen[n as usize], true) {
                        queue.push_back(n);
                    }
                }
            }
        }
        out
    }
}
