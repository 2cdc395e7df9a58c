//! Ranker backed by a persisted HNSW graph.
//!
//! A model is three files under the model directory, named after the dataset, the
//! build parameters, and the data shape:
//!
//! ```text
//! <name>-dim{d}-m{m}-ef{ef}-{n}-{d}.gf            graph (smallworld_core format)
//! <name>-dim{d}-m{m}-ef{ef}-{n}-{d}.vec           vectors (bincode sidecar)
//! <name>-dim{d}-m{m}-ef{ef}-{n}-{d}.gf.debug.txt  adjacency dump
//! ```
//!
//! [`HnswRanker::init`] loads the graph when it exists and builds it otherwise.

use crate::dataset::{self, check_shape};
use crate::error::Result;
use crate::progress::LogProgress;
use crate::ranker::{Ranker, Scored};
use crate::shared::SharedIndex;
use smallworld_core::storage::{graph_exists, load_index, save_index};
use smallworld_core::{
    DistanceMetric, HnswConfig, HnswIndex, NeighbourHeuristic, RandomSource, SeededRandom,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Items inserted per `add_items` call while building.
pub const BUILD_BATCH_SIZE: usize = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub graph: PathBuf,
    pub vectors: PathBuf,
    pub debug: PathBuf,
}

impl ModelPaths {
    pub fn new(
        model_dir: &Path,
        dataset_name: &str,
        count: usize,
        dimension: usize,
        config: &HnswConfig,
    ) -> Self {
        let stem = format!(
            "{dataset_name}-dim{dimension}-m{}-ef{}-{count}-{dimension}",
            config.m, config.ef_construction
        );
        Self {
            graph: model_dir.join(format!("{stem}.gf")),
            vectors: model_dir.join(format!("{stem}.vec")),
            debug: model_dir.join(format!("{stem}.gf.debug.txt")),
        }
    }
}

/// Build configuration used by [`HnswRanker::init`]: heuristic selection with expansion
/// and pruned-connection backfill, distance cache sized for the whole dataset.
pub fn build_config(m: usize, ef_construction: usize, count: usize) -> HnswConfig {
    HnswConfig {
        neighbour_heuristic: NeighbourHeuristic::Heuristic,
        expand_best_selection: true,
        keep_pruned_connections: true,
        enable_distance_cache: true,
        initial_distance_cache_size: count,
        ..HnswConfig::new(m, ef_construction)
    }
}

/// Ranks seeds with `k_nearest_to_item`; score is `1 - cosine distance`.
pub struct HnswRanker {
    index: SharedIndex,
    vectors: Arc<Vec<Vec<f32>>>,
    paths: ModelPaths,
}

impl HnswRanker {
    /// Loads or builds the model for unit-normalized `vectors` with [`build_config`].
    pub fn init(
        model_dir: &Path,
        dataset_name: &str,
        vectors: Arc<Vec<Vec<f32>>>,
        m: usize,
        ef_construction: usize,
    ) -> Result<Self> {
        let config = build_config(m, ef_construction, vectors.len());
        Self::init_with(
            model_dir,
            dataset_name,
            vectors,
            config,
            &mut SeededRandom::from_entropy(),
        )
    }

    /// [`Self::init`] with an explicit configuration and level generator.
    ///
    /// When the graph file exists, the vectors stored beside it replace `vectors`.
    pub fn init_with(
        model_dir: &Path,
        dataset_name: &str,
        vectors: Arc<Vec<Vec<f32>>>,
        config: HnswConfig,
        rng: &mut dyn RandomSource,
    ) -> Result<Self> {
        let dimension = check_shape(&vectors)?;
        let paths = ModelPaths::new(model_dir, dataset_name, vectors.len(), dimension, &config);

        if graph_exists(&paths.graph) {
            let started = Instant::now();
            let stored = Arc::new(dataset::load_vectors(&paths.vectors)?);
            let index = load_index(
                &paths.graph,
                dimension,
                DistanceMetric::CosineUnit,
                config,
                stored.as_slice(),
            )?;
            info!(
                graph = %paths.graph.display(),
                nodes = index.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "loaded HNSW model"
            );
            return Ok(Self {
                index: SharedIndex::new(index),
                vectors: stored,
                paths,
            });
        }

        let index = build(&vectors, dimension, config, rng)?;
        save_model(&index, &vectors, &paths)?;
        Ok(Self {
            index: SharedIndex::new(index),
            vectors,
            paths,
        })
    }

    pub fn paths(&self) -> &ModelPaths {
        &self.paths
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn vectors(&self) -> &Arc<Vec<Vec<f32>>> {
        &self.vectors
    }
}

fn build(
    vectors: &[Vec<f32>],
    dimension: usize,
    config: HnswConfig,
    rng: &mut dyn RandomSource,
) -> Result<HnswIndex> {
    let mut index = HnswIndex::new(dimension, DistanceMetric::CosineUnit, config)?;
    let started = Instant::now();
    let batches = vectors.len().div_ceil(BUILD_BATCH_SIZE);
    for (i, batch) in vectors.chunks(BUILD_BATCH_SIZE).enumerate() {
        info!(
            batch = i + 1,
            batches,
            items = batch.len(),
            size_after = index.len() + batch.len(),
            "adding batch"
        );
        let progress = LogProgress::new(format!("batch {}/{batches}", i + 1));
        index.add_items_with(batch, rng, Some(&progress), None)?;
    }
    info!(
        nodes = index.len(),
        max_layer = ?index.max_layer(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "built HNSW graph"
    );
    Ok(index)
}

/// Writes the dump, then the vectors, then the graph. A graph file therefore implies
/// its vectors are complete.
fn save_model(index: &HnswIndex, vectors: &[Vec<f32>], paths: &ModelPaths) -> Result<()> {
    if let Some(dir) = paths.graph.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&paths.debug, index.dump())?;
    dataset::save_vectors(&paths.vectors, vectors)?;
    save_index(index, &paths.graph)?;
    Ok(())
}

impl Ranker for HnswRanker {
    fn name(&self) -> &str {
        "hnsw"
    }

    fn rank(&self, seed: usize, k: usize) -> Result<Vec<Scored>> {
        let found = self
            .index
            .search(|index| index.k_nearest_to_item(seed as u32, k))?;
        Ok(found
            .into_iter()
            .map(|n| Scored {
                id: n.id,
                score: DistanceMetric::CosineUnit.similarity(n.distance),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_file_names() {
        let config = HnswConfig::new(12, 100);
        let paths = ModelPaths::new(Path::new("models"), "random", 1000, 32, &config);
        assert_eq!(
            paths.graph,
            Path::new("models").join("random-dim32-m12-ef100-1000-32.gf")
        );
        assert_eq!(
            paths.vectors,
            Path::new("models").join("random-dim32-m12-ef100-1000-32.vec")
        );
        assert_eq!(
            paths.debug,
            Path::new("models").join("random-dim32-m12-ef100-1000-32.gf.debug.txt")
        );
    }

    #[test]
    fn test_build_config() {
        let config = build_config(8, 64, 500);
        assert_eq!(config.m_max0, 16);
        assert_eq!(config.initial_distance_cache_size, 500);
        assert!(config.expand_best_selection);
        assert!(config.keep_pruned_connections);
        assert!(config.validate().is_ok());
    }
}
