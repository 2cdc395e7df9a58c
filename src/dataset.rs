//! Dataset helpers: synthetic vectors, normalization, and on-disk vector formats.
//!
//! Two formats are supported:
//! - raw: `u32 count, u32 dim`, then `count * dim` little-endian `f32` values;
//! - sidecar: a bincode [`VectorSidecar`] written next to a saved graph so the graph
//!   can be reloaded with the exact vectors it was built over.

use crate::error::{BenchError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smallworld_core::vector_ops;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// `n` vectors of `dim` uniform `[0, 1)` components from a seeded generator.
pub fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
        .collect()
}

/// `count` distinct item indices out of `n`, drawn with a seeded generator.
/// Returns all `n` indices when `count >= n`.
pub fn pick_seeds(n: usize, count: usize, seed: u64) -> Vec<usize> {
    if count >= n {
        return (0..n).collect();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    rand::seq::index::sample(&mut rng, n, count).into_vec()
}

/// Normalizes every vector to unit length in place. Zero vectors are left as is.
pub fn normalize_all(vectors: &mut [Vec<f32>]) {
    for v in vectors.iter_mut() {
        vector_ops::normalize(v);
    }
}

/// Checks that `vectors` is non-empty and rectangular. Returns the dimension.
pub fn check_shape(vectors: &[Vec<f32>]) -> Result<usize> {
    let dim = vectors
        .first()
        .map(Vec::len)
        .ok_or_else(|| BenchError::InvalidDataset("no vectors".to_string()))?;
    if dim == 0 {
        return Err(BenchError::InvalidDataset("zero-dimensional vectors".to_string()));
    }
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(BenchError::InvalidDataset(format!(
            "vector {i} has {} components, expected {dim}",
            v.len()
        )));
    }
    Ok(dim)
}

/// Reads the raw `u32 count, u32 dim, f32...` format.
pub fn read_vectors<R: Read>(mut reader: R) -> Result<Vec<Vec<f32>>> {
    let truncated = |e: io::Error| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            BenchError::InvalidDataset("truncated vector file".to_string())
        } else {
            BenchError::Io(e)
        }
    };
    let count = reader.read_u32::<LittleEndian>().map_err(truncated)? as usize;
    let dim = reader.read_u32::<LittleEndian>().map_err(truncated)? as usize;
    if dim == 0 && count > 0 {
        return Err(BenchError::InvalidDataset("zero-dimensional vectors".to_string()));
    }

    let mut vectors = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        let mut v = vec![0f32; dim];
        reader
            .read_f32_into::<LittleEndian>(&mut v)
            .map_err(truncated)?;
        vectors.push(v);
    }
    Ok(vectors)
}

pub fn read_vectors_file(path: &Path) -> Result<Vec<Vec<f32>>> {
    let vectors = read_vectors(BufReader::new(File::open(path)?))?;
    tracing::info!(path = %path.display(), count = vectors.len(), "loaded vectors");
    Ok(vectors)
}

/// Writes the raw `u32 count, u32 dim, f32...` format.
pub fn write_vectors<W: Write>(mut writer: W, vectors: &[Vec<f32>]) -> Result<()> {
    let dim = if vectors.is_empty() {
        0
    } else {
        check_shape(vectors)?
    };
    writer.write_u32::<LittleEndian>(vectors.len() as u32)?;
    writer.write_u32::<LittleEndian>(dim as u32)?;
    for v in vectors {
        for &x in v {
            writer.write_f32::<LittleEndian>(x)?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_vectors_file(path: &Path, vectors: &[Vec<f32>]) -> Result<()> {
    write_vectors(BufWriter::new(File::create(path)?), vectors)
}

/// Vectors persisted alongside a graph, with their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSidecar {
    pub count: usize,
    pub dimension: usize,
    pub vectors: Vec<Vec<f32>>,
}

pub fn save_vectors(path: &Path, vectors: &[Vec<f32>]) -> Result<()> {
    let dimension = check_shape(vectors)?;
    let sidecar = VectorSidecar {
        count: vectors.len(),
        dimension,
        vectors: vectors.to_vec(),
    };
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, &sidecar)?;
    writer.flush()?;
    Ok(())
}

pub fn load_vectors(path: &Path) -> Result<Vec<Vec<f32>>> {
    let sidecar: VectorSidecar = bincode::deserialize_from(BufReader::new(File::open(path)?))?;
    if sidecar.vectors.len() != sidecar.count {
        return Err(BenchError::InvalidDataset(format!(
            "sidecar declares {} vectors but holds {}",
            sidecar.count,
            sidecar.vectors.len()
        )));
    }
    if check_shape(&sidecar.vectors)? != sidecar.dimension {
        return Err(BenchError::InvalidDataset(format!(
            "sidecar declares dimension {}",
            sidecar.dimension
        )));
    }
    Ok(sidecar.vectors)
}
