//! Graph persistence in a versioned, checksummed little-endian layout.
//!
//! Only topology is written (node layers, neighbor lists, entry point). Item vectors
//! are supplied again by the caller on load, in the same id order.
//!
//! ```text
//! magic "SWG1" | version u32 | node_count u32 | entry i32 (-1 = empty)
//! per node: id u32 | max_layer u32 | per layer: count u32, ids [u32; count]
//! crc32 u32 over every preceding byte
//! ```
//!
//! File writes use atomic temp-file + rename to prevent corruption on crash.

use crate::config::{GRAPH_FORMAT_VERSION, GRAPH_MAGIC};
use crate::error::{HnswError, Result};
use crate::hnsw::distance::Distance;
use crate::hnsw::graph::{GraphCore, HnswConfig, ItemStore, Topology};
use crate::hnsw::index::{HnswIndex, IndexState};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};

/// magic + version + node_count + entry
const HEADER_LEN: usize = 16;
const FOOTER_LEN: usize = 4;

fn corrupt(msg: impl Into<String>) -> HnswError {
    HnswError::Corruption(msg.into())
}

impl<D: Distance> HnswIndex<D> {
    /// Writes the graph topology to `writer`.
    ///
    /// Fails with [`HnswError::IncompleteBuild`] if a batch was interrupted.
    pub fn serialize<W: Write>(&self, mut writer: W) -> Result<()> {
        self.ensure_usable()?;
        let topology = self.core().topology();
        let mut buf: Vec<u8> = Vec::with_capacity(HEADER_LEN + topology.len() * 64);

        buf.write_all(GRAPH_MAGIC)?;
        buf.write_u32::<LittleEndian>(GRAPH_FORMAT_VERSION)?;
        buf.write_u32::<LittleEndian>(topology.len() as u32)?;
        buf.write_i32::<LittleEndian>(self.entry_point().map_or(-1, |ep| ep as i32))?;

        for id in 0..topology.len() as u32 {
            let top = topology.layer(id);
            buf.write_u32::<LittleEndian>(id)?;
            buf.write_u32::<LittleEndian>(top as u32)?;
            for layer in 0..=top {
                let list = topology.neighbors(id, layer);
                buf.write_u32::<LittleEndian>(list.len() as u32)?;
                for &n in list {
                    buf.write_u32::<LittleEndian>(n)?;
                }
            }
        }

        let crc = crc32fast::hash(&buf);
        buf.write_u32::<LittleEndian>(crc)?;
        writer.write_all(&buf)?;
        writer.flush()?;
        Ok(())
    }

    /// Rebuilds an index from a serialized graph and the item vectors it was built over.
    ///
    /// `items[i]` must be the vector that was item `i` when the graph was saved; this
    /// correspondence cannot be verified. Any malformed input fails the whole load.
    pub fn deserialize<R: Read, V: AsRef<[f32]>>(
        dimension: usize,
        distance: D,
        config: HnswConfig,
        items: &[V],
        mut reader: R,
    ) -> Result<Self> {
        // Validates dimension and config before touching the stream.
        let empty = HnswIndex::new(dimension, distance, config)?;

        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        if raw.len() < HEADER_LEN + FOOTER_LEN {
            return Err(corrupt(format!("stream too short ({} bytes)", raw.len())));
        }
        if &raw[..4] != GRAPH_MAGIC {
            return Err(corrupt("bad magic"));
        }
        let version = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        if version != GRAPH_FORMAT_VERSION {
            return Err(HnswError::UnsupportedVersion(version));
        }

        let (payload, footer) = raw.split_at(raw.len() - FOOTER_LEN);
        let stored_crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        let computed_crc = crc32fast::hash(payload);
        if stored_crc != computed_crc {
            return Err(corrupt(format!(
                "CRC32 mismatch: expected {stored_crc:#010x}, got {computed_crc:#010x}"
            )));
        }

        let (topology, entry_point) =
            decode_topology(&payload[8..], empty.config().max_layers).map_err(|e| match e {
                HnswError::Io(io) => HnswError::from_read(io),
                other => other,
            })?;

        let oversized = (0..topology.len() as u32)
            .flat_map(|id| (0..=topology.layer(id)).map(move |layer| (id, layer)))
            .filter(|&(id, layer)| {
                topology.neighbors(id, layer).len() > empty.config().capacity(layer)
            })
            .count();
        if oversized > 0 {
            tracing::warn!(
                oversized,
                m = empty.config().m,
                m_max0 = empty.config().m_max0,
                "loaded graph has neighbor lists above the configured capacity"
            );
        }

        if items.len() != topology.len() {
            return Err(corrupt(format!(
                "graph has {} nodes but {} items were supplied",
                topology.len(),
                items.len()
            )));
        }
        let mut store = ItemStore::new(dimension);
        store.check_dimensions(items)?;
        for item in items {
            store.push(item.as_ref());
        }

        let HnswIndex {
            config, distance, ..
        } = empty;
        let index = HnswIndex::from_core(
            config,
            distance,
            GraphCore::from_parts(store, topology),
            entry_point,
        );
        debug_assert!(index.state() != IndexState::Building);
        Ok(index)
    }
}

/// Parses everything between the version field and the CRC footer.
fn decode_topology(body: &[u8], max_layers: usize) -> Result<(Topology, Option<u32>)> {
    let mut cursor = Cursor::new(body);
    let node_count = cursor.read_u32::<LittleEndian>()? as usize;
    let entry = cursor.read_i32::<LittleEndian>()?;

    // Every node takes at least 12 bytes (id, max_layer, one count).
    let remaining = body.len().saturating_sub(cursor.position() as usize);
    if node_count > remaining / 12 {
        return Err(corrupt(format!(
            "node count {node_count} exceeds stream length"
        )));
    }

    let mut neighbors = Vec::with_capacity(node_count);
    let mut layers = Vec::with_capacity(node_count);
    for expected in 0..node_count as u32 {
        let id = cursor.read_u32::<LittleEndian>()?;
        if id != expected {
            return Err(corrupt(format!("node id {id} out of order, expected {expected}")));
        }
        let top = cursor.read_u32::<LittleEndian>()? as usize;
        if top >= max_layers {
            return Err(corrupt(format!(
                "node {id} has layer {top}, limit is {}",
                max_layers - 1
            )));
        }
        let mut per_layer = Vec::with_capacity(top + 1);
        for _ in 0..=top {
            let count = cursor.read_u32::<LittleEndian>()? as usize;
            if count > node_count {
                return Err(corrupt(format!(
                    "node {id} lists {count} neighbors in a graph of {node_count}"
                )));
            }
            let mut list = Vec::with_capacity(count);
            for _ in 0..count {
                let n = cursor.read_u32::<LittleEndian>()?;
                if n as usize >= node_count {
                    return Err(corrupt(format!(
                        "node {id} references missing node {n}"
                    )));
                }
                list.push(n);
            }
            per_layer.push(list);
        }
        neighbors.push(per_layer);
        layers.push(top as u8);
    }

    if (cursor.position() as usize) != body.len() {
        return Err(corrupt("trailing bytes after last node"));
    }
    check_links(&neighbors, &layers)?;

    let entry_point = match (entry, node_count) {
        (-1, 0) => None,
        (-1, _) => return Err(corrupt("non-empty graph without entry point")),
        (_, 0) => return Err(corrupt(format!("entry point {entry} in an empty graph"))),
        (e, n) if e < 0 || e as usize >= n => {
            return Err(corrupt(format!("entry point {e} out of range")))
        }
        (e, _) => {
            let top = layers.iter().copied().max().unwrap_or(0);
            if layers[e as usize] != top {
                return Err(corrupt(format!(
                    "entry point {e} is not on the top layer {top}"
                )));
            }
            Some(e as u32)
        }
    };

    Ok((Topology::from_parts(neighbors, layers), entry_point))
}

/// Every link on layer `l` must point at a different node that also lives on `l`,
/// at most once per list.
fn check_links(neighbors: &[Vec<Vec<u32>>], layers: &[u8]) -> Result<()> {
    let mut seen = Vec::new();
    for (id, per_layer) in neighbors.iter().enumerate() {
        for (layer, list) in per_layer.iter().enumerate() {
            for &n in list {
                if n as usize == id {
                    return Err(corrupt(format!("node {id} links itself on layer {layer}")));
                }
                if (layers[n as usize] as usize) < layer {
                    return Err(corrupt(format!(
                        "node {id} links {n} on layer {layer} above its top layer {}",
                        layers[n as usize]
                    )));
                }
            }
            seen.clear();
            seen.extend_from_slice(list);
            seen.sort_unstable();
            if let Some(pair) = seen.windows(2).find(|w| w[0] == w[1]) {
                return Err(corrupt(format!(
                    "node {id} lists {} twice on layer {layer}",
                    pair[0]
                )));
            }
        }
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Save an index graph to `path` with an atomic write.
pub fn save_index<D: Distance>(index: &HnswIndex<D>, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp_path = temp_path(path);

    // Atomic write: write to temp, then rename
    {
        let file = fs::File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        index.serialize(&mut writer)?;
        writer
            .into_inner()
            .map_err(|e| HnswError::Io(e.into_error()))?
            .sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    tracing::info!(
        path = %path.display(),
        nodes = index.len(),
        "saved graph"
    );
    Ok(())
}

/// Load an index graph from `path`, pairing it with `items`.
pub fn load_index<D: Distance, V: AsRef<[f32]>>(
    path: &Path,
    dimension: usize,
    distance: D,
    config: HnswConfig,
    items: &[V],
) -> Result<HnswIndex<D>> {
    let file = fs::File::open(path)?;
    let index = HnswIndex::deserialize(dimension, distance, config, items, BufReader::new(file))
        .map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to load graph");
            e
        })?;
    tracing::info!(
        path = %path.display(),
        nodes = index.len(),
        max_layer = ?index.max_layer(),
        "loaded graph"
    );
    Ok(index)
}

/// `true` if `path` exists and is a readable file.
pub fn graph_exists(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
