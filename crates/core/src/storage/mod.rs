//! Storage layer: graph serialization and file persistence.
//!
//! The binary format is explicit and versioned (see [`persistence`]); vectors are not
//! part of it. Files are written with atomic temp-file + rename.

/// Graph serialize/deserialize and atomic save/load.
pub mod persistence;

pub use persistence::{graph_exists, load_index, save_index};
