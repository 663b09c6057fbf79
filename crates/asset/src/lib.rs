//! Walk-mesh resource loading.
//! Chunked little-endian container plus the named `WalkMeshes` collection.

pub mod chunk;
pub mod walkmeshes;

pub use walkmeshes::{IndexEntry, WalkMeshes};
