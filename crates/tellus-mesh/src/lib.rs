//! Leaf-mesh extraction: walks the used leaf nodes and emits a render-ready
//! triangle soup with derived normals.
//!
//! Extraction is read-only over the shared tree and may run serially or
//! split across worker threads in contiguous node-index ranges; leaf
//! geometry is immutable for as long as the caller holds the read guard.

mod extract;
mod vertex;

pub use extract::{default_worker_count, extract_mesh, extract_mesh_parallel};
pub use vertex::{TerrainMesh, TerrainVertex};
