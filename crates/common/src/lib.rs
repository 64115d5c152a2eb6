//! Shared types for the mesh viewer: vertices, decoded mesh data, bounds and
//! viewport sizes.

mod bounds;
mod types;
mod viewport;

pub use bounds::Aabb;
pub use types::{MAX_INDEXED_VERTICES, MeshData, Vertex};
pub use viewport::Viewport;
