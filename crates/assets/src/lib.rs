//! Mesh asset pipeline: decodes binary STL files, computes the normalizing
//! model transform for each mesh, and loads every mesh in a scene directory.
//!
//! # Invariants
//! - Decoded vertices are never deduplicated: triangle `t` owns vertices
//!   `3t..3t+3` and indices equal vertex positions in the buffer.
//! - A file that fails to decode becomes an empty mesh, never a panic.
//! - Normalization is a pure function of vertex positions.

pub mod normalize;
pub mod scene;
pub mod stl;

pub use normalize::{Normalization, NormalizeOptions, UpAxis, normalize};
pub use scene::{LoadedMesh, SceneError, SceneOptions, load_mesh, load_scene, scan_directory};
pub use stl::{DecodeError, Decoded, decode, load};
