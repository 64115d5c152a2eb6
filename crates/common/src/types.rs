use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Largest vertex count addressable with 16-bit indices.
pub const MAX_INDEXED_VERTICES: usize = u16::MAX as usize + 1;

/// A single mesh vertex as produced by the decoder.
///
/// Bone indices and weights are carried for a future skinning pass and are
/// always "100% bone 0"; nothing in the viewer drives them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    /// Corner weight used by the edge-highlight shading pass.
    pub barycentric: Vec3,
    pub bone_indices: [i32; 4],
    pub bone_weights: [f32; 4],
}

impl Vertex {
    /// Corner weights assigned to the three vertices of every triangle.
    pub const CORNERS: [Vec3; 3] = [Vec3::X, Vec3::Y, Vec3::Z];

    pub fn new(position: Vec3, normal: Vec3, barycentric: Vec3) -> Self {
        Self {
            position,
            normal,
            barycentric,
            bone_indices: [0; 4],
            bone_weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Decoded, immutable triangle data: one vertex per triangle corner and
/// monotonically increasing 16-bit indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl MeshData {
    /// The "no mesh" value callers fall back to when decoding fails.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices.iter().map(|v| v.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_vertex_is_bound_to_bone_zero() {
        let v = Vertex::new(Vec3::ONE, Vec3::Y, Vec3::X);
        assert_eq!(v.bone_indices, [0, 0, 0, 0]);
        assert_eq!(v.bone_weights, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_mesh_has_no_triangles() {
        let mesh = MeshData::empty();
        assert!(mesh.is_empty());
        assert_eq!(mesh.triangle_count(), 0);
        assert_eq!(mesh.vertex_count(), 0);
    }

    #[test]
    fn index_ceiling_matches_u16_range() {
        assert_eq!(MAX_INDEXED_VERTICES, 65_536);
    }
}
