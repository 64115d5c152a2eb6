use bytemuck::{Pod, Zeroable};
use meshview_common::Vertex;
use meshview_render::{LineVertex, Mvp};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct GpuVertex {
    position: [f32; 3],
    normal: [f32; 3],
    barycentric: [f32; 3],
    bone_indices: [i32; 4],
    bone_weights: [f32; 4],
}

impl From<&Vertex> for GpuVertex {
    fn from(v: &Vertex) -> Self {
        Self {
            position: v.position.to_array(),
            normal: v.normal.to_array(),
            barycentric: v.barycentric.to_array(),
            bone_indices: v.bone_indices,
            bone_weights: v.bone_weights,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct GpuLineVertex {
    position: [f32; 3],
    color: [f32; 4],
}

impl From<&LineVertex> for GpuLineVertex {
    fn from(v: &LineVertex) -> Self {
        Self {
            position: v.position.to_array(),
            color: v.color,
        }
    }
}

/// Layout of the shared uniform slot.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct GpuMvp {
    model: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
}

impl GpuMvp {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

impl From<&Mvp> for GpuMvp {
    fn from(mvp: &Mvp) -> Self {
        Self {
            model: mvp.model.to_cols_array_2d(),
            view: mvp.view.to_cols_array_2d(),
            projection: mvp.projection.to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    #[test]
    fn sizes_match_shader_layouts() {
        assert_eq!(std::mem::size_of::<GpuVertex>(), 68);
        assert_eq!(std::mem::size_of::<GpuLineVertex>(), 28);
        assert_eq!(GpuMvp::SIZE, 192);
    }

    #[test]
    fn mvp_is_column_major() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let mvp = Mvp {
            model,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        let gpu = GpuMvp::from(&mvp);
        assert_eq!(gpu.model[3], [1.0, 2.0, 3.0, 1.0]);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&gpu));
        assert_eq!(&floats[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn vertex_keeps_bone_data() {
        let v = Vertex::new(Vec3::X, Vec3::Y, Vec3::Z);
        let gpu = GpuVertex::from(&v);
        assert_eq!(gpu.bone_weights, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(gpu.barycentric, [0.0, 0.0, 1.0]);
    }
}
