//! Reference grid drawn under the scene.

use glam::Vec3;

pub const DEFAULT_CELLS: u16 = 10;
pub const DEFAULT_SIZE: f32 = 10.0;
/// Largest cell count whose `(cells + 1) * 4` vertices fit 16-bit indices.
pub const MAX_CELLS: u16 = (u16::MAX / 4) - 1;
pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineVertex {
    pub position: Vec3,
    pub color: [f32; 4],
}

/// Indexed line list; every consecutive index pair is one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    pub vertices: Vec<LineVertex>,
    pub indices: Vec<u16>,
}

impl GridGeometry {
    /// A square grid on the XZ plane centered on the origin, `cells` cells
    /// across and `size` units wide. `cells` is clamped to `1..=MAX_CELLS`.
    pub fn new(cells: u16, size: f32) -> Self {
        let cells = cells.clamp(1, MAX_CELLS);
        let half = size / 2.0;
        let step = size / cells as f32;
        let lines = (cells as usize + 1) * 2;

        let mut vertices = Vec::with_capacity(lines * 2);
        for i in 0..=cells {
            let z = -half + i as f32 * step;
            vertices.push(Vec3::new(-half, 0.0, z));
            vertices.push(Vec3::new(half, 0.0, z));
        }
        for i in 0..=cells {
            let x = -half + i as f32 * step;
            vertices.push(Vec3::new(x, 0.0, -half));
            vertices.push(Vec3::new(x, 0.0, half));
        }

        let indices = (0..vertices.len() as u16).collect();
        let vertices = vertices
            .into_iter()
            .map(|position| LineVertex {
                position,
                color: WHITE,
            })
            .collect();
        Self { vertices, indices }
    }

    pub fn line_count(&self) -> usize {
        self.indices.len() / 2
    }
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_CELLS, DEFAULT_SIZE)
    }
}
