use crate::backend::{GpuBackend, MeshHandle};
use crate::camera::CameraController;
use crate::grid::GridGeometry;
use glam::Mat4;
use meshview_assets::LoadedMesh;

/// A mesh resident on the backend, with its cached model transform.
#[derive(Debug, Clone)]
pub struct SceneMesh {
    pub name: String,
    pub handle: MeshHandle,
    pub model: Mat4,
    pub index_count: u32,
}

/// Owns the draw list: the grid first, then each uploaded mesh.
#[derive(Debug, Default)]
pub struct SceneAssembler {
    meshes: Vec<SceneMesh>,
    skipped: Vec<String>,
}

impl SceneAssembler {
    /// Upload the grid. The scene starts with no meshes.
    pub fn new<B: GpuBackend>(backend: &mut B, grid: &GridGeometry) -> Result<Self, B::Error> {
        backend.upload_grid(grid)?;
        Ok(Self::default())
    }

    /// Replace every uploaded mesh with `loaded`. Empty meshes (files that
    /// failed to decode) are kept out of the draw list.
    pub fn reload<B: GpuBackend>(
        &mut self,
        backend: &mut B,
        loaded: &[LoadedMesh],
    ) -> Result<(), B::Error> {
        backend.release_meshes();
        self.meshes.clear();
        self.skipped.clear();

        for mesh in loaded {
            if mesh.mesh.is_empty() {
                self.skipped.push(mesh.name.clone());
                continue;
            }
            let handle = backend.upload_mesh(&mesh.mesh)?;
            self.meshes.push(SceneMesh {
                name: mesh.name.clone(),
                handle,
                model: mesh.model_matrix(),
                index_count: mesh.mesh.index_count(),
            });
        }
        tracing::debug!(
            "scene holds {} meshes, {} skipped",
            self.meshes.len(),
            self.skipped.len()
        );
        Ok(())
    }

    pub fn meshes(&self) -> &[SceneMesh] {
        &self.meshes
    }

    /// Names of meshes that loaded empty and are not drawn.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Grid plus one draw per mesh.
    pub fn draw_count(&self) -> usize {
        1 + self.meshes.len()
    }

    /// Issue the draw sequence. The shared MVP slot is rewritten right
    /// before each draw, so the order here is the order on the GPU.
    pub fn record_draws<B: GpuBackend>(
        &self,
        backend: &mut B,
        camera: &CameraController,
    ) -> Result<usize, B::Error> {
        backend.write_mvp(&camera.view_projection(Mat4::IDENTITY))?;
        backend.draw_grid()?;
        for mesh in &self.meshes {
            backend.write_mvp(&camera.view_projection(mesh.model))?;
            backend.draw_mesh(mesh.handle)?;
        }
        Ok(self.draw_count())
    }
}
