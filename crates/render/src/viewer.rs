use crate::backend::GpuBackend;
use crate::bridge::{BridgeError, FrameBridge, FrameReport, Presenter};
use crate::camera::{CameraController, CameraSettings};
use crate::grid::GridGeometry;
use crate::scene::SceneAssembler;
use meshview_assets::LoadedMesh;
use meshview_common::Viewport;
use meshview_input::{Bindings, InputState};

/// Everything one viewer session owns: backend, camera, input and scene.
pub struct Viewer<B: GpuBackend> {
    bridge: FrameBridge<B>,
    scene: SceneAssembler,
    camera: CameraController,
    input: InputState,
    bindings: Bindings,
}

impl<B: GpuBackend> Viewer<B> {
    pub fn new(
        mut backend: B,
        viewport: Viewport,
        camera: CameraSettings,
        bindings: Bindings,
    ) -> Result<Self, BridgeError<B::Error>> {
        let scene =
            SceneAssembler::new(&mut backend, &GridGeometry::default()).map_err(BridgeError::Backend)?;
        let bridge = FrameBridge::new(backend, viewport)?;
        Ok(Self {
            bridge,
            scene,
            camera: CameraController::new(camera, viewport.aspect_ratio()),
            input: InputState::new(),
            bindings,
        })
    }

    /// Replace the scene's meshes.
    pub fn load(&mut self, meshes: &[LoadedMesh]) -> Result<(), BridgeError<B::Error>> {
        self.scene
            .reload(self.bridge.backend_mut(), meshes)
            .map_err(BridgeError::Backend)
    }

    pub fn resize(&mut self, viewport: Viewport) -> Result<(), BridgeError<B::Error>> {
        self.bridge.resize(viewport, &mut self.camera)
    }

    /// Advance the camera by `dt` seconds of input, then render and bridge.
    pub fn frame(
        &mut self,
        dt: f32,
        presenter: &mut dyn Presenter,
    ) -> Result<FrameReport, BridgeError<B::Error>> {
        self.camera.update(dt, &self.input, &self.bindings);
        self.bridge
            .render_frame(&self.scene, &self.camera, &mut self.input, presenter)
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn reset_camera(&mut self) {
        self.camera.reset();
    }

    pub fn scene(&self) -> &SceneAssembler {
        &self.scene
    }

    pub fn viewport(&self) -> Viewport {
        self.bridge.viewport()
    }

    pub fn bridge(&self) -> &FrameBridge<B> {
        &self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::CpuBitmap;
    use crate::recording::RecordingBackend;
    use glam::{Mat4, Vec2, Vec3};
    use meshview_assets::Normalization;
    use meshview_common::{MeshData, Vertex};
    use meshview_input::{Key, MouseButton};
    use std::path::PathBuf;

    #[derive(Default)]
    struct Counter {
        presented: usize,
        redraws: usize,
    }

    impl Presenter for Counter {
        fn present(&mut self, _bitmap: &CpuBitmap) {
            self.presented += 1;
        }

        fn request_redraw(&mut self) {
            self.redraws += 1;
        }
    }

    fn loaded(name: &str, empty: bool) -> LoadedMesh {
        let mesh = if empty {
            MeshData::empty()
        } else {
            let vertices = Vertex::CORNERS
                .iter()
                .map(|&b| Vertex::new(b, Vec3::Z, b))
                .collect();
            MeshData {
                vertices,
                indices: vec![0, 1, 2],
            }
        };
        LoadedMesh {
            name: name.to_string(),
            path: PathBuf::from(format!("{name}.stl")),
            mesh,
            normalization: Normalization::IDENTITY,
        }
    }

    fn viewer() -> Viewer<RecordingBackend> {
        Viewer::new(
            RecordingBackend::new(),
            Viewport::new(8, 6),
            CameraSettings::default(),
            Bindings::default(),
        )
        .unwrap()
    }

    #[test]
    fn empty_meshes_are_not_drawn() {
        let mut viewer = viewer();
        viewer
            .load(&[loaded("a", false), loaded("broken", true), loaded("b", false)])
            .unwrap();
        assert_eq!(viewer.scene().meshes().len(), 2);
        assert_eq!(viewer.scene().skipped(), ["broken".to_string()]);

        let report = viewer.frame(0.016, &mut Counter::default()).unwrap();
        assert_eq!(report.draws, 3);
    }

    #[test]
    fn scene_without_meshes_still_draws_grid() {
        let mut viewer = viewer();
        viewer.load(&[loaded("broken", true)]).unwrap();
        let report = viewer.frame(0.016, &mut Counter::default()).unwrap();
        assert_eq!(report.draws, 1);
    }

    #[test]
    fn camera_consumes_delta_before_it_is_cleared() {
        let mut viewer = viewer();
        viewer.input_mut().set_mouse_button(MouseButton::Primary, true);
        viewer.input_mut().accumulate_mouse_delta(Vec2::new(20.0, 0.0));

        viewer.frame(0.016, &mut Counter::default()).unwrap();
        assert!((viewer.camera().yaw() - 0.2).abs() < 1e-5);

        viewer.frame(0.016, &mut Counter::default()).unwrap();
        assert!((viewer.camera().yaw() - 0.2).abs() < 1e-5);
    }

    #[test]
    fn reload_replaces_meshes() {
        let mut viewer = viewer();
        viewer.load(&[loaded("a", false), loaded("b", false)]).unwrap();
        viewer.load(&[loaded("c", false)]).unwrap();
        assert_eq!(viewer.scene().meshes().len(), 1);
        assert_eq!(viewer.bridge().backend().mesh_count(), 1);
        assert_eq!(viewer.scene().meshes()[0].model, Mat4::IDENTITY);
    }

    #[test]
    fn reset_camera_after_flying() {
        let mut viewer = viewer();
        viewer.input_mut().set_key(Key::W, true);
        viewer.frame(1.0, &mut Counter::default()).unwrap();
        assert_ne!(viewer.camera().position(), CameraSettings::default().position);
        viewer.reset_camera();
        assert_eq!(viewer.camera().position(), CameraSettings::default().position);
    }

    #[test]
    fn every_frame_requests_redraw() {
        let mut viewer = viewer();
        let mut counter = Counter::default();
        for _ in 0..3 {
            viewer.frame(0.016, &mut counter).unwrap();
        }
        assert_eq!(counter.redraws, 3);
        assert_eq!(counter.presented, 2);
    }
}
