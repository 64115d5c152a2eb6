use crate::backend::{ClearValues, GpuBackend};
use crate::bitmap::{BitmapError, CpuBitmap, StagingLayout};
use crate::camera::CameraController;
use crate::scene::SceneAssembler;
use meshview_common::Viewport;
use meshview_input::InputState;

/// Staging targets in the readback ring. The CPU reads the slot written one
/// frame earlier, whose GPU work has completed by the time it is mapped.
pub const STAGING_SLOTS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError<E: std::error::Error + 'static> {
    #[error("GPU backend failed: {0}")]
    Backend(#[source] E),
    #[error(transparent)]
    Bitmap(#[from] BitmapError),
}

/// UI-side consumer of finished frames.
pub trait Presenter {
    fn present(&mut self, bitmap: &CpuBitmap);
    fn request_redraw(&mut self);
}

/// Outcome of one [`FrameBridge::render_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    /// Draws issued, grid included.
    pub draws: usize,
    /// False until the ring holds a completed frame.
    pub presented: bool,
}

/// Drives a [`GpuBackend`] through the per-frame sequence and moves the
/// rendered pixels into a [`CpuBitmap`] without a presentation surface.
pub struct FrameBridge<B: GpuBackend> {
    backend: B,
    viewport: Viewport,
    layout: StagingLayout,
    bitmap: CpuBitmap,
    clear: ClearValues,
    frame: u64,
    completed: [bool; STAGING_SLOTS],
}

impl<B: GpuBackend> FrameBridge<B> {
    pub fn new(mut backend: B, viewport: Viewport) -> Result<Self, BridgeError<B::Error>> {
        let layout = backend
            .recreate_frame_targets(viewport, STAGING_SLOTS)
            .map_err(BridgeError::Backend)?;
        tracing::debug!(
            "frame targets {}x{} (row pitch {})",
            viewport.width,
            viewport.height,
            layout.row_pitch
        );
        Ok(Self {
            backend,
            viewport,
            layout,
            bitmap: CpuBitmap::new(viewport),
            clear: ClearValues::default(),
            frame: 0,
            completed: [false; STAGING_SLOTS],
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn bitmap(&self) -> &CpuBitmap {
        &self.bitmap
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Recreate every size-dependent resource at `viewport` and update the
    /// camera's aspect ratio. Staged frames from the old size are discarded.
    pub fn resize(
        &mut self,
        viewport: Viewport,
        camera: &mut CameraController,
    ) -> Result<(), BridgeError<B::Error>> {
        if viewport == self.viewport {
            return Ok(());
        }
        self.layout = self
            .backend
            .recreate_frame_targets(viewport, STAGING_SLOTS)
            .map_err(BridgeError::Backend)?;
        self.bitmap = CpuBitmap::new(viewport);
        self.completed = [false; STAGING_SLOTS];
        self.viewport = viewport;
        camera.update_aspect_ratio(viewport.aspect_ratio());
        tracing::debug!("resized frame targets to {}x{}", viewport.width, viewport.height);
        Ok(())
    }

    /// Record, submit and bridge one frame.
    ///
    /// The bitmap handed to `presenter` is the frame submitted on the
    /// previous call; the very first frame presents nothing. The input
    /// delta is cleared last, after the camera has already consumed it.
    pub fn render_frame(
        &mut self,
        scene: &SceneAssembler,
        camera: &CameraController,
        input: &mut InputState,
        presenter: &mut dyn Presenter,
    ) -> Result<FrameReport, BridgeError<B::Error>> {
        let _span = tracing::info_span!("frame", n = self.frame).entered();
        let write_slot = (self.frame % STAGING_SLOTS as u64) as usize;
        let read_slot = (write_slot + 1) % STAGING_SLOTS;

        self.backend
            .begin_frame(self.clear, scene.draw_count())
            .map_err(BridgeError::Backend)?;
        self.backend
            .set_viewport(self.viewport)
            .map_err(BridgeError::Backend)?;
        let draws = scene
            .record_draws(&mut self.backend, camera)
            .map_err(BridgeError::Backend)?;
        self.backend
            .copy_to_staging(write_slot)
            .map_err(BridgeError::Backend)?;
        self.backend.submit().map_err(BridgeError::Backend)?;
        self.completed[write_slot] = true;

        let presented = self.completed[read_slot];
        if presented {
            let mut copied = Ok(());
            let bitmap = &mut self.bitmap;
            let layout = &self.layout;
            self.backend
                .read_staging(read_slot, &mut |bytes| {
                    copied = bitmap.copy_from_staging(bytes, layout);
                })
                .map_err(BridgeError::Backend)?;
            copied?;
            presenter.present(&self.bitmap);
        }
        presenter.request_redraw();
        input.clear_delta();

        let report = FrameReport {
            frame: self.frame,
            draws,
            presented,
        };
        self.frame += 1;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraSettings;
    use crate::grid::GridGeometry;
    use crate::recording::{Command, RecordingBackend};
    use glam::{Mat4, Vec2, Vec3};
    use meshview_assets::{LoadedMesh, Normalization};
    use meshview_common::{MeshData, Vertex};
    use std::path::PathBuf;

    #[derive(Default)]
    struct Capture {
        frames: Vec<Vec<u8>>,
        redraws: usize,
    }

    impl Presenter for Capture {
        fn present(&mut self, bitmap: &CpuBitmap) {
            self.frames.push(bitmap.pixels().to_vec());
        }

        fn request_redraw(&mut self) {
            self.redraws += 1;
        }
    }

    fn triangle_mesh(offset: Vec3) -> LoadedMesh {
        let vertices = Vertex::CORNERS
            .iter()
            .map(|&b| Vertex::new(b, Vec3::Z, b))
            .collect();
        LoadedMesh {
            name: "tri".into(),
            path: PathBuf::from("tri.stl"),
            mesh: MeshData {
                vertices,
                indices: vec![0, 1, 2],
            },
            normalization: Normalization {
                center: -offset,
                ..Normalization::IDENTITY
            },
        }
    }

    struct Rig {
        bridge: FrameBridge<RecordingBackend>,
        scene: SceneAssembler,
        camera: CameraController,
        input: InputState,
    }

    fn rig(backend: RecordingBackend, viewport: Viewport, meshes: &[LoadedMesh]) -> Rig {
        let mut backend = backend;
        let mut scene = SceneAssembler::new(&mut backend, &GridGeometry::default()).unwrap();
        scene.reload(&mut backend, meshes).unwrap();
        let mut bridge = FrameBridge::new(backend, viewport).unwrap();
        bridge.backend_mut().take_commands();
        Rig {
            bridge,
            scene,
            camera: CameraController::new(CameraSettings::default(), viewport.aspect_ratio()),
            input: InputState::new(),
        }
    }

    impl Rig {
        fn frame(&mut self, presenter: &mut Capture) -> FrameReport {
            self.bridge
                .render_frame(&self.scene, &self.camera, &mut self.input, presenter)
                .unwrap()
        }
    }

    #[test]
    fn frame_commands_follow_the_fixed_order() {
        let mesh = triangle_mesh(Vec3::new(1.0, 0.0, 0.0));
        let model = mesh.model_matrix();
        let mut rig = rig(RecordingBackend::new(), Viewport::new(4, 4), &[mesh]);
        let mut capture = Capture::default();

        rig.frame(&mut capture);
        let handle = rig.scene.meshes()[0].handle;
        assert_eq!(
            rig.bridge.backend_mut().take_commands(),
            vec![
                Command::BeginFrame { draws: 2 },
                Command::SetViewport(Viewport::new(4, 4)),
                Command::WriteMvp {
                    model: Mat4::IDENTITY
                },
                Command::DrawGrid,
                Command::WriteMvp { model },
                Command::DrawMesh(handle),
                Command::CopyToStaging(0),
                Command::Submit,
            ]
        );

        rig.frame(&mut capture);
        let second = rig.bridge.backend_mut().take_commands();
        assert_eq!(
            &second[second.len() - 3..],
            &[
                Command::CopyToStaging(1),
                Command::Submit,
                Command::ReadStaging(0)
            ]
        );
    }

    #[test]
    fn presented_bitmap_lags_one_frame() {
        let mut rig = rig(RecordingBackend::new(), Viewport::new(2, 2), &[]);
        let mut capture = Capture::default();

        let first = rig.frame(&mut capture);
        assert!(!first.presented);
        assert!(capture.frames.is_empty());
        assert_eq!(capture.redraws, 1);

        for _ in 0..3 {
            assert!(rig.frame(&mut capture).presented);
        }
        // Frame n is filled with byte n (1-based); each present shows the
        // frame before the one just submitted.
        let firsts: Vec<u8> = capture.frames.iter().map(|f| f[0]).collect();
        assert_eq!(firsts, vec![1, 2, 3]);
        assert!(capture.frames[2].iter().all(|&b| b == 3));
    }

    #[test]
    fn slots_alternate() {
        let mut rig = rig(RecordingBackend::new(), Viewport::new(2, 2), &[]);
        let mut capture = Capture::default();
        let mut copies = Vec::new();
        for _ in 0..4 {
            rig.frame(&mut capture);
            for command in rig.bridge.backend_mut().take_commands() {
                if let Command::CopyToStaging(slot) = command {
                    copies.push(slot);
                }
            }
        }
        assert_eq!(copies, vec![0, 1, 0, 1]);
    }

    #[test]
    fn resize_recreates_all_targets_together() {
        let mut rig = rig(RecordingBackend::new(), Viewport::new(800, 600), &[]);
        let mut capture = Capture::default();
        rig.frame(&mut capture);
        rig.frame(&mut capture);

        let small = Viewport::new(400, 300);
        rig.bridge.resize(small, &mut rig.camera).unwrap();

        let targets = rig.bridge.backend().targets().unwrap();
        assert_eq!(targets.color, small);
        assert_eq!(targets.depth, small);
        assert_eq!(targets.staging, vec![small; STAGING_SLOTS]);
        assert_eq!(targets.generation, 1);
        assert_eq!(rig.bridge.bitmap().viewport(), small);
        assert_eq!(rig.bridge.viewport(), small);
        assert_eq!(rig.camera.aspect_ratio(), 400.0 / 300.0);

        // Frames staged at the old size are never read back.
        let presented_before = capture.frames.len();
        assert!(!rig.frame(&mut capture).presented);
        assert!(rig.frame(&mut capture).presented);
        assert_eq!(capture.frames.len(), presented_before + 1);
        assert_eq!(capture.frames.last().unwrap().len(), 400 * 300 * 4);
    }

    #[test]
    fn same_size_resize_is_a_no_op() {
        let mut rig = rig(RecordingBackend::new(), Viewport::new(8, 8), &[]);
        rig.bridge.resize(Viewport::new(8, 8), &mut rig.camera).unwrap();
        assert_eq!(rig.bridge.backend().targets().unwrap().generation, 0);
    }

    #[test]
    fn padded_staging_rows_are_stripped() {
        let mut rig = rig(
            RecordingBackend::with_row_alignment(256),
            Viewport::new(10, 3),
            &[],
        );
        let mut capture = Capture::default();
        rig.frame(&mut capture);
        rig.frame(&mut capture);
        assert_eq!(capture.frames[0].len(), 10 * 3 * 4);
        assert!(capture.frames[0].iter().all(|&b| b == 1));
    }

    #[test]
    fn mouse_delta_is_cleared_after_frame() {
        let mut rig = rig(RecordingBackend::new(), Viewport::new(2, 2), &[]);
        rig.input.accumulate_mouse_delta(Vec2::new(5.0, 5.0));
        rig.frame(&mut Capture::default());
        assert_eq!(rig.input.mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn frame_numbers_increase() {
        let mut rig = rig(RecordingBackend::new(), Viewport::new(2, 2), &[]);
        let mut capture = Capture::default();
        assert_eq!(rig.frame(&mut capture).frame, 0);
        assert_eq!(rig.frame(&mut capture).frame, 1);
        assert_eq!(rig.bridge.frame(), 2);
    }
}
