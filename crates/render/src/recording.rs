//! A [`GpuBackend`] that records commands instead of drawing. Used by tests
//! and by the CLI to inspect the per-frame command stream.

use crate::backend::{ClearValues, GpuBackend, MeshHandle};
use crate::bitmap::StagingLayout;
use crate::camera::Mvp;
use crate::grid::GridGeometry;
use glam::Mat4;
use meshview_common::{MeshData, Viewport};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RecreateTargets { viewport: Viewport, slots: usize },
    UploadGrid { vertices: usize, indices: usize },
    UploadMesh { handle: MeshHandle, vertices: u32, indices: u32 },
    ReleaseMeshes,
    BeginFrame { draws: usize },
    SetViewport(Viewport),
    WriteMvp { model: Mat4 },
    DrawGrid,
    DrawMesh(MeshHandle),
    CopyToStaging(usize),
    Submit,
    ReadStaging(usize),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::RecreateTargets { viewport, slots } => write!(
                f,
                "recreate_targets {}x{} slots={slots}",
                viewport.width, viewport.height
            ),
            Command::UploadGrid { vertices, indices } => {
                write!(f, "upload_grid vertices={vertices} indices={indices}")
            }
            Command::UploadMesh {
                handle,
                vertices,
                indices,
            } => write!(
                f,
                "upload_mesh #{} vertices={vertices} indices={indices}",
                handle.0
            ),
            Command::ReleaseMeshes => write!(f, "release_meshes"),
            Command::BeginFrame { draws } => write!(f, "begin_frame draws={draws}"),
            Command::SetViewport(v) => write!(f, "set_viewport {}x{}", v.width, v.height),
            Command::WriteMvp { model } => {
                let t = model.w_axis;
                write!(f, "write_mvp translation=({:.3}, {:.3}, {:.3})", t.x, t.y, t.z)
            }
            Command::DrawGrid => write!(f, "draw_grid"),
            Command::DrawMesh(handle) => write!(f, "draw_mesh #{}", handle.0),
            Command::CopyToStaging(slot) => write!(f, "copy_to_staging slot={slot}"),
            Command::Submit => write!(f, "submit"),
            Command::ReadStaging(slot) => write!(f, "read_staging slot={slot}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("frame targets have not been created")]
    NoTargets,
    #[error("no frame is being recorded")]
    NotRecording,
    #[error("staging slot {slot} out of range ({slots} slots)")]
    BadSlot { slot: usize, slots: usize },
    #[error("staging slot {0} holds no submitted frame")]
    SlotNotSubmitted(usize),
    #[error("unknown mesh {0:?}")]
    UnknownMesh(MeshHandle),
    #[error("draw issued without a fresh MVP")]
    MissingMvp,
    #[error("grid geometry has not been uploaded")]
    NoGrid,
    #[error("viewport {requested:?} does not match frame targets {targets:?}")]
    ViewportMismatch {
        requested: Viewport,
        targets: Viewport,
    },
}

/// Size-dependent resources as last created.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTargets {
    pub color: Viewport,
    pub depth: Viewport,
    pub staging: Vec<Viewport>,
    /// Incremented on every recreation.
    pub generation: u32,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<Command>,
    targets: Option<RecordedTargets>,
    row_alignment: Option<u32>,
    staging: Vec<Vec<u8>>,
    submitted: Vec<bool>,
    pending_copies: Vec<usize>,
    meshes: HashMap<MeshHandle, u32>,
    next_handle: u32,
    has_grid: bool,
    recording: bool,
    mvp_fresh: bool,
    frames_submitted: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pad staging rows to a multiple of `alignment` bytes, as real GPU
    /// APIs do.
    pub fn with_row_alignment(alignment: u32) -> Self {
        Self {
            row_alignment: Some(alignment),
            ..Self::default()
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn targets(&self) -> Option<&RecordedTargets> {
        self.targets.as_ref()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    fn check_slot(&self, slot: usize) -> Result<(), RecordingError> {
        if slot < self.staging.len() {
            Ok(())
        } else {
            Err(RecordingError::BadSlot {
                slot,
                slots: self.staging.len(),
            })
        }
    }

    fn check_recording(&self) -> Result<(), RecordingError> {
        if self.recording {
            Ok(())
        } else {
            Err(RecordingError::NotRecording)
        }
    }

    fn consume_mvp(&mut self) -> Result<(), RecordingError> {
        if !std::mem::take(&mut self.mvp_fresh) {
            return Err(RecordingError::MissingMvp);
        }
        Ok(())
    }
}

impl GpuBackend for RecordingBackend {
    type Error = RecordingError;

    fn recreate_frame_targets(
        &mut self,
        viewport: Viewport,
        slots: usize,
    ) -> Result<StagingLayout, RecordingError> {
        let layout = match self.row_alignment {
            Some(alignment) => StagingLayout::aligned(viewport, alignment),
            None => StagingLayout::tight(viewport),
        };
        let generation = self.targets.as_ref().map_or(0, |t| t.generation + 1);
        self.targets = Some(RecordedTargets {
            color: viewport,
            depth: viewport,
            staging: vec![viewport; slots],
            generation,
        });
        self.staging = vec![vec![0; layout.size_bytes()]; slots];
        self.submitted = vec![false; slots];
        self.pending_copies.clear();
        self.commands.push(Command::RecreateTargets { viewport, slots });
        Ok(layout)
    }

    fn upload_grid(&mut self, grid: &GridGeometry) -> Result<(), RecordingError> {
        self.has_grid = true;
        self.commands.push(Command::UploadGrid {
            vertices: grid.vertices.len(),
            indices: grid.indices.len(),
        });
        Ok(())
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, RecordingError> {
        let handle = MeshHandle(self.next_handle);
        self.next_handle += 1;
        self.meshes.insert(handle, mesh.index_count());
        self.commands.push(Command::UploadMesh {
            handle,
            vertices: mesh.vertex_count(),
            indices: mesh.index_count(),
        });
        Ok(handle)
    }

    fn release_meshes(&mut self) {
        self.meshes.clear();
        self.commands.push(Command::ReleaseMeshes);
    }

    fn begin_frame(&mut self, _clear: ClearValues, draw_count: usize) -> Result<(), RecordingError> {
        if self.targets.is_none() {
            return Err(RecordingError::NoTargets);
        }
        self.recording = true;
        self.mvp_fresh = false;
        self.pending_copies.clear();
        self.commands.push(Command::BeginFrame { draws: draw_count });
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<(), RecordingError> {
        self.check_recording()?;
        let targets = self.targets.as_ref().ok_or(RecordingError::NoTargets)?;
        if targets.color != viewport {
            return Err(RecordingError::ViewportMismatch {
                requested: viewport,
                targets: targets.color,
            });
        }
        self.commands.push(Command::SetViewport(viewport));
        Ok(())
    }

    fn write_mvp(&mut self, mvp: &Mvp) -> Result<(), RecordingError> {
        self.check_recording()?;
        self.mvp_fresh = true;
        self.commands.push(Command::WriteMvp { model: mvp.model });
        Ok(())
    }

    fn draw_grid(&mut self) -> Result<(), RecordingError> {
        self.check_recording()?;
        if !self.has_grid {
            return Err(RecordingError::NoGrid);
        }
        self.consume_mvp()?;
        self.commands.push(Command::DrawGrid);
        Ok(())
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) -> Result<(), RecordingError> {
        self.check_recording()?;
        if !self.meshes.contains_key(&mesh) {
            return Err(RecordingError::UnknownMesh(mesh));
        }
        self.consume_mvp()?;
        self.commands.push(Command::DrawMesh(mesh));
        Ok(())
    }

    fn copy_to_staging(&mut self, slot: usize) -> Result<(), RecordingError> {
        self.check_recording()?;
        self.check_slot(slot)?;
        self.pending_copies.push(slot);
        self.commands.push(Command::CopyToStaging(slot));
        Ok(())
    }

    /// Every staging slot copied this frame is filled with the submitted
    /// frame number (1-based, wrapping) so tests can tell frames apart.
    fn submit(&mut self) -> Result<(), RecordingError> {
        self.check_recording()?;
        self.recording = false;
        self.frames_submitted += 1;
        let fill = self.frames_submitted as u8;
        for slot in self.pending_copies.drain(..) {
            self.staging[slot].fill(fill);
            self.submitted[slot] = true;
        }
        self.commands.push(Command::Submit);
        Ok(())
    }

    fn read_staging(
        &mut self,
        slot: usize,
        read: &mut dyn FnMut(&[u8]),
    ) -> Result<(), RecordingError> {
        self.check_slot(slot)?;
        if !self.submitted[slot] {
            return Err(RecordingError::SlotNotSubmitted(slot));
        }
        read(&self.staging[slot]);
        self.commands.push(Command::ReadStaging(slot));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraController, CameraSettings};
    use glam::Vec3;

    fn mvp() -> Mvp {
        CameraController::new(CameraSettings::default(), 1.0).view_projection(Mat4::IDENTITY)
    }

    #[test]
    fn draw_requires_fresh_mvp() {
        let mut backend = RecordingBackend::new();
        backend.recreate_frame_targets(Viewport::new(4, 4), 2).unwrap();
        backend.upload_grid(&GridGeometry::default()).unwrap();
        backend.begin_frame(ClearValues::default(), 1).unwrap();

        assert!(matches!(backend.draw_grid(), Err(RecordingError::MissingMvp)));
        backend.write_mvp(&mvp()).unwrap();
        backend.draw_grid().unwrap();
        assert!(matches!(backend.draw_grid(), Err(RecordingError::MissingMvp)));
    }

    #[test]
    fn unsubmitted_slot_cannot_be_read() {
        let mut backend = RecordingBackend::new();
        backend.recreate_frame_targets(Viewport::new(4, 4), 2).unwrap();
        let err = backend.read_staging(0, &mut |_| {}).unwrap_err();
        assert!(matches!(err, RecordingError::SlotNotSubmitted(0)));
        let err = backend.read_staging(5, &mut |_| {}).unwrap_err();
        assert!(matches!(err, RecordingError::BadSlot { slot: 5, slots: 2 }));
    }

    #[test]
    fn released_meshes_cannot_be_drawn() {
        let mut backend = RecordingBackend::new();
        backend.recreate_frame_targets(Viewport::new(4, 4), 2).unwrap();
        let handle = backend.upload_mesh(&MeshData::empty()).unwrap();
        backend.release_meshes();
        backend.begin_frame(ClearValues::default(), 1).unwrap();
        backend.write_mvp(&mvp()).unwrap();
        assert!(matches!(
            backend.draw_mesh(handle),
            Err(RecordingError::UnknownMesh(_))
        ));
    }

    #[test]
    fn aligned_rows_are_padded() {
        let mut backend = RecordingBackend::with_row_alignment(256);
        let layout = backend.recreate_frame_targets(Viewport::new(10, 3), 2).unwrap();
        assert_eq!(layout.row_pitch, 256);
        assert_eq!(layout.size_bytes(), 768);
    }

    #[test]
    fn display_is_one_line_per_command() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(
            Command::WriteMvp { model }.to_string(),
            "write_mvp translation=(1.000, 2.000, 3.000)"
        );
        assert_eq!(Command::DrawMesh(MeshHandle(4)).to_string(), "draw_mesh #4");
    }
}
