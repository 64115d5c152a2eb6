use crate::bitmap::StagingLayout;
use crate::camera::Mvp;
use crate::grid::GridGeometry;
use meshview_common::{MeshData, Viewport};

/// Opaque reference to geometry uploaded with [`GpuBackend::upload_mesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    pub color: [f64; 4],
    pub depth: f32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
        }
    }
}

/// Offscreen GPU device the frame bridge drives.
///
/// Implementations own one color target, one depth target and `slots`
/// CPU-readable staging targets, all sized to the current viewport. A
/// single MVP uniform slot is shared by every draw: `write_mvp` must take
/// effect for the draw that immediately follows it and for no earlier one.
pub trait GpuBackend {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Recreate the color, depth and staging targets at `viewport`. Any
    /// previous targets are released first.
    fn recreate_frame_targets(
        &mut self,
        viewport: Viewport,
        slots: usize,
    ) -> Result<StagingLayout, Self::Error>;

    fn upload_grid(&mut self, grid: &GridGeometry) -> Result<(), Self::Error>;

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, Self::Error>;

    /// Drop every uploaded mesh. The grid survives.
    fn release_meshes(&mut self);

    /// Start recording a frame that will issue `draw_count` draws.
    fn begin_frame(&mut self, clear: ClearValues, draw_count: usize) -> Result<(), Self::Error>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<(), Self::Error>;

    fn write_mvp(&mut self, mvp: &Mvp) -> Result<(), Self::Error>;

    fn draw_grid(&mut self) -> Result<(), Self::Error>;

    fn draw_mesh(&mut self, mesh: MeshHandle) -> Result<(), Self::Error>;

    /// Copy the finished color target into staging slot `slot`.
    fn copy_to_staging(&mut self, slot: usize) -> Result<(), Self::Error>;

    fn submit(&mut self) -> Result<(), Self::Error>;

    /// Map staging slot `slot` and hand its bytes to `read`. The slot must
    /// hold the result of an earlier submission.
    fn read_staging(
        &mut self,
        slot: usize,
        read: &mut dyn FnMut(&[u8]),
    ) -> Result<(), Self::Error>;
}
