//! Rendering core: renderer-agnostic interface between the viewer and a GPU.
//!
//! # Invariants
//! - The shared MVP uniform is written and consumed strictly in draw order.
//! - The CPU only reads a staging target whose GPU work has completed; the
//!   staging target is double-buffered, so a frame is displayed one frame
//!   after it was submitted.
//! - Colour, depth and staging targets and the CPU bitmap are always
//!   recreated as one unit, along with the camera's aspect ratio.
//!
//! # Backends
//! [`GpuBackend`] is the only seam to the graphics API. The wgpu
//! implementation lives in `meshview-render-wgpu`; [`RecordingBackend`]
//! records commands for tests and the CLI.

mod backend;
mod bitmap;
mod bridge;
mod camera;
pub mod grid;
mod recording;
mod scene;
mod viewer;

pub use backend::{ClearValues, GpuBackend, MeshHandle};
pub use bitmap::{BYTES_PER_PIXEL, BitmapError, CpuBitmap, StagingLayout};
pub use bridge::{BridgeError, FrameBridge, FrameReport, Presenter, STAGING_SLOTS};
pub use camera::{CameraController, CameraSettings, CameraSettingsError, Mvp};
pub use grid::{GridGeometry, LineVertex};
pub use recording::{Command, RecordedTargets, RecordingBackend, RecordingError};
pub use scene::{SceneAssembler, SceneMesh};
pub use viewer::Viewer;
