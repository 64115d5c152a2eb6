//! wgpu implementation of [`meshview_render::GpuBackend`].
//!
//! Renders offscreen (no swapchain) into an RGBA8 colour target with a
//! Depth32Float depth buffer, then copies the result into a ring of
//! `MAP_READ` staging buffers for the frame bridge to read back.
//!
//! # Invariants
//! - Staging rows are padded to `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`; the
//!   reported [`meshview_render::StagingLayout`] carries the padded pitch.
//! - A staging buffer is only mapped after waiting on the submission that
//!   filled it.
//! - Resource creation runs inside error scopes and fails with
//!   [`WgpuBackendError::ResourceCreation`] instead of panicking.

mod gpu;
mod pipeline;
mod shaders;
mod vertex;

pub use gpu::{WgpuBackend, WgpuBackendError, request_device};
pub use pipeline::{COLOR_FORMAT, DEPTH_FORMAT, GRID_PIPELINE, MESH_PIPELINE, PipelineConfig};
