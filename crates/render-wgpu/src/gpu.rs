use crate::pipeline::{COLOR_FORMAT, DEPTH_FORMAT, GRID_PIPELINE, MESH_PIPELINE};
use crate::vertex::{GpuLineVertex, GpuMvp, GpuVertex};
use meshview_common::{MeshData, Viewport};
use meshview_render::{ClearValues, GpuBackend, GridGeometry, MeshHandle, Mvp, StagingLayout};
use std::collections::HashMap;
use std::sync::{Arc, mpsc};
use wgpu::util::DeviceExt;

/// MVP upload slots allocated up front; grown when a frame declares more
/// draws.
const INITIAL_MVP_SLOTS: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum WgpuBackendError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to create {what}: {message}")]
    ResourceCreation { what: &'static str, message: String },
    #[error("frame targets have not been created")]
    NoTargets,
    #[error("no frame is being recorded")]
    NotRecording,
    #[error("grid geometry has not been uploaded")]
    NoGrid,
    #[error("cannot upload a mesh with no triangles")]
    EmptyMesh,
    #[error("unknown mesh {0:?}")]
    UnknownMesh(MeshHandle),
    #[error("more MVP writes than the {0} draws declared for this frame")]
    TooManyDraws(usize),
    #[error("staging slot {slot} out of range ({slots} slots)")]
    BadSlot { slot: usize, slots: usize },
    #[error("staging slot {0} holds no submitted frame")]
    SlotNotSubmitted(usize),
    #[error("staging readback failed: {0}")]
    Readback(String),
}

/// Request an adapter and device. Pass the window surface when the device
/// will also present to it.
pub async fn request_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), WgpuBackendError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(WgpuBackendError::NoAdapter)?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("meshview_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;

    tracing::info!(
        "GPU initialized with {} backend ({})",
        adapter.get_info().backend.to_str(),
        adapter.get_info().name
    );
    Ok((adapter, device, queue))
}

/// Run `create` inside validation and out-of-memory error scopes so that
/// resource failures come back as errors instead of panics.
fn scoped<T>(
    device: &wgpu::Device,
    what: &'static str,
    create: impl FnOnce() -> T,
) -> Result<T, WgpuBackendError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(error) => {
            tracing::error!("failed to create {what}: {error}");
            Err(WgpuBackendError::ResourceCreation {
                what,
                message: error.to_string(),
            })
        }
        None => Ok(value),
    }
}

/// Staging rows padded to wgpu's copy alignment.
pub(crate) fn staging_layout(viewport: Viewport) -> StagingLayout {
    StagingLayout::aligned(viewport, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct FrameTargets {
    viewport: Viewport,
    layout: StagingLayout,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    staging: Vec<wgpu::Buffer>,
    submissions: Vec<Option<wgpu::SubmissionIndex>>,
}

/// Command recording in progress between `begin_frame` and `submit`.
struct FrameRecording {
    encoder: wgpu::CommandEncoder,
    /// Consumed by the first render pass; later passes load.
    clear: Option<ClearValues>,
    viewport: Viewport,
    mvp_writes: usize,
    copied: Vec<usize>,
}

/// [`GpuBackend`] on wgpu, rendering offscreen into RGBA8 with a
/// Depth32Float depth buffer.
///
/// The shared MVP uniform is updated inside the command stream: each
/// `write_mvp` lands in its own slot of an upload buffer and is copied into
/// the uniform right before the draw that follows it. Every draw gets its
/// own render pass so that copy is ordered against it.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    mesh_pipeline: wgpu::RenderPipeline,
    grid_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    mvp_upload: wgpu::Buffer,
    mvp_slots: usize,
    grid: Option<GpuMesh>,
    meshes: HashMap<MeshHandle, GpuMesh>,
    next_handle: u32,
    targets: Option<FrameTargets>,
    frame: Option<FrameRecording>,
}

impl WgpuBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Result<Self, WgpuBackendError> {
        let (mesh_pipeline, grid_pipeline, uniform_buffer, uniform_bind_group) =
            scoped(&device, "render pipelines", || {
                let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("mvp_uniform"),
                    size: GpuMvp::SIZE,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });

                let bind_group_layout =
                    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some("mvp_bind_group_layout"),
                        entries: &[wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::VERTEX,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: wgpu::BufferSize::new(GpuMvp::SIZE),
                            },
                            count: None,
                        }],
                    });

                let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("mvp_bind_group"),
                    layout: &bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    }],
                });

                let pipeline_layout =
                    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some("pipeline_layout"),
                        bind_group_layouts: &[&bind_group_layout],
                        push_constant_ranges: &[],
                    });

                (
                    MESH_PIPELINE.build(&device, &pipeline_layout),
                    GRID_PIPELINE.build(&device, &pipeline_layout),
                    uniform_buffer,
                    uniform_bind_group,
                )
            })?;

        let mvp_upload = Self::create_mvp_upload(&device, INITIAL_MVP_SLOTS);

        Ok(Self {
            device,
            queue,
            mesh_pipeline,
            grid_pipeline,
            uniform_buffer,
            uniform_bind_group,
            mvp_upload,
            mvp_slots: INITIAL_MVP_SLOTS,
            grid: None,
            meshes: HashMap::new(),
            next_handle: 0,
            targets: None,
            frame: None,
        })
    }

    /// A backend on its own device with no window.
    pub fn headless() -> Result<Self, WgpuBackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let (_adapter, device, queue) = pollster::block_on(request_device(&instance, None))?;
        Self::new(Arc::new(device), Arc::new(queue))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn create_mvp_upload(device: &wgpu::Device, slots: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mvp_upload"),
            size: GpuMvp::SIZE * slots as u64,
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_buffers(
        &self,
        label: &'static str,
        vertices: &[u8],
        indices: &[u16],
    ) -> Result<GpuMesh, WgpuBackendError> {
        scoped(&self.device, label, || GpuMesh {
            vertex_buffer: self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: vertices,
                    usage: wgpu::BufferUsages::VERTEX,
                }),
            index_buffer: self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
            index_count: indices.len() as u32,
        })
    }

    fn create_frame_targets(
        device: &wgpu::Device,
        viewport: Viewport,
        slots: usize,
    ) -> FrameTargets {
        let size = wgpu::Extent3d {
            width: viewport.width,
            height: viewport.height,
            depth_or_array_layers: 1,
        };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let layout = staging_layout(viewport);
        let staging = (0..slots)
            .map(|_| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("staging"),
                    size: layout.size_bytes() as u64,
                    usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                    mapped_at_creation: false,
                })
            })
            .collect();

        FrameTargets {
            viewport,
            layout,
            color_view: color.create_view(&Default::default()),
            depth_view: depth.create_view(&Default::default()),
            color,
            staging,
            submissions: vec![None; slots],
        }
    }
}

/// Record one indexed draw in its own render pass.
fn encode_draw(
    frame: &mut FrameRecording,
    targets: &FrameTargets,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    mesh: &GpuMesh,
) {
    let mut pass = begin_pass(frame, targets);
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
    pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
    pass.draw_indexed(0..mesh.index_count, 0, 0..1);
}

fn begin_pass<'a>(frame: &'a mut FrameRecording, targets: &'a FrameTargets) -> wgpu::RenderPass<'a> {
    let (color_load, depth_load) = match frame.clear.take() {
        Some(clear) => (
            wgpu::LoadOp::Clear(wgpu::Color {
                r: clear.color[0],
                g: clear.color[1],
                b: clear.color[2],
                a: clear.color[3],
            }),
            wgpu::LoadOp::Clear(clear.depth),
        ),
        None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
    };
    let viewport = frame.viewport;

    let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("draw_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &targets.color_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: color_load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: &targets.depth_view,
            depth_ops: Some(wgpu::Operations {
                load: depth_load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        ..Default::default()
    });
    pass.set_viewport(
        0.0,
        0.0,
        viewport.width as f32,
        viewport.height as f32,
        0.0,
        1.0,
    );
    pass.set_scissor_rect(0, 0, viewport.width, viewport.height);
    pass
}

impl GpuBackend for WgpuBackend {
    type Error = WgpuBackendError;

    fn recreate_frame_targets(
        &mut self,
        viewport: Viewport,
        slots: usize,
    ) -> Result<StagingLayout, WgpuBackendError> {
        // Old targets go first so both sets never coexist in memory.
        self.targets = None;
        let targets = scoped(&self.device, "frame targets", || {
            Self::create_frame_targets(&self.device, viewport, slots)
        })?;
        let layout = targets.layout;
        self.targets = Some(targets);
        Ok(layout)
    }

    fn upload_grid(&mut self, grid: &GridGeometry) -> Result<(), WgpuBackendError> {
        let vertices: Vec<GpuLineVertex> = grid.vertices.iter().map(GpuLineVertex::from).collect();
        self.grid = Some(self.create_buffers(
            "grid buffers",
            bytemuck::cast_slice(&vertices),
            &grid.indices,
        )?);
        Ok(())
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, WgpuBackendError> {
        if mesh.is_empty() {
            return Err(WgpuBackendError::EmptyMesh);
        }
        let vertices: Vec<GpuVertex> = mesh.vertices.iter().map(GpuVertex::from).collect();
        let buffers =
            self.create_buffers("mesh buffers", bytemuck::cast_slice(&vertices), &mesh.indices)?;
        let handle = MeshHandle(self.next_handle);
        self.next_handle += 1;
        self.meshes.insert(handle, buffers);
        Ok(handle)
    }

    fn release_meshes(&mut self) {
        self.meshes.clear();
    }

    fn begin_frame(&mut self, clear: ClearValues, draw_count: usize) -> Result<(), WgpuBackendError> {
        let targets = self.targets.as_ref().ok_or(WgpuBackendError::NoTargets)?;
        let viewport = targets.viewport;

        if draw_count > self.mvp_slots {
            let slots = draw_count.next_power_of_two();
            self.mvp_upload = scoped(&self.device, "MVP upload buffer", || {
                Self::create_mvp_upload(&self.device, slots)
            })?;
            self.mvp_slots = slots;
        }

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        self.frame = Some(FrameRecording {
            encoder,
            clear: Some(clear),
            viewport,
            mvp_writes: 0,
            copied: Vec::new(),
        });
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<(), WgpuBackendError> {
        let frame = self.frame.as_mut().ok_or(WgpuBackendError::NotRecording)?;
        frame.viewport = viewport;
        Ok(())
    }

    fn write_mvp(&mut self, mvp: &Mvp) -> Result<(), WgpuBackendError> {
        let frame = self.frame.as_mut().ok_or(WgpuBackendError::NotRecording)?;
        if frame.mvp_writes >= self.mvp_slots {
            return Err(WgpuBackendError::TooManyDraws(self.mvp_slots));
        }
        let offset = frame.mvp_writes as u64 * GpuMvp::SIZE;
        self.queue
            .write_buffer(&self.mvp_upload, offset, bytemuck::bytes_of(&GpuMvp::from(mvp)));
        frame.encoder.copy_buffer_to_buffer(
            &self.mvp_upload,
            offset,
            &self.uniform_buffer,
            0,
            GpuMvp::SIZE,
        );
        frame.mvp_writes += 1;
        Ok(())
    }

    fn draw_grid(&mut self) -> Result<(), WgpuBackendError> {
        let frame = self.frame.as_mut().ok_or(WgpuBackendError::NotRecording)?;
        let targets = self.targets.as_ref().ok_or(WgpuBackendError::NoTargets)?;
        let grid = self.grid.as_ref().ok_or(WgpuBackendError::NoGrid)?;
        encode_draw(frame, targets, &self.grid_pipeline, &self.uniform_bind_group, grid);
        Ok(())
    }

    fn draw_mesh(&mut self, handle: MeshHandle) -> Result<(), WgpuBackendError> {
        let frame = self.frame.as_mut().ok_or(WgpuBackendError::NotRecording)?;
        let targets = self.targets.as_ref().ok_or(WgpuBackendError::NoTargets)?;
        let mesh = self
            .meshes
            .get(&handle)
            .ok_or(WgpuBackendError::UnknownMesh(handle))?;
        encode_draw(frame, targets, &self.mesh_pipeline, &self.uniform_bind_group, mesh);
        Ok(())
    }

    fn copy_to_staging(&mut self, slot: usize) -> Result<(), WgpuBackendError> {
        let frame = self.frame.as_mut().ok_or(WgpuBackendError::NotRecording)?;
        let targets = self.targets.as_ref().ok_or(WgpuBackendError::NoTargets)?;
        let staging = targets.staging.get(slot).ok_or(WgpuBackendError::BadSlot {
            slot,
            slots: targets.staging.len(),
        })?;

        if frame.clear.is_some() {
            // Nothing was drawn; still apply the clear.
            drop(begin_pass(frame, targets));
        }

        frame.encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &targets.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(targets.layout.row_pitch),
                    rows_per_image: Some(targets.viewport.height),
                },
            },
            wgpu::Extent3d {
                width: targets.viewport.width,
                height: targets.viewport.height,
                depth_or_array_layers: 1,
            },
        );
        frame.copied.push(slot);
        Ok(())
    }

    fn submit(&mut self) -> Result<(), WgpuBackendError> {
        let frame = self.frame.take().ok_or(WgpuBackendError::NotRecording)?;
        let index = self.queue.submit(std::iter::once(frame.encoder.finish()));
        if let Some(targets) = self.targets.as_mut() {
            for slot in frame.copied {
                targets.submissions[slot] = Some(index.clone());
            }
        }
        Ok(())
    }

    fn read_staging(
        &mut self,
        slot: usize,
        read: &mut dyn FnMut(&[u8]),
    ) -> Result<(), WgpuBackendError> {
        let targets = self.targets.as_ref().ok_or(WgpuBackendError::NoTargets)?;
        let buffer = targets.staging.get(slot).ok_or(WgpuBackendError::BadSlot {
            slot,
            slots: targets.staging.len(),
        })?;
        let index = targets.submissions[slot]
            .clone()
            .ok_or(WgpuBackendError::SlotNotSubmitted(slot))?;

        let slice = buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::wait_for(index));
        receiver
            .recv()
            .map_err(|_| WgpuBackendError::Readback("map_async channel closed".into()))?
            .map_err(|e| WgpuBackendError::Readback(e.to_string()))?;

        {
            let data = slice.get_mapped_range();
            read(&data);
        }
        buffer.unmap();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_rows_meet_copy_alignment() {
        for width in [1, 63, 64, 65, 400, 800, 1023] {
            let layout = staging_layout(Viewport::new(width, 3));
            assert_eq!(layout.row_pitch % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
            assert!(layout.row_pitch >= layout.row_bytes());
            assert!(layout.row_pitch - layout.row_bytes() < wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        }
    }

    #[test]
    fn aligned_width_needs_no_padding() {
        let layout = staging_layout(Viewport::new(64, 2));
        assert_eq!(layout.row_pitch, layout.row_bytes());
        assert_eq!(layout.size_bytes(), 64 * 4 * 2);
    }
}
