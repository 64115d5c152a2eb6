use crate::shaders;
use crate::vertex::{GpuLineVertex, GpuVertex};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x3,
    3 => Sint32x4,
    4 => Float32x4,
];

const GRID_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x4,
];

/// Everything that distinguishes one pipeline from another: its shader
/// pair, vertex layout and rasterizer state.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub label: &'static str,
    pub shader: &'static str,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
    pub vertex_stride: u64,
    pub attributes: &'static [wgpu::VertexAttribute],
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
}

pub const MESH_PIPELINE: PipelineConfig = PipelineConfig {
    label: "mesh_pipeline",
    shader: shaders::MESH_SHADER,
    vertex_entry: "vs_mesh",
    fragment_entry: "fs_mesh",
    vertex_stride: std::mem::size_of::<GpuVertex>() as u64,
    attributes: &MESH_ATTRIBUTES,
    topology: wgpu::PrimitiveTopology::TriangleList,
    cull_mode: Some(wgpu::Face::Back),
};

pub const GRID_PIPELINE: PipelineConfig = PipelineConfig {
    label: "grid_pipeline",
    shader: shaders::GRID_SHADER,
    vertex_entry: "vs_line",
    fragment_entry: "fs_line",
    vertex_stride: std::mem::size_of::<GpuLineVertex>() as u64,
    attributes: &GRID_ATTRIBUTES,
    topology: wgpu::PrimitiveTopology::LineList,
    cull_mode: None,
};

impl PipelineConfig {
    pub fn build(&self, device: &wgpu::Device, layout: &wgpu::PipelineLayout) -> wgpu::RenderPipeline {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(self.label),
            source: wgpu::ShaderSource::Wgsl(self.shader.into()),
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(self.vertex_entry),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: self.vertex_stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: self.attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(self.fragment_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: self.topology,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: self.cull_mode,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    }
}
