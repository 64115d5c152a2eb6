mod config;
mod keymap;

use anyhow::Result;
use clap::Parser;
use config::ViewerConfig;
use egui::Context as EguiContext;
use glam::Vec2;
use keymap::Shortcut;
use meshview_assets::{LoadedMesh, load_scene};
use meshview_common::Viewport;
use meshview_render::{CpuBitmap, Presenter, Viewer};
use meshview_render_wgpu::{WgpuBackend, request_device};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "meshview-desktop", about = "Fly through a directory of STL meshes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory of mesh files to load
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Also load meshes from subdirectories
    #[arg(long)]
    recursive: bool,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial window width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Initial window height in pixels
    #[arg(long)]
    height: Option<u32>,
}

impl Cli {
    fn into_config(self) -> Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };
        if let Some(scene) = self.scene {
            config.scene_dir = Some(scene);
        }
        if self.recursive {
            config.scene.recursive = true;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        Ok(config)
    }
}

/// Hands bridged frames to egui as a texture.
struct TexturePresenter<'a> {
    ctx: &'a EguiContext,
    texture: &'a mut Option<egui::TextureHandle>,
    window: &'a Window,
}

impl Presenter for TexturePresenter<'_> {
    fn present(&mut self, bitmap: &CpuBitmap) {
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [bitmap.width() as usize, bitmap.height() as usize],
            bitmap.pixels(),
        );
        match self.texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::NEAREST),
            None => {
                *self.texture =
                    Some(self.ctx.load_texture("viewport", image, egui::TextureOptions::NEAREST));
            }
        }
    }

    fn request_redraw(&mut self) {
        self.window.request_redraw();
    }
}

/// Viewer session state, created once the GPU is up.
struct AppState {
    config: ViewerConfig,
    viewer: Viewer<WgpuBackend>,
    texture: Option<egui::TextureHandle>,
    loaded: Vec<LoadedMesh>,
    last_frame: Instant,
    pending_resize: Option<Viewport>,
    reload_requested: bool,
}

impl AppState {
    fn new(config: ViewerConfig, backend: WgpuBackend) -> Result<Self> {
        let viewer = Viewer::new(
            backend,
            config.window_size(),
            config.camera,
            config.bindings.clone(),
        )?;
        let mut state = Self {
            config,
            viewer,
            texture: None,
            loaded: Vec::new(),
            last_frame: Instant::now(),
            pending_resize: None,
            reload_requested: false,
        };
        state.reload()?;
        Ok(state)
    }

    fn reload(&mut self) -> Result<()> {
        self.loaded = match &self.config.scene_dir {
            Some(dir) => load_scene(dir, &self.config.scene).unwrap_or_else(|e| {
                tracing::warn!("cannot load scene: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        };
        self.viewer.load(&self.loaded)?;
        Ok(())
    }

    /// Apply changes requested by the previous UI pass.
    fn apply_requests(&mut self) -> Result<()> {
        if let Some(viewport) = self.pending_resize.take() {
            self.viewer.resize(viewport)?;
        }
        if std::mem::take(&mut self.reload_requested) {
            self.reload()?;
        }
        Ok(())
    }

    fn render(&mut self, ctx: &EguiContext, window: &Window) -> Result<()> {
        self.apply_requests()?;

        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        let mut presenter = TexturePresenter {
            ctx,
            texture: &mut self.texture,
            window,
        };
        self.viewer.frame(dt, &mut presenter)?;
        Ok(())
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        egui::SidePanel::left("scene")
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Mesh Viewer");
                ui.separator();
                match &self.config.scene_dir {
                    Some(dir) => ui.label(format!("Scene: {}", dir.display())),
                    None => ui.label("No scene directory"),
                };
                let camera = self.viewer.camera();
                let position = camera.position();
                ui.label(format!(
                    "Camera: ({:.2}, {:.2}, {:.2})",
                    position.x, position.y, position.z
                ));
                ui.label(format!(
                    "Yaw {:.1}°  Pitch {:.1}°",
                    camera.yaw().to_degrees(),
                    camera.pitch().to_degrees()
                ));
                let viewport = self.viewer.viewport();
                ui.label(format!("Viewport: {}x{}", viewport.width, viewport.height));
                ui.separator();

                ui.horizontal(|ui| {
                    if ui.button("Reload (R)").clicked() {
                        self.reload_requested = true;
                    }
                    if ui.button("Reset camera (Esc)").clicked() {
                        self.viewer.reset_camera();
                    }
                });
                ui.separator();

                ui.heading("Meshes");
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for mesh in &self.loaded {
                        if mesh.mesh.is_empty() {
                            ui.colored_label(
                                egui::Color32::LIGHT_RED,
                                format!("{} (failed)", mesh.name),
                            );
                        } else {
                            ui.label(format!(
                                "{}  {} triangles",
                                mesh.name,
                                mesh.mesh.triangle_count()
                            ));
                        }
                    }
                });

                ui.separator();
                ui.small("LMB drag: Look | WASD/Arrows: Move | Shift: Boost");
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let available = ui.available_size();
                let (rect, response) =
                    ui.allocate_exact_size(available, egui::Sense::click_and_drag());

                let scale = ctx.pixels_per_point();
                let wanted = Viewport::new(
                    (available.x * scale).round() as u32,
                    (available.y * scale).round() as u32,
                );
                if wanted != self.viewer.viewport() {
                    self.pending_resize = Some(wanted);
                }

                if let Some(texture) = &self.texture {
                    egui::Image::new(texture).paint_at(ui, rect);
                }

                let input = self.viewer.input_mut();
                match response.hover_pos() {
                    Some(pos) => input.pointer_moved(Vec2::new(pos.x, pos.y) * scale),
                    None => input.pointer_left(),
                }
                let pressed_on_viewport = response.is_pointer_button_down_on();
                let keyboard_free = !ctx.wants_keyboard_input();
                let shortcuts = ctx.input(|i| {
                    keymap::apply_egui_input(input, i, pressed_on_viewport, keyboard_free)
                });
                for shortcut in shortcuts {
                    match shortcut {
                        Shortcut::ReloadScene => self.reload_requested = true,
                        Shortcut::ResetCamera => self.viewer.reset_camera(),
                    }
                }
            });
    }
}

struct Gpu {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    egui_renderer: egui_wgpu::Renderer,
}

struct GpuApp {
    config: Option<ViewerConfig>,
    state: Option<AppState>,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
}

impl GpuApp {
    fn new(config: ViewerConfig) -> Self {
        Self {
            config: Some(config),
            state: None,
            window: None,
            gpu: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let config = self.config.take().unwrap_or_default();
        let size = config.window_size();
        let attrs = Window::default_attributes()
            .with_title("Mesh Viewer")
            .with_inner_size(PhysicalSize::new(size.width, size.height));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let (adapter, device, queue) =
            pollster::block_on(request_device(&instance, Some(&surface)))?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let inner = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow::anyhow!("surface reports no texture formats"))?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: inner.width.max(1),
            height: inner.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let backend = WgpuBackend::new(device.clone(), queue.clone())?;
        self.state = Some(AppState::new(config, backend)?);

        self.egui_winit = Some(egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        ));
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        self.gpu = Some(Gpu {
            surface,
            device,
            queue,
            config: surface_config,
            egui_renderer,
        });
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let (Some(window), Some(gpu), Some(state), Some(egui_winit)) = (
            self.window.as_ref(),
            self.gpu.as_mut(),
            self.state.as_mut(),
            self.egui_winit.as_mut(),
        ) else {
            return Ok(());
        };

        state.render(&self.egui_ctx, window)?;

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("surface error: {e}");
                return Ok(());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let raw_input = egui_winit.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            state.draw_ui(ctx);
        });
        egui_winit.handle_platform_output(window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            gpu.egui_renderer
                .update_texture(&gpu.device, &gpu.queue, *id, image_delta);
        }
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
        gpu.egui_renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            gpu.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        output.present();
        Ok(())
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            tracing::error!("failed to start viewer: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(egui_winit), Some(window)) = (&mut self.egui_winit, &self.window) {
            let _ = egui_winit.on_window_event(window, &event);
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.config.width = new_size.width.max(1);
                    gpu.config.height = new_size.height.max(1);
                    gpu.surface.configure(&gpu.device, &gpu.config);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    tracing::error!("rendering failed: {e:#}");
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = cli.into_config()?;
    tracing::info!("meshview-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = GpuApp::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
