use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use meshview_assets::{SceneOptions, load_scene, scan_directory};
use meshview_common::{Aabb, Viewport};
use meshview_input::Bindings;
use meshview_render::{CameraSettings, CpuBitmap, GpuBackend, Presenter, RecordingBackend, Viewer};
use meshview_render_wgpu::WgpuBackend;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshview-cli", about = "Inspect, validate and dry-run mesh scenes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print triangle count, bounds and normalizing transform of one mesh
    Inspect {
        /// Binary STL file
        file: PathBuf,
    },
    /// Decode every mesh in a directory; exits non-zero if any fails
    Validate {
        dir: PathBuf,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Run frames over a scene and print what the renderer was asked to do
    Frame {
        dir: PathBuf,
        #[arg(short, long)]
        recursive: bool,
        /// Number of frames to run
        #[arg(short, long, default_value = "1")]
        frames: u32,
        #[arg(long, default_value = "320")]
        width: u32,
        #[arg(long, default_value = "240")]
        height: u32,
        /// Render on the GPU instead of recording commands
        #[arg(long)]
        gpu: bool,
    },
}

/// Keeps the last presented frame.
#[derive(Default)]
struct LastFrame {
    bitmap: Option<CpuBitmap>,
}

impl Presenter for LastFrame {
    fn present(&mut self, bitmap: &CpuBitmap) {
        self.bitmap = Some(bitmap.clone());
    }

    fn request_redraw(&mut self) {}
}

fn inspect(file: &Path) -> Result<()> {
    let decoded = meshview_assets::load(file).with_context(|| format!("decoding {}", file.display()))?;
    let mesh = &decoded.mesh;
    println!("{}", file.display());
    println!("  triangles: {}", mesh.triangle_count());
    println!("  vertices:  {}", mesh.vertex_count());
    println!("  substituted normals: {}", decoded.substituted_normals);

    let Some(bounds) = Aabb::from_points(mesh.positions()) else {
        println!("  (empty mesh)");
        return Ok(());
    };
    println!("  bounds min: {:?}", bounds.min.to_array());
    println!("  bounds max: {:?}", bounds.max.to_array());
    println!("  center:     {:?}", bounds.center().to_array());
    println!("  largest extent: {}", bounds.largest_extent());

    let options = SceneOptions::default();
    let loaded = meshview_assets::load_mesh(file, &options);
    let n = loaded.normalization;
    println!("  scale: {}", n.scale);
    println!("  translation: {:?}", n.translation().to_array());
    Ok(())
}

fn validate(dir: &Path, recursive: bool) -> Result<()> {
    let files = scan_directory(dir, recursive)?;
    if files.is_empty() {
        println!("no mesh files in {}", dir.display());
        return Ok(());
    }

    let mut failures = 0;
    for file in &files {
        match meshview_assets::load(file) {
            Ok(decoded) => println!(
                "ok    {}  ({} triangles)",
                file.display(),
                decoded.mesh.triangle_count()
            ),
            Err(e) => {
                failures += 1;
                println!("FAIL  {}  {e}", file.display());
            }
        }
    }
    println!("{} files, {} failed", files.len(), failures);
    if failures > 0 {
        bail!("{failures} of {} meshes failed to decode", files.len());
    }
    Ok(())
}

fn run_frames<B: GpuBackend>(
    backend: B,
    dir: &Path,
    options: &SceneOptions,
    viewport: Viewport,
    frames: u32,
) -> Result<(Viewer<B>, LastFrame)> {
    let meshes = load_scene(dir, options)?;
    let mut viewer = Viewer::new(backend, viewport, CameraSettings::default(), Bindings::default())?;
    viewer.load(&meshes)?;

    let mut last = LastFrame::default();
    for _ in 0..frames {
        let report = viewer.frame(1.0 / 60.0, &mut last)?;
        tracing::debug!(
            "frame {} draws={} presented={}",
            report.frame,
            report.draws,
            report.presented
        );
    }
    Ok((viewer, last))
}

fn frame(dir: &Path, options: &SceneOptions, viewport: Viewport, frames: u32, gpu: bool) -> Result<()> {
    if gpu {
        let backend = WgpuBackend::headless()?;
        let (_, last) = run_frames(backend, dir, options, viewport, frames)?;
        match last.bitmap {
            Some(bitmap) => {
                let lit = bitmap
                    .pixels()
                    .chunks_exact(4)
                    .filter(|p| p[..3].iter().any(|&c| c > 0))
                    .count();
                println!(
                    "presented {}x{} frame, {} of {} pixels lit",
                    bitmap.width(),
                    bitmap.height(),
                    lit,
                    bitmap.viewport().pixel_count()
                );
            }
            None => println!("no frame presented (run at least 2 frames)"),
        }
        return Ok(());
    }

    let (viewer, _) = run_frames(RecordingBackend::new(), dir, options, viewport, frames)?;
    for command in viewer.bridge().backend().commands() {
        println!("{command}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Inspect { file } => inspect(&file),
        Commands::Validate { dir, recursive } => validate(&dir, recursive),
        Commands::Frame {
            dir,
            recursive,
            frames,
            width,
            height,
            gpu,
        } => {
            let options = SceneOptions {
                recursive,
                ..Default::default()
            };
            frame(&dir, &options, Viewport::new(width, height), frames, gpu)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_render::Command;

    fn one_triangle_stl() -> Vec<u8> {
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for v in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&[0, 0]);
        bytes
    }

    #[test]
    fn validate_passes_clean_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tri.stl"), one_triangle_stl()).unwrap();
        validate(dir.path(), false).unwrap();
    }

    #[test]
    fn validate_fails_on_truncated_mesh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.stl"), one_triangle_stl()).unwrap();
        let mut bad = one_triangle_stl();
        bad.truncate(100);
        std::fs::write(dir.path().join("bad.stl"), bad).unwrap();

        let err = validate(dir.path(), false).unwrap_err();
        assert!(err.to_string().contains("1 of 2"));
    }

    #[test]
    fn recorded_frames_draw_grid_and_mesh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tri.stl"), one_triangle_stl()).unwrap();

        let (viewer, last) = run_frames(
            RecordingBackend::new(),
            dir.path(),
            &SceneOptions::default(),
            Viewport::new(8, 6),
            2,
        )
        .unwrap();
        let commands = viewer.bridge().backend().commands();
        let grids = commands.iter().filter(|c| matches!(c, Command::DrawGrid)).count();
        let meshes = commands.iter().filter(|c| matches!(c, Command::DrawMesh(_))).count();
        assert_eq!(grids, 2);
        assert_eq!(meshes, 2);
        assert_eq!(last.bitmap.map(|b| b.viewport()), Some(Viewport::new(8, 6)));
    }
}
