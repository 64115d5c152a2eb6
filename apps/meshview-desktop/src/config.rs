use anyhow::{Context, Result};
use meshview_assets::SceneOptions;
use meshview_common::Viewport;
use meshview_input::Bindings;
use meshview_render::CameraSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Session configuration, read from an optional JSON file. Every field has
/// a default, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub scene_dir: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub scene: SceneOptions,
    pub camera: CameraSettings,
    pub bindings: Bindings,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scene_dir: None,
            width: 1280,
            height: 720,
            scene: SceneOptions::default(),
            camera: CameraSettings::default(),
            bindings: Bindings::default(),
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Reject camera and scene values the viewer cannot render with.
    pub fn validate(&self) -> Result<()> {
        self.camera.validate().context("camera")?;
        self.scene.validate().context("scene")?;
        Ok(())
    }

    /// Initial window size in physical pixels.
    pub fn window_size(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }
}
