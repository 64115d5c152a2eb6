//! Scene directory loading: every STL file in a directory becomes one mesh
//! with its own normalizing transform.

use crate::normalize::{Normalization, NormalizeOptions, UpAxis, DESIRED_SIZE, normalize};
use crate::stl::{self, STL_UP_AXIS};
use glam::Mat4;
use meshview_common::MeshData;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors from scanning a scene directory. Per-file decode failures are not
/// errors at this level; they produce empty meshes.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("scene path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("desired_size must be positive and finite, got {0}")]
    DesiredSize(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    pub desired_size: f32,
    /// Overrides the up axis declared by the mesh format.
    pub up_axis: Option<UpAxis>,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            desired_size: DESIRED_SIZE,
            up_axis: None,
        }
    }
}

impl SceneOptions {
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.desired_size.is_finite() && self.desired_size > 0.0 {
            Ok(())
        } else {
            Err(SceneError::DesiredSize(self.desired_size))
        }
    }

    fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            desired_size: self.desired_size,
            up_axis: self.up_axis.unwrap_or(STL_UP_AXIS),
        }
    }
}

/// A decoded mesh plus its cached model transform.
#[derive(Debug, Clone)]
pub struct LoadedMesh {
    pub name: String,
    pub path: PathBuf,
    pub mesh: MeshData,
    pub normalization: Normalization,
}

impl LoadedMesh {
    pub fn model_matrix(&self) -> Mat4 {
        self.normalization.matrix()
    }
}

/// List STL files under `dir`, sorted by path.
pub fn scan_directory(dir: impl AsRef<Path>, recursive: bool) -> Result<Vec<PathBuf>, SceneError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(SceneError::NotADirectory(dir.to_path_buf()));
    }

    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|source| SceneError::Io {
            path: current.clone(),
            source,
        })?;
        for entry in entries {
            let path = entry
                .map_err(|source| SceneError::Io {
                    path: current.clone(),
                    source,
                })?
                .path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if is_stl(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn is_stl(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("stl"))
}

/// Load one mesh file. Decode failures are logged and yield an empty mesh.
pub fn load_mesh(path: impl AsRef<Path>, options: &SceneOptions) -> LoadedMesh {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mesh = match stl::load(path) {
        Ok(decoded) => decoded.mesh,
        Err(e) => {
            tracing::warn!("failed to decode {}: {e}", path.display());
            MeshData::empty()
        }
    };

    let normalization = if mesh.is_empty() {
        Normalization::IDENTITY
    } else {
        normalize(mesh.positions(), &options.normalize_options())
    };

    LoadedMesh {
        name,
        path: path.to_path_buf(),
        mesh,
        normalization,
    }
}

/// Scan `dir` and load every mesh in it.
pub fn load_scene(
    dir: impl AsRef<Path>,
    options: &SceneOptions,
) -> Result<Vec<LoadedMesh>, SceneError> {
    let dir = dir.as_ref();
    let _span = tracing::info_span!("load_scene", dir = %dir.display()).entered();

    let meshes: Vec<LoadedMesh> = scan_directory(dir, options.recursive)?
        .iter()
        .map(|path| load_mesh(path, options))
        .collect();

    let failed = meshes.iter().filter(|m| m.mesh.is_empty()).count();
    tracing::info!(
        "loaded {} meshes from {} ({} empty)",
        meshes.len() - failed,
        dir.display(),
        failed
    );
    Ok(meshes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn triangle() -> (Vec3, [Vec3; 3]) {
        (Vec3::Z, [Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)])
    }

    fn write_stl(path: &Path) {
        std::fs::write(path, stl::encode(&[triangle()])).unwrap();
    }

    #[test]
    fn scan_finds_stl_files_only() {
        let dir = tempfile::tempdir().unwrap();
        write_stl(&dir.path().join("b.stl"));
        write_stl(&dir.path().join("a.STL"));
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();

        let found = scan_directory(dir.path(), false).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.STL", "b.stl"]);
    }

    #[test]
    fn recursive_scan_descends() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("parts");
        std::fs::create_dir(&nested).unwrap();
        write_stl(&dir.path().join("top.stl"));
        write_stl(&nested.join("inner.stl"));

        assert_eq!(scan_directory(dir.path(), false).unwrap().len(), 1);
        assert_eq!(scan_directory(dir.path(), true).unwrap().len(), 2);
    }

    #[test]
    fn missing_directory_is_error() {
        let err = scan_directory("/no/such/scene", false).unwrap_err();
        assert!(matches!(err, SceneError::NotADirectory(_)));
    }

    #[test]
    fn broken_file_becomes_empty_mesh() {
        let dir = tempfile::tempdir().unwrap();
        write_stl(&dir.path().join("good.stl"));
        std::fs::write(dir.path().join("bad.stl"), b"solid ascii is not supported").unwrap();

        let meshes = load_scene(dir.path(), &SceneOptions::default()).unwrap();
        assert_eq!(meshes.len(), 2);

        let bad = meshes.iter().find(|m| m.name == "bad").unwrap();
        assert!(bad.mesh.is_empty());
        assert_eq!(bad.model_matrix(), Mat4::IDENTITY);

        let good = meshes.iter().find(|m| m.name == "good").unwrap();
        assert_eq!(good.mesh.vertices.len(), 3);
        assert_eq!(good.normalization.scale, 0.5);
    }

    #[test]
    fn up_axis_override_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.stl");
        write_stl(&path);

        let stl_default = load_mesh(&path, &SceneOptions::default());
        assert_eq!(stl_default.normalization.rotation, UpAxis::Z.correction());

        let options = SceneOptions {
            up_axis: Some(UpAxis::Y),
            ..Default::default()
        };
        let overridden = load_mesh(&path, &options);
        assert_eq!(overridden.normalization.rotation, glam::Quat::IDENTITY);
    }

    #[test]
    fn desired_size_must_be_positive() {
        assert!(SceneOptions::default().validate().is_ok());
        for desired_size in [0.0, -1.0, f32::INFINITY] {
            let options = SceneOptions {
                desired_size,
                ..Default::default()
            };
            assert!(matches!(
                options.validate(),
                Err(SceneError::DesiredSize(_))
            ));
        }
    }
}
