//! Model normalization: maps arbitrary mesh bounds into the unit viewing
//! volume around the origin.

use glam::{Mat4, Quat, Vec3};
use meshview_common::Aabb;
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Edge length of the viewing volume a mesh is scaled into.
pub const DESIRED_SIZE: f32 = 2.0;

/// Up-axis convention of a mesh source format. The viewer is Y-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpAxis {
    #[default]
    Y,
    Z,
}

impl UpAxis {
    /// Rotation that brings this axis onto the viewer's +Y.
    pub fn correction(self) -> Quat {
        match self {
            UpAxis::Y => Quat::IDENTITY,
            UpAxis::Z => Quat::from_rotation_x(-FRAC_PI_2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    pub desired_size: f32,
    pub up_axis: UpAxis,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            desired_size: DESIRED_SIZE,
            up_axis: UpAxis::Y,
        }
    }
}

/// Decomposed model transform: translate by `-center`, scale uniformly, then
/// apply the up-axis correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub center: Vec3,
    pub scale: f32,
    pub rotation: Quat,
}

impl Normalization {
    pub const IDENTITY: Self = Self {
        center: Vec3::ZERO,
        scale: 1.0,
        rotation: Quat::IDENTITY,
    };

    /// Translation applied before scaling.
    pub fn translation(&self) -> Vec3 {
        -self.center
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_quat(self.rotation)
            * Mat4::from_scale(Vec3::splat(self.scale))
            * Mat4::from_translation(self.translation())
    }
}

impl Default for Normalization {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Compute the normalizing transform for a set of vertex positions.
///
/// The scale divides `desired_size` by the largest single-axis extent, not
/// the bounding-box diagonal. A non-positive or non-finite result falls back
/// to 1.0.
pub fn normalize(
    positions: impl IntoIterator<Item = Vec3>,
    options: &NormalizeOptions,
) -> Normalization {
    let Some(bounds) = Aabb::from_points(positions) else {
        return Normalization::IDENTITY;
    };

    let model_size = bounds.largest_extent();
    let mut scale = options.desired_size / model_size;
    if !(scale.is_finite() && scale > 0.0) {
        tracing::warn!(
            model_size,
            desired_size = options.desired_size,
            "degenerate normalization scale, falling back to unit scale"
        );
        scale = 1.0;
    }

    Normalization {
        center: bounds.center(),
        scale,
        rotation: options.up_axis.correction(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn transformed_bounds(n: &Normalization, points: &[Vec3]) -> Aabb {
        let m = n.matrix();
        Aabb::from_points(points.iter().map(|p| m.transform_point3(*p))).unwrap()
    }

    #[test]
    fn cube_is_scaled_by_largest_axis() {
        let points = [Vec3::splat(-1.0), Vec3::splat(3.0)];
        let n = normalize(points, &NormalizeOptions::default());
        assert_eq!(n.scale, 0.5);
        assert_eq!(n.translation(), Vec3::splat(-1.0));
        assert!(n.matrix().transform_point3(Vec3::ONE).length() < EPS);
    }

    #[test]
    fn uses_largest_axis_not_diagonal() {
        let points = [Vec3::ZERO, Vec3::new(4.0, 1.0, 1.0)];
        let n = normalize(points, &NormalizeOptions::default());
        assert_eq!(n.scale, 0.5);
    }

    #[test]
    fn result_is_centered_with_desired_extent() {
        let points = [
            Vec3::new(10.0, -3.0, 7.0),
            Vec3::new(12.5, 4.0, 7.5),
            Vec3::new(11.0, 0.0, 9.0),
        ];
        for up_axis in [UpAxis::Y, UpAxis::Z] {
            let options = NormalizeOptions {
                up_axis,
                ..Default::default()
            };
            let n = normalize(points, &options);
            let b = transformed_bounds(&n, &points);
            assert!(b.center().length() < EPS, "{up_axis:?}: {:?}", b.center());
            assert!((b.largest_extent() - DESIRED_SIZE).abs() < EPS);
        }
    }

    #[test]
    fn single_point_gets_unit_scale() {
        let points = [Vec3::new(2.0, 2.0, 2.0); 3];
        let n = normalize(points, &NormalizeOptions::default());
        assert_eq!(n.scale, 1.0);
        assert!(n.matrix().is_finite());
        assert_eq!(n.matrix().transform_point3(points[0]), Vec3::ZERO);
    }

    #[test]
    fn empty_input_is_identity() {
        let n = normalize(std::iter::empty(), &NormalizeOptions::default());
        assert_eq!(n, Normalization::IDENTITY);
        assert_eq!(n.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn z_up_maps_onto_y_up() {
        let q = UpAxis::Z.correction();
        assert!((q * Vec3::Z - Vec3::Y).length() < EPS);
        assert_eq!(UpAxis::Y.correction(), Quat::IDENTITY);
    }

    #[test]
    fn non_positive_desired_size_gets_unit_scale() {
        let points = [Vec3::ZERO, Vec3::new(4.0, 1.0, 1.0)];
        for desired_size in [0.0, -2.0] {
            let options = NormalizeOptions {
                desired_size,
                up_axis: UpAxis::Y,
            };
            assert_eq!(normalize(points, &options).scale, 1.0);
        }
    }
}
