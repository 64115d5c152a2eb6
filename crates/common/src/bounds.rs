use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Component-wise min/max over `points`. `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Size along the longest single axis.
    pub fn largest_extent(&self) -> f32 {
        self.extent().max_element()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_points_have_no_bounds() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn bounds_cover_all_points() {
        let b = Aabb::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 4.0, 0.0),
            Vec3::new(0.0, 0.0, 3.0),
        ])
        .unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 4.0, 3.0));
        assert_eq!(b.center(), Vec3::new(0.0, 1.0, 1.5));
        assert_eq!(b.largest_extent(), 6.0);
    }
}
