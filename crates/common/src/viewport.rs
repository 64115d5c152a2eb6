use serde::{Deserialize, Serialize};

/// Pixel size of the render surface. Never zero on either axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Build a viewport, clamping each axis to at least one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sizes_are_clamped() {
        let v = Viewport::new(0, 0);
        assert_eq!((v.width, v.height), (1, 1));
        assert_eq!(v.aspect_ratio(), 1.0);
    }

    #[test]
    fn aspect_ratio_is_width_over_height() {
        assert_eq!(Viewport::new(400, 300).aspect_ratio(), 400.0 / 300.0);
    }
}
