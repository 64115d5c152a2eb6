use meshview_common::Viewport;

/// RGBA8.
pub const BYTES_PER_PIXEL: u32 = 4;

/// Errors from copying staging memory into the CPU bitmap.
#[derive(Debug, thiserror::Error)]
pub enum BitmapError {
    #[error("staging target is {staging:?}, bitmap is {bitmap:?}")]
    ViewportMismatch { staging: Viewport, bitmap: Viewport },
    #[error("row pitch {row_pitch} is shorter than a {row_bytes}-byte pixel row")]
    PitchTooSmall { row_pitch: u32, row_bytes: u32 },
    #[error("staging memory holds {actual} bytes, layout requires {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Memory layout of a mapped staging target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingLayout {
    pub viewport: Viewport,
    /// Bytes between the starts of consecutive rows; at least one pixel row.
    pub row_pitch: u32,
}

impl StagingLayout {
    /// Rows with no padding.
    pub fn tight(viewport: Viewport) -> Self {
        Self {
            viewport,
            row_pitch: viewport.width * BYTES_PER_PIXEL,
        }
    }

    /// Rows padded up to a multiple of `alignment` bytes.
    pub fn aligned(viewport: Viewport, alignment: u32) -> Self {
        let row_bytes = viewport.width * BYTES_PER_PIXEL;
        Self {
            viewport,
            row_pitch: row_bytes.div_ceil(alignment) * alignment,
        }
    }

    pub fn row_bytes(&self) -> u32 {
        self.viewport.width * BYTES_PER_PIXEL
    }

    pub fn size_bytes(&self) -> usize {
        self.row_pitch as usize * self.viewport.height as usize
    }
}

/// CPU-addressable RGBA8 image handed to the UI layer, rows tightly packed.
#[derive(Debug, Clone)]
pub struct CpuBitmap {
    viewport: Viewport,
    pixels: Vec<u8>,
}

impl CpuBitmap {
    /// An opaque black bitmap.
    pub fn new(viewport: Viewport) -> Self {
        let pixels = [0, 0, 0, u8::MAX]
            .into_iter()
            .cycle()
            .take(viewport.pixel_count() * BYTES_PER_PIXEL as usize)
            .collect();
        Self { viewport, pixels }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn width(&self) -> u32 {
        self.viewport.width
    }

    pub fn height(&self) -> u32 {
        self.viewport.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy mapped staging bytes into the bitmap, byte for byte.
    ///
    /// Both sides are validated before anything is written: the staging
    /// viewport must equal the bitmap's and `src` must be exactly the size
    /// the layout describes. Row padding in `src` is skipped.
    pub fn copy_from_staging(&mut self, src: &[u8], layout: &StagingLayout) -> Result<(), BitmapError> {
        if layout.viewport != self.viewport {
            return Err(BitmapError::ViewportMismatch {
                staging: layout.viewport,
                bitmap: self.viewport,
            });
        }
        let row_bytes = layout.row_bytes();
        if layout.row_pitch < row_bytes {
            return Err(BitmapError::PitchTooSmall {
                row_pitch: layout.row_pitch,
                row_bytes,
            });
        }
        if src.len() != layout.size_bytes() {
            return Err(BitmapError::SizeMismatch {
                expected: layout.size_bytes(),
                actual: src.len(),
            });
        }

        if layout.row_pitch == row_bytes {
            self.pixels.copy_from_slice(src);
        } else {
            let row_bytes = row_bytes as usize;
            for (dst, src) in self
                .pixels
                .chunks_exact_mut(row_bytes)
                .zip(src.chunks_exact(layout.row_pitch as usize))
            {
                dst.copy_from_slice(&src[..row_bytes]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bitmap_is_opaque_black() {
        let bitmap = CpuBitmap::new(Viewport::new(3, 2));
        assert_eq!(bitmap.pixels().len(), 24);
        assert!(bitmap.pixels().chunks(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn tight_copy_is_byte_for_byte() {
        let viewport = Viewport::new(2, 2);
        let mut bitmap = CpuBitmap::new(viewport);
        let src: Vec<u8> = (0..16).collect();
        bitmap
            .copy_from_staging(&src, &StagingLayout::tight(viewport))
            .unwrap();
        assert_eq!(bitmap.pixels(), src.as_slice());
    }

    #[test]
    fn padded_rows_are_skipped() {
        let viewport = Viewport::new(3, 2);
        let layout = StagingLayout::aligned(viewport, 16);
        assert_eq!(layout.row_pitch, 16);

        let mut src = vec![0xEE; layout.size_bytes()];
        src[..12].fill(1);
        src[16..28].fill(2);

        let mut bitmap = CpuBitmap::new(viewport);
        bitmap.copy_from_staging(&src, &layout).unwrap();
        assert!(bitmap.pixels()[..12].iter().all(|&b| b == 1));
        assert!(bitmap.pixels()[12..].iter().all(|&b| b == 2));
    }

    #[test]
    fn wrong_length_is_rejected_untouched() {
        let viewport = Viewport::new(2, 2);
        let mut bitmap = CpuBitmap::new(viewport);
        let err = bitmap
            .copy_from_staging(&[7u8; 15], &StagingLayout::tight(viewport))
            .unwrap_err();
        assert!(matches!(err, BitmapError::SizeMismatch { expected: 16, actual: 15 }));
        assert_eq!(bitmap.pixels()[0..4], [0, 0, 0, 255]);
    }

    #[test]
    fn viewport_mismatch_is_rejected() {
        let mut bitmap = CpuBitmap::new(Viewport::new(4, 4));
        let layout = StagingLayout::tight(Viewport::new(2, 2));
        let err = bitmap.copy_from_staging(&[0; 16], &layout).unwrap_err();
        assert!(matches!(err, BitmapError::ViewportMismatch { .. }));
    }

    #[test]
    fn short_pitch_is_rejected() {
        let viewport = Viewport::new(2, 1);
        let mut bitmap = CpuBitmap::new(viewport);
        let layout = StagingLayout {
            viewport,
            row_pitch: 4,
        };
        let err = bitmap.copy_from_staging(&[0; 4], &layout).unwrap_err();
        assert!(matches!(err, BitmapError::PitchTooSmall { .. }));
    }
}
