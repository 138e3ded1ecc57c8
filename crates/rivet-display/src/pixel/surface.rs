use super::PixelFormat;

/// One palette entry per index, RGBA.
pub type Palette = [[u8; 4]; 256];

/// CPU-side image handed to the display for upload.
///
/// Rows are `pitch` bytes apart; only the first `width * bytes_per_pixel` bytes of a row
/// carry pixels.
#[derive(Debug, Clone)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
    /// Present only for `PixelFormat::Paletted`.
    pub palette: Option<Box<Palette>>,
}

impl Surface {
    /// Creates a zeroed surface with a tightly packed pitch.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let pitch = width * format.bytes_per_pixel() as u32;
        let palette = format.is_paletted().then(|| Box::new([[0u8; 4]; 256]));
        Self {
            width,
            height,
            pitch,
            format,
            pixels: vec![0; (pitch * height) as usize],
            palette,
        }
    }

    /// Wraps existing tightly packed pixel data.
    pub fn from_pixels(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Self {
        let pitch = width * format.bytes_per_pixel() as u32;
        debug_assert_eq!(pixels.len(), (pitch * height) as usize);
        Self {
            width,
            height,
            pitch,
            format,
            pixels,
            palette: None,
        }
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = Some(Box::new(palette));
        self
    }

    /// Returns the bytes of row `y`, trimmed to the pixel payload.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.pitch) as usize;
        let len = self.width as usize * self.format.bytes_per_pixel();
        &self.pixels[start..start + len]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = (y * self.pitch) as usize;
        let len = self.width as usize * self.format.bytes_per_pixel();
        &mut self.pixels[start..start + len]
    }
}

/// Rectangle inside a texture, in texels.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// True if the region lies entirely inside a `width` x `height` image.
    pub fn fits_within(self, width: u32, height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= width && b <= height)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_fits_exact_bounds() {
        assert!(Region::new(10, 0, 30, 40).fits_within(40, 40));
    }

    #[test]
    fn region_past_right_edge_does_not_fit() {
        assert!(!Region::new(10, 0, 50, 10).fits_within(40, 40));
    }

    #[test]
    fn region_overflow_does_not_fit() {
        assert!(!Region::new(u32::MAX, 0, 2, 1).fits_within(40, 40));
    }

    #[test]
    fn new_paletted_surface_carries_palette() {
        let s = Surface::new(4, 4, PixelFormat::Paletted);
        assert!(s.palette.is_some());
        assert_eq!(s.pixels.len(), 16);
    }

    #[test]
    fn row_respects_pitch() {
        let mut s = Surface::new(2, 2, PixelFormat::Rgba8);
        s.pitch = 12;
        s.pixels = (0..24).collect();
        assert_eq!(s.row(1), &[12, 13, 14, 15, 16, 17, 18, 19]);
    }
}
