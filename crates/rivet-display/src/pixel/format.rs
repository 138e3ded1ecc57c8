/// Pixel formats understood by the display layer.
///
/// Multi-byte formats are described as little-endian packed values, so channel masks
/// apply to the integer read from `bytes_per_pixel` consecutive bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    /// Like `Bgra8` with the alpha byte ignored.
    Bgrx8,
    Bgra4,
    Bgr5a1,
    Rgb8,
    /// 8-bit palette indices; colours live in a separate 256-entry palette.
    Paletted,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 7] = [
        PixelFormat::Rgba8,
        PixelFormat::Bgra8,
        PixelFormat::Bgrx8,
        PixelFormat::Bgra4,
        PixelFormat::Bgr5a1,
        PixelFormat::Rgb8,
        PixelFormat::Paletted,
    ];

    pub fn desc(self) -> &'static PixelFormatDesc {
        match self {
            PixelFormat::Rgba8 => &RGBA8,
            PixelFormat::Bgra8 => &BGRA8,
            PixelFormat::Bgrx8 => &BGRX8,
            PixelFormat::Bgra4 => &BGRA4,
            PixelFormat::Bgr5a1 => &BGR5A1,
            PixelFormat::Rgb8 => &RGB8,
            PixelFormat::Paletted => &PALETTED,
        }
    }

    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        (self.desc().bits_per_pixel / 8) as usize
    }

    #[inline]
    pub fn is_paletted(self) -> bool {
        self == PixelFormat::Paletted
    }
}

/// Bit layout of a pixel format.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PixelFormatDesc {
    pub bits_per_pixel: u32,
    /// Channel masks in `[r, g, b, a]` order. All zero for paletted data.
    pub masks: [u32; 4],
}

const RGBA8: PixelFormatDesc = PixelFormatDesc {
    bits_per_pixel: 32,
    masks: [0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000],
};

const BGRA8: PixelFormatDesc = PixelFormatDesc {
    bits_per_pixel: 32,
    masks: [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000],
};

const BGRX8: PixelFormatDesc = PixelFormatDesc {
    bits_per_pixel: 32,
    masks: [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0],
};

const BGRA4: PixelFormatDesc = PixelFormatDesc {
    bits_per_pixel: 16,
    masks: [0x0F00, 0x00F0, 0x000F, 0xF000],
};

const BGR5A1: PixelFormatDesc = PixelFormatDesc {
    bits_per_pixel: 16,
    masks: [0x7C00, 0x03E0, 0x001F, 0x8000],
};

const RGB8: PixelFormatDesc = PixelFormatDesc {
    bits_per_pixel: 24,
    masks: [0x0000_FF, 0x00_FF00, 0xFF_0000, 0],
};

const PALETTED: PixelFormatDesc = PixelFormatDesc {
    bits_per_pixel: 8,
    masks: [0; 4],
};

bitflags::bitflags! {
    /// Capabilities a device reports for one pixel format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FormatSupport: u32 {
        /// Can be sampled as a 2D texture.
        const TEXTURE_2D = 1 << 0;
        /// Can be bound as a colour render target.
        const RENDER_TARGET = 1 << 1;
        /// Can be presented by the swapchain.
        const DISPLAY = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_do_not_overlap() {
        for f in PixelFormat::ALL {
            let m = f.desc().masks;
            for i in 0..4 {
                for j in (i + 1)..4 {
                    assert_eq!(m[i] & m[j], 0, "{f:?} channels {i} and {j} overlap");
                }
            }
        }
    }

    #[test]
    fn bytes_per_pixel_matches_bits() {
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Bgr5a1.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Paletted.bytes_per_pixel(), 1);
    }

    #[test]
    fn support_contains_requires_every_bit() {
        let s = FormatSupport::TEXTURE_2D | FormatSupport::RENDER_TARGET;
        assert!(s.contains(FormatSupport::RENDER_TARGET));
        assert!(!s.contains(FormatSupport::RENDER_TARGET | FormatSupport::DISPLAY));
        assert!(FormatSupport::empty().is_empty());
    }
}
