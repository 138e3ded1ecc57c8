//! CPU mip chain generation for 32-bit formats.

use super::PixelFormat;

/// Number of levels in a full chain down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// True if `downsample` can average this format channel-by-channel.
pub fn can_generate(format: PixelFormat) -> bool {
    matches!(
        format,
        PixelFormat::Rgba8 | PixelFormat::Bgra8 | PixelFormat::Bgrx8
    )
}

/// Halves a tightly packed 4-byte-per-pixel image with a 2x2 box filter.
///
/// Odd edges reuse the last row/column. Returns the new image and its extent.
pub fn downsample(src: &[u8], width: u32, height: u32) -> (Vec<u8>, u32, u32) {
    let nw = (width / 2).max(1);
    let nh = (height / 2).max(1);
    let mut out = vec![0u8; (nw * nh * 4) as usize];

    let texel = |x: u32, y: u32, c: usize| -> u32 {
        let x = x.min(width - 1);
        let y = y.min(height - 1);
        src[((y * width + x) * 4) as usize + c] as u32
    };

    for y in 0..nh {
        for x in 0..nw {
            let (sx, sy) = (x * 2, y * 2);
            for c in 0..4 {
                let sum = texel(sx, sy, c)
                    + texel(sx + 1, sy, c)
                    + texel(sx, sy + 1, c)
                    + texel(sx + 1, sy + 1, c);
                out[((y * nw + x) * 4) as usize + c] = ((sum + 2) / 4) as u8;
            }
        }
    }

    (out, nw, nh)
}
