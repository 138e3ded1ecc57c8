//! Format-aware pixel copies into mapped texture memory.

use crate::error::DisplayError;

use super::{PixelFormat, Surface};

/// Copies the top-left `width` x `height` pixels of `src` into `dst`, converting to
/// `dst_format`. `dst` rows are `dst_pitch` bytes apart.
pub fn blit(
    src: &Surface,
    dst_format: PixelFormat,
    dst: &mut [u8],
    dst_pitch: usize,
    width: u32,
    height: u32,
) -> Result<(), DisplayError> {
    debug_assert!(width <= src.width && height <= src.height);

    let src_bpp = src.format.bytes_per_pixel();
    let dst_bpp = dst_format.bytes_per_pixel();
    let row_len = width as usize * dst_bpp;

    if src.format == dst_format {
        for y in 0..height {
            let s = &src.row(y)[..width as usize * src_bpp];
            let start = y as usize * dst_pitch;
            dst[start..start + row_len].copy_from_slice(s);
        }
        return Ok(());
    }

    if dst_format.is_paletted() {
        return Err(DisplayError::UnsupportedConversion {
            from: src.format,
            to: dst_format,
        });
    }

    let palette = match (src.format.is_paletted(), src.palette.as_deref()) {
        (true, Some(p)) => Some(p),
        (true, None) => {
            return Err(DisplayError::UnsupportedConversion {
                from: src.format,
                to: dst_format,
            });
        }
        (false, _) => None,
    };

    for y in 0..height {
        let row = src.row(y);
        let start = y as usize * dst_pitch;
        let out = &mut dst[start..start + row_len];
        for x in 0..width as usize {
            let rgba = match palette {
                Some(p) => p[row[x] as usize],
                None => unpack(src.format, read_pixel(&row[x * src_bpp..], src_bpp)),
            };
            write_pixel(&mut out[x * dst_bpp..], dst_bpp, pack(dst_format, rgba));
        }
    }

    Ok(())
}

fn read_pixel(bytes: &[u8], bpp: usize) -> u32 {
    let mut v = 0u32;
    for (i, b) in bytes[..bpp].iter().enumerate() {
        v |= (*b as u32) << (8 * i);
    }
    v
}

fn write_pixel(bytes: &mut [u8], bpp: usize, v: u32) {
    for (i, b) in bytes[..bpp].iter_mut().enumerate() {
        *b = (v >> (8 * i)) as u8;
    }
}

fn unpack(format: PixelFormat, v: u32) -> [u8; 4] {
    let masks = format.desc().masks;
    let mut out = [0u8; 4];
    for (c, &mask) in masks.iter().enumerate() {
        out[c] = if mask == 0 {
            // Missing alpha reads as opaque; missing colour reads as black.
            if c == 3 { 0xFF } else { 0 }
        } else {
            let shift = mask.trailing_zeros();
            let max = mask >> shift;
            (((v & mask) >> shift) * 255 / max) as u8
        };
    }
    out
}

fn pack(format: PixelFormat, rgba: [u8; 4]) -> u32 {
    let masks = format.desc().masks;
    let mut v = 0u32;
    for (c, &mask) in masks.iter().enumerate() {
        if mask == 0 {
            continue;
        }
        let shift = mask.trailing_zeros();
        let max = mask >> shift;
        v |= ((rgba[c] as u32 * max + 127) / 255) << shift;
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_format_copies_rows_into_pitched_destination() {
        let src = Surface::from_pixels(2, 2, PixelFormat::Rgba8, (0..16).collect());
        let mut dst = vec![0u8; 2 * 12];
        blit(&src, PixelFormat::Rgba8, &mut dst, 12, 2, 2).unwrap();
        assert_eq!(&dst[0..8], &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(&dst[8..12], &[0, 0, 0, 0]);
        assert_eq!(&dst[12..20], &[8, 9, 10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn rgba_to_bgra_swaps_red_and_blue() {
        let src = Surface::from_pixels(1, 1, PixelFormat::Rgba8, vec![10, 20, 30, 40]);
        let mut dst = vec![0u8; 4];
        blit(&src, PixelFormat::Bgra8, &mut dst, 4, 1, 1).unwrap();
        assert_eq!(dst, vec![30, 20, 10, 40]);
    }

    #[test]
    fn rgba_to_bgr5a1_quantizes() {
        let src = Surface::from_pixels(1, 1, PixelFormat::Rgba8, vec![255, 0, 255, 255]);
        let mut dst = vec![0u8; 2];
        blit(&src, PixelFormat::Bgr5a1, &mut dst, 2, 1, 1).unwrap();
        let v = u16::from_le_bytes([dst[0], dst[1]]);
        assert_eq!(v, 0x7C00 | 0x001F | 0x8000);
    }

    #[test]
    fn missing_alpha_reads_opaque() {
        let src = Surface::from_pixels(1, 1, PixelFormat::Rgb8, vec![1, 2, 3]);
        let mut dst = vec![0u8; 4];
        blit(&src, PixelFormat::Rgba8, &mut dst, 4, 1, 1).unwrap();
        assert_eq!(dst, vec![1, 2, 3, 255]);
    }

    #[test]
    fn paletted_source_expands_through_palette() {
        let mut palette = [[0u8; 4]; 256];
        palette[7] = [9, 8, 7, 6];
        let src = Surface::from_pixels(1, 1, PixelFormat::Paletted, vec![7]).with_palette(palette);
        let mut dst = vec![0u8; 4];
        blit(&src, PixelFormat::Rgba8, &mut dst, 4, 1, 1).unwrap();
        assert_eq!(dst, vec![9, 8, 7, 6]);
    }

    #[test]
    fn converting_into_paletted_is_rejected() {
        let src = Surface::from_pixels(1, 1, PixelFormat::Rgba8, vec![0; 4]);
        let mut dst = vec![0u8; 1];
        assert!(blit(&src, PixelFormat::Paletted, &mut dst, 1, 1, 1).is_err());
    }
}
