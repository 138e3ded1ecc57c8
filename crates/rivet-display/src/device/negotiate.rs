use crate::error::DisplayError;
use crate::pixel::{FormatSupport, PixelFormat};

/// Back-buffer candidates for 32 bpp, in preference order.
pub const BACK_BUFFER_32: [PixelFormat; 3] =
    [PixelFormat::Rgba8, PixelFormat::Bgra8, PixelFormat::Bgrx8];

/// Back-buffer candidates for 16 bpp, in preference order.
pub const BACK_BUFFER_16: [PixelFormat; 2] = [PixelFormat::Bgra4, PixelFormat::Bgr5a1];

/// Support every back-buffer format must report.
pub const BACK_BUFFER_REQUIRED: FormatSupport =
    FormatSupport::RENDER_TARGET.union(FormatSupport::DISPLAY);

/// Returns the first candidate for `bpp` that can be rendered to and presented.
///
/// `Ok(None)` means no candidate qualified; callers may retry with another depth.
pub fn find_back_buffer_format(
    bpp: u32,
    query: impl Fn(PixelFormat) -> FormatSupport,
) -> Result<Option<PixelFormat>, DisplayError> {
    let candidates: &[PixelFormat] = match bpp {
        16 => &BACK_BUFFER_16,
        32 => &BACK_BUFFER_32,
        _ => return Err(DisplayError::UnsupportedFormat(bpp)),
    };

    for &format in candidates {
        let support = query(format);
        let ok = support.contains(BACK_BUFFER_REQUIRED);
        log::trace!("back buffer {format:?}: {support:?} -> {}", if ok { "accepted" } else { "rejected" });
        if ok {
            return Ok(Some(format));
        }
    }

    log::debug!("no {bpp} bpp back buffer format supported");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(target: PixelFormat) -> impl Fn(PixelFormat) -> FormatSupport {
        move |f| {
            if f == target {
                BACK_BUFFER_REQUIRED
            } else {
                FormatSupport::TEXTURE_2D
            }
        }
    }

    #[test]
    fn picks_third_candidate_when_only_it_qualifies() {
        let got = find_back_buffer_format(32, only(PixelFormat::Bgrx8)).unwrap();
        assert_eq!(got, Some(PixelFormat::Bgrx8));
    }

    #[test]
    fn prefers_earlier_candidates() {
        let got = find_back_buffer_format(32, |_| BACK_BUFFER_REQUIRED).unwrap();
        assert_eq!(got, Some(PixelFormat::Rgba8));
    }

    #[test]
    fn none_qualifying_is_not_an_error() {
        assert_eq!(find_back_buffer_format(32, |_| FormatSupport::empty()).unwrap(), None);
        assert_eq!(find_back_buffer_format(16, |_| FormatSupport::RENDER_TARGET).unwrap(), None);
    }

    #[test]
    fn sixteen_bit_tries_legacy_formats() {
        let got = find_back_buffer_format(16, only(PixelFormat::Bgr5a1)).unwrap();
        assert_eq!(got, Some(PixelFormat::Bgr5a1));
    }

    #[test]
    fn other_depths_fail() {
        assert!(matches!(
            find_back_buffer_format(24, |_| BACK_BUFFER_REQUIRED),
            Err(DisplayError::UnsupportedFormat(24))
        ));
    }
}
