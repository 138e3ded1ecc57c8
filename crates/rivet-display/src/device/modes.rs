use std::collections::BTreeSet;

use crate::backend::OutputDesc;

/// Refresh rate as a reduced fraction of hertz.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Rational {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        if denominator == 0 {
            return Self {
                numerator: 0,
                denominator: 1,
            };
        }
        let g = gcd(numerator, denominator).max(1);
        Self {
            numerator: numerator / g,
            denominator: denominator / g,
        }
    }

    pub fn from_millihertz(mhz: u32) -> Self {
        Self::new(mhz, 1000)
    }

    pub fn hz(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Nearest whole rate, as the video mode parameters express it.
    pub fn rounded_hz(self) -> u32 {
        self.hz().round() as u32
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh: Rational,
}

/// Rectangle in desktop coordinates.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct DisplayRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySpec {
    pub name: String,
    pub modes: BTreeSet<DisplayMode>,
    pub current: Option<DisplayMode>,
    pub bounds: DisplayRect,
}

/// Builds one `DisplaySpec` per output. Modes are de-duplicated by
/// `(width, height, refresh)`; if the active mode is unknown the first enumerated mode
/// stands in for it.
pub fn enumerate(outputs: &[OutputDesc]) -> Vec<DisplaySpec> {
    outputs
        .iter()
        .map(|out| {
            let modes: BTreeSet<DisplayMode> = out.modes.iter().copied().collect();
            let current = out.current.or_else(|| {
                let first = out.modes.first().copied();
                if first.is_some() {
                    log::warn!("{}: active mode unavailable; using first enumerated mode", out.name);
                }
                first
            });
            DisplaySpec {
                name: out.name.clone(),
                modes,
                current,
                bounds: out.desktop,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(w: u32, h: u32, mhz: u32) -> DisplayMode {
        DisplayMode {
            width: w,
            height: h,
            refresh: Rational::from_millihertz(mhz),
        }
    }

    fn output(modes: Vec<DisplayMode>, current: Option<DisplayMode>) -> OutputDesc {
        OutputDesc {
            name: "out".into(),
            desktop: DisplayRect {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            },
            modes,
            current,
        }
    }

    #[test]
    fn rational_is_reduced() {
        let r = Rational::from_millihertz(60_000);
        assert_eq!(r, Rational::new(60, 1));
        assert_eq!(Rational::from_millihertz(59_940).rounded_hz(), 60);
    }

    #[test]
    fn duplicate_modes_collapse() {
        let out = output(
            vec![mode(1920, 1080, 60_000), mode(1920, 1080, 60_000), mode(1280, 720, 60_000)],
            None,
        );
        let specs = enumerate(&[out]);
        assert_eq!(specs[0].modes.len(), 2);
    }

    #[test]
    fn same_size_different_rate_is_kept() {
        let out = output(vec![mode(1920, 1080, 60_000), mode(1920, 1080, 59_940)], None);
        assert_eq!(enumerate(&[out])[0].modes.len(), 2);
    }

    #[test]
    fn active_mode_falls_back_to_first() {
        let first = mode(800, 600, 75_000);
        let specs = enumerate(&[output(vec![first, mode(640, 480, 60_000)], None)]);
        assert_eq!(specs[0].current, Some(first));
        assert_eq!(specs[0].bounds.width, 1920);
    }

    #[test]
    fn reported_active_mode_wins() {
        let active = mode(640, 480, 60_000);
        let specs = enumerate(&[output(vec![mode(800, 600, 75_000)], Some(active))]);
        assert_eq!(specs[0].current, Some(active));
    }

    #[test]
    fn no_outputs_is_empty() {
        assert!(enumerate(&[]).is_empty());
    }
}
