//! Per-pixel source-over in linear light
use super::Tables;
use crate::{
    color::luminance_u16,
    gamma::{TransferTable, LIN_MAX},
    utils::{div_round, mul_u8},
    RGBA,
};

/// Source color with its linear channels and lightness precomputed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub color: RGBA,
    pub linear: [u16; 3],
    pub lightness: u16,
}

impl Source {
    pub fn new(tables: &Tables, color: RGBA) -> Self {
        let linear = decode(tables.gamma(), color);
        Self {
            color,
            linear,
            lightness: lightness(tables.luma(), linear),
        }
    }

    #[inline]
    pub fn alpha(&self) -> u8 {
        self.color.alpha()
    }
}

/// Linear channels of the color
#[inline]
pub fn decode(gamma: &TransferTable, color: RGBA) -> [u16; 3] {
    let [r, g, b] = color.to_rgb();
    [gamma.dir(r as u16), gamma.dir(g as u16), gamma.dir(b as u16)]
}

/// Perceptual lightness `0..=LUMA_MAX` of linear channels
#[inline]
pub fn lightness(luma: &TransferTable, linear: [u16; 3]) -> u16 {
    let [r, g, b] = linear;
    luma.inv(luminance_u16(r, g, b))
}

/// Interpolate from `from` to `to` by `t / 255`
#[inline]
pub fn lerp(from: u16, to: u16, t: u8) -> u16 {
    let t = t as u32;
    ((from as u32 * (255 - t) + to as u32 * t + 127) / 255) as u16
}

/// Effective coverage of the source, `coverage` already includes extra alpha
#[inline]
pub fn source_coverage(coverage: u8, src_alpha: u8) -> u8 {
    mul_u8(coverage as u32, src_alpha as u32) as u8
}

/// Destination pixel decoded for blending
#[derive(Debug, Clone, Copy)]
pub struct Target {
    pub color: RGBA,
    pub linear: [u16; 3],
    pub lightness: u16,
}

impl Target {
    #[inline]
    pub fn new(tables: &Tables, color: RGBA) -> Self {
        let linear = decode(tables.gamma(), color);
        Self {
            color,
            linear,
            lightness: lightness(tables.luma(), linear),
        }
    }
}

/// Composite source over destination in linear light with source coverage `ca`
///
/// With `lum_fix` enabled and an opaque destination, the result is scaled so
/// its luminance matches the luminance of the lightness interpolated between
/// destination and source.
pub fn source_over(tables: &Tables, src: &Source, dst: &Target, ca: u8, lum_fix: bool) -> RGBA {
    if ca == 0 {
        return dst.color;
    }
    let fs = ca as u32;
    let fd = mul_u8(dst.color.alpha() as u32, 255 - fs);
    let alpha = fs + fd;
    if alpha == 0 {
        return RGBA::TRANSPARENT;
    }
    let mut linear = [0u32; 3];
    for (out, (s, d)) in linear.iter_mut().zip(src.linear.iter().zip(dst.linear.iter())) {
        *out = (*s as u32 * fs + *d as u32 * fd + alpha / 2) / alpha;
    }

    if lum_fix && dst.color.is_opaque() {
        let target = tables.luma().dir(lerp(dst.lightness, src.lightness, ca)) as u32;
        let [r, g, b] = linear;
        let current = luminance_u16(r as u16, g as u16, b as u16) as u32;
        if current == 0 {
            linear = [target; 3];
        } else if current != target {
            for channel in linear.iter_mut() {
                *channel = (*channel * target / current).min(LIN_MAX as u32);
            }
        }
    }

    let gamma = tables.gamma();
    let [r, g, b] = linear;
    RGBA::new(
        gamma.encode_u8(r as u16),
        gamma.encode_u8(g as u16),
        gamma.encode_u8(b as u16),
        alpha as u8,
    )
}

/// Composite source over destination directly on encoded channel values
pub fn source_over_encoded(src: RGBA, dst: RGBA, ca: u8) -> RGBA {
    if ca == 0 {
        return dst;
    }
    let fs = ca as u32;
    let fd = mul_u8(dst.alpha() as u32, 255 - fs);
    let alpha = fs + fd;
    if alpha == 0 {
        return RGBA::TRANSPARENT;
    }
    let [sr, sg, sb] = src.to_rgb();
    let [dr, dg, db] = dst.to_rgb();
    let mix = |s: u8, d: u8| div_round(s as u32 * fs + d as u32 * fd, alpha) as u8;
    RGBA::new(mix(sr, dr), mix(sg, dg), mix(sb, db), alpha as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn tables() -> Tables {
        Tables::from_config(&Config::default())
    }

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(0, 4095, 0), 0);
        assert_eq!(lerp(0, 4095, 255), 4095);
        assert_eq!(lerp(100, 100, 77), 100);
        assert_eq!(lerp(0, 510, 128), 256);
    }

    #[test]
    fn test_source_over_ends() {
        let tables = tables();
        let src = Source::new(&tables, RGBA::new(200, 10, 30, 255));
        let dst = Target::new(&tables, RGBA::new(20, 40, 60, 255));
        assert_eq!(source_over(&tables, &src, &dst, 0, false), dst.color);
        assert_eq!(source_over(&tables, &src, &dst, 255, false), src.color);

        // transparent destination keeps source color with source coverage
        let dst = Target::new(&tables, RGBA::TRANSPARENT);
        assert_eq!(
            source_over(&tables, &src, &dst, 100, false),
            src.color.with_alpha(100)
        );
    }

    #[test]
    fn test_source_over_linear() {
        let tables = tables();
        let src = Source::new(&tables, RGBA::BLACK);
        let dst = Target::new(&tables, RGBA::WHITE);
        let half = source_over(&tables, &src, &dst, 128, false);
        // half of linear white is much lighter than half of encoded white
        assert!(half.red() > 180, "{:?}", half);
        assert_eq!(half.red(), half.green());
        assert!(half.is_opaque());
        let encoded = source_over_encoded(RGBA::BLACK, RGBA::WHITE, 128);
        assert_eq!(encoded.red(), 127);
    }

    #[test]
    fn test_lum_fix() {
        let tables = tables();
        let src = Source::new(&tables, RGBA::BLACK);
        let dst = Target::new(&tables, RGBA::WHITE);
        let plain = source_over(&tables, &src, &dst, 128, false);
        let fixed = source_over(&tables, &src, &dst, 128, true);
        // perceptual half-way grey is darker than linear half-way grey
        assert!(fixed.red() < plain.red(), "{:?} {:?}", fixed, plain);
        assert_eq!(fixed.red(), fixed.blue());
        // ends are not affected
        assert_eq!(source_over(&tables, &src, &dst, 255, true), RGBA::BLACK);
    }
}
