//! Blending on encoded channel values without lookup tables
use super::kernel::{source_coverage, source_over_encoded};
use crate::RGBA;

#[derive(Debug, Default)]
pub struct LegacyBlender;

impl LegacyBlender {
    pub fn blend(&mut self, src: RGBA, dst: RGBA, coverage: u8) -> RGBA {
        source_over_encoded(src, dst, source_coverage(coverage, src.alpha()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy() {
        let mut legacy = LegacyBlender;
        let red = RGBA::new(255, 0, 0, 255);
        assert_eq!(legacy.blend(red, RGBA::WHITE, 0), RGBA::WHITE);
        assert_eq!(legacy.blend(red, RGBA::WHITE, 255), red);
        assert_eq!(legacy.blend(red, RGBA::WHITE, 128), RGBA::new(255, 127, 127, 255));
        // half transparent source at full coverage
        assert_eq!(legacy.blend(red.with_alpha(128), RGBA::BLACK, 255), RGBA::new(128, 0, 0, 255));
        assert_eq!(legacy.blend(red, RGBA::TRANSPARENT, 64), red.with_alpha(64));
    }
}
