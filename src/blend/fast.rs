//! Constant color tier
//!
//! Source is decoded once and its contrast bucket resolved up front. Result of the
//! previous pixel is reused while destination color and coverage repeat, which is
//! the common case inside large shapes over flat backgrounds.
use super::{
    kernel::{source_coverage, source_over, Source, Target},
    Tables,
};
use crate::{contrast::ContrastTable, RGBA};

#[derive(Debug)]
pub struct FastBlender<'a> {
    tables: &'a Tables,
    contrast: Option<&'a ContrastTable>,
    src_bucket: usize,
    lum_fix: bool,
    last: Option<(RGBA, u8, RGBA)>,
    hits: usize,
}

impl<'a> FastBlender<'a> {
    pub fn new(
        tables: &'a Tables,
        src: &Source,
        contrast: Option<&'a ContrastTable>,
        lum_fix: bool,
    ) -> Self {
        Self {
            tables,
            contrast,
            src_bucket: contrast.map_or(0, |table| table.bucket(src.lightness)),
            lum_fix,
            last: None,
            hits: 0,
        }
    }

    /// Number of pixels resolved from the cached result
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// `src` must be the same source the blender was created with
    pub fn blend(&mut self, src: &Source, dst: RGBA, coverage: u8) -> RGBA {
        if let Some((last_dst, last_coverage, result)) = self.last {
            if last_dst == dst && last_coverage == coverage {
                self.hits += 1;
                return result;
            }
        }
        let result = self.blend_uncached(src, dst, coverage);
        self.last = Some((dst, coverage, result));
        result
    }

    fn blend_uncached(&self, src: &Source, dst: RGBA, coverage: u8) -> RGBA {
        let ca = source_coverage(coverage, src.alpha());
        if ca == 0 {
            return dst;
        }
        let dst = Target::new(self.tables, dst);
        let ca = match self.contrast {
            Some(table) if dst.color.alpha() != 0 => {
                table.row(self.src_bucket, table.bucket(dst.lightness))[ca as usize]
            }
            _ => ca,
        };
        source_over(self.tables, src, &dst, ca, self.lum_fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_fast_cache() {
        let tables = Tables::from_config(&Config::default());
        let src = Source::new(&tables, RGBA::new(10, 20, 200, 255));
        let mut fast = FastBlender::new(&tables, &src, Some(tables.fast()), false);
        let first = fast.blend(&src, RGBA::WHITE, 100);
        for _ in 0..10 {
            assert_eq!(fast.blend(&src, RGBA::WHITE, 100), first);
        }
        assert_eq!(fast.hits(), 10);
        let other = fast.blend(&src, RGBA::WHITE, 101);
        assert_eq!(other, fast.blend_uncached(&src, RGBA::WHITE, 101));
        assert_eq!(fast.hits(), 10);
        assert_eq!(fast.blend(&src, RGBA::WHITE, 100), first);
        assert_eq!(fast.hits(), 10);
        assert_eq!(fast.blend(&src, RGBA::BLACK, 0), RGBA::BLACK);
    }
}
