//! Table driven tier, lightness is quantized into contrast table buckets
use super::{
    kernel::{source_coverage, source_over, Source, Target},
    Tables,
};
use crate::{contrast::ContrastTable, RGBA};

#[derive(Debug)]
pub struct StandardBlender<'a> {
    tables: &'a Tables,
    contrast: Option<&'a ContrastTable>,
    lum_fix: bool,
}

impl<'a> StandardBlender<'a> {
    pub fn new(tables: &'a Tables, contrast: Option<&'a ContrastTable>, lum_fix: bool) -> Self {
        Self {
            tables,
            contrast,
            lum_fix,
        }
    }

    pub fn blend(&mut self, src: &Source, dst: RGBA, coverage: u8) -> RGBA {
        let ca = source_coverage(coverage, src.alpha());
        if ca == 0 {
            return dst;
        }
        let dst = Target::new(self.tables, dst);
        let ca = match self.contrast {
            Some(table) if dst.color.alpha() != 0 => {
                table.correct(src.lightness, dst.lightness, ca)
            }
            _ => ca,
        };
        source_over(self.tables, src, &dst, ca, self.lum_fix)
    }
}
