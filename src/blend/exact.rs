//! Reference tier, contrast correction is computed per pixel
use super::{
    kernel::{source_coverage, source_over, Source, Target},
    Tables,
};
use crate::{contrast::correct_exact, RGBA};

#[derive(Debug)]
pub struct ExactBlender<'a> {
    tables: &'a Tables,
    strength: f64,
    lum_fix: bool,
}

impl<'a> ExactBlender<'a> {
    /// Zero `strength` disables contrast correction
    pub fn new(tables: &'a Tables, strength: f64, lum_fix: bool) -> Self {
        Self {
            tables,
            strength,
            lum_fix,
        }
    }

    pub fn blend(&mut self, src: &Source, dst: RGBA, coverage: u8) -> RGBA {
        let ca = source_coverage(coverage, src.alpha());
        if ca == 0 {
            return dst;
        }
        let dst = Target::new(self.tables, dst);
        let ca = if self.strength > 0.0 && dst.color.alpha() != 0 {
            correct_exact(
                self.tables.luma(),
                self.strength,
                src.lightness,
                dst.lightness,
                ca,
            )
        } else {
            ca
        };
        source_over(self.tables, src, &dst, ca, self.lum_fix)
    }
}
