//! Contrast correction of coverage
//!
//! Blending in linear light makes thin dark features on light backgrounds look
//! lighter than blending in perceptual space. Correction replaces coverage `a`
//! with the coverage that produces the lightness a perceptual blend would have,
//! mixed with the original coverage according to the configured strength.
use crate::gamma::{TransferTable, LIN_MAX, LUMA_MAX};

/// Number of lightness buckets of the standard table
pub const STANDARD_BUCKETS: usize = 64;
/// Number of lightness buckets of the fast table
pub const FAST_BUCKETS: usize = 32;
/// Luminance difference (as a fraction of `LIN_MAX`) below which coverage is kept
pub const CONTRAST_EPSILON: f64 = 1.0 / 512.0;

/// Corrected coverage for source and destination lightness in `0..=LUMA_MAX`
pub fn correct_exact(luma: &TransferTable, strength: f64, src: u16, dst: u16, alpha: u8) -> u8 {
    if strength <= 0.0 || src == dst || alpha == 0 || alpha == 255 {
        return alpha;
    }
    let ys = luma.dir(src) as f64;
    let yd = luma.dir(dst) as f64;
    if (ys - yd).abs() < CONTRAST_EPSILON * LIN_MAX as f64 {
        return alpha;
    }
    let a = alpha as f64 / 255.0;
    let target = (dst as f64 + (src as f64 - dst as f64) * a).round() as u16;
    let yt = luma.dir(target) as f64;
    let solved = ((yt - yd) / (ys - yd)).clamp(0.0, 1.0);
    let result = a + strength.min(1.0) * (solved - a);
    (result * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Lightness of the center of the bucket
fn bucket_center(bucket: usize, buckets: usize) -> u16 {
    ((bucket as f64 + 0.5) / buckets as f64 * LUMA_MAX as f64).round() as u16
}

/// Precomputed correction for quantized source and destination lightness
#[derive(Clone)]
pub struct ContrastTable {
    buckets: usize,
    strength: f64,
    data: Box<[u8]>,
}

impl ContrastTable {
    pub fn new(luma: &TransferTable, strength: f64, buckets: usize) -> Self {
        let _span = tracing::debug_span!("contrast_table", buckets).entered();
        let mut data = vec![0u8; buckets * buckets * 256].into_boxed_slice();
        for (index, row) in data.chunks_exact_mut(256).enumerate() {
            let (src, dst) = (index / buckets, index % buckets);
            let (ls, ld) = (bucket_center(src, buckets), bucket_center(dst, buckets));
            for (alpha, out) in row.iter_mut().enumerate() {
                *out = if src == dst {
                    alpha as u8
                } else {
                    correct_exact(luma, strength, ls, ld, alpha as u8)
                };
            }
        }
        tracing::debug!("[contrast] table with {} buckets, strength {}", buckets, strength);
        Self {
            buckets,
            strength,
            data,
        }
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// Bucket of the lightness in `0..=LUMA_MAX`
    #[inline]
    pub fn bucket(&self, lightness: u16) -> usize {
        (lightness.min(LUMA_MAX) as usize * self.buckets) / (LUMA_MAX as usize + 1)
    }

    /// Correction row for a pair of buckets, indexed by coverage
    #[inline]
    pub fn row(&self, src: usize, dst: usize) -> &[u8] {
        let offset = (src * self.buckets + dst) * 256;
        &self.data[offset..offset + 256]
    }

    /// Corrected coverage for source and destination lightness
    #[inline]
    pub fn correct(&self, src: u16, dst: u16, alpha: u8) -> u8 {
        self.row(self.bucket(src), self.bucket(dst))[alpha as usize]
    }
}

impl std::fmt::Debug for ContrastTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContrastTable")
            .field("buckets", &self.buckets)
            .field("strength", &self.strength)
            .finish()
    }
}
