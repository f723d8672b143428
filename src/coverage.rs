//! Coverage accumulation
//!
//! Inside spans of all scanlines of a pixel row are accumulated in a difference
//! array of subpixel counts. Prefix sum of the array is the number of covered
//! subpixels of each pixel, which is mapped to 8-bit alpha and stored in the
//! alpha band, a strip of pixel rows one tile high.
use crate::arena::{AlignedBuf, BlockCache};

/// Initial width of coverage line in pixels
pub const INITIAL_WIDTH: usize = 2048;

/// Difference array of subpixel coverage for a single pixel row
pub struct CoverageLine {
    deltas: AlignedBuf<i32>,
    width: usize,
    /// Touched range of `deltas` (inclusive), empty if `min > max`
    min: usize,
    max: usize,
    subpixel_lg_x: u32,
    max_coverage: i32,
    /// Maps number of covered subpixels to alpha
    alpha_map: Vec<u8>,
}

impl CoverageLine {
    pub fn new(subpixel_lg_x: u32, subpixel_lg_y: u32, cache: &mut BlockCache) -> Self {
        let max_coverage = 1i32 << (subpixel_lg_x + subpixel_lg_y);
        Self {
            deltas: AlignedBuf::new("coverage", INITIAL_WIDTH + 2, cache),
            width: 0,
            min: usize::MAX,
            max: 0,
            subpixel_lg_x,
            max_coverage,
            alpha_map: alpha_map(max_coverage as u32),
        }
    }

    /// Prepare for rows of `width` pixels
    pub fn init(&mut self, width: usize, cache: &mut BlockCache) {
        // spans may touch two cells past the last pixel
        self.deltas.ensure(width + 2, cache);
        self.width = width;
        self.min = usize::MAX;
        self.max = 0;
    }

    pub fn reset(&mut self, cache: &mut BlockCache) {
        self.deltas.reset(INITIAL_WIDTH + 2, cache);
        self.deltas.clear();
        self.width = 0;
        self.min = usize::MAX;
        self.max = 0;
    }

    /// Width of the row in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of subpixels in a single pixel
    pub fn max_coverage(&self) -> i32 {
        self.max_coverage
    }

    /// Whether nothing was accumulated since the last emit
    pub fn is_clear(&self) -> bool {
        self.min > self.max
    }

    /// Add span `[x0, x1)` in subpixel columns relative to the first pixel
    pub fn add_span(&mut self, x0: i32, x1: i32) {
        debug_assert!(0 <= x0 && x0 < x1);
        let lg = self.subpixel_lg_x;
        let positions = 1i32 << lg;
        let mask = positions - 1;
        let deltas = self.deltas.as_mut_slice();
        let pixel_x0 = (x0 >> lg) as usize;
        let pixel_x1 = ((x1 - 1) >> lg) as usize;
        let last = if pixel_x0 == pixel_x1 {
            let count = x1 - x0;
            deltas[pixel_x0] += count;
            deltas[pixel_x0 + 1] -= count;
            pixel_x0 + 1
        } else {
            let frac = x0 & mask;
            deltas[pixel_x0] += positions - frac;
            deltas[pixel_x0 + 1] += frac;
            let pixel_end = (x1 >> lg) as usize;
            let frac = x1 & mask;
            deltas[pixel_end] -= positions - frac;
            deltas[pixel_end + 1] -= frac;
            pixel_end + 1
        };
        self.min = self.min.min(pixel_x0);
        self.max = self.max.max(last);
    }

    /// Emit accumulated row as alpha into `out` and clear the line
    ///
    /// `on_pixel` is called with index and alpha of every non transparent pixel.
    pub fn emit(&mut self, out: &mut [u8], mut on_pixel: impl FnMut(usize, u8)) {
        if self.is_clear() {
            return;
        }
        let deltas = self.deltas.as_mut_slice();
        let end = self.max.min(self.width).min(out.len());
        let mut sum = 0;
        for x in self.min..end {
            sum += deltas[x];
            let alpha = self.alpha_map[sum.clamp(0, self.max_coverage) as usize];
            out[x] = alpha;
            if alpha != 0 {
                on_pixel(x, alpha);
            }
        }
        deltas[self.min..=self.max].fill(0);
        self.min = usize::MAX;
        self.max = 0;
    }
}

/// Table mapping number of covered subpixels `0..=max_coverage` to alpha
pub fn alpha_map(max_coverage: u32) -> Vec<u8> {
    (0..=max_coverage)
        .map(|count| ((count * 255 + max_coverage / 2) / max_coverage) as u8)
        .collect()
}

/// Pixel rows of alpha for a single row of tiles
pub struct AlphaBand {
    data: AlignedBuf<u8>,
    /// Row stride, multiple of tile size
    stride: usize,
    rows: usize,
    tile_lg: u32,
    /// Sum of alpha for each tile of the band
    tile_sums: Vec<u32>,
}

impl AlphaBand {
    pub fn new(tile_lg: u32, cache: &mut BlockCache) -> Self {
        Self {
            data: AlignedBuf::new("alpha_band", INITIAL_WIDTH << tile_lg, cache),
            stride: 0,
            rows: 0,
            tile_lg,
            tile_sums: Vec::new(),
        }
    }

    pub fn tile_size(&self) -> usize {
        1 << self.tile_lg
    }

    /// Prepare zeroed band for rows of `width` pixels
    pub fn init(&mut self, width: usize, cache: &mut BlockCache) {
        let tile = self.tile_size();
        let tiles = width.div_ceil(tile);
        self.stride = tiles * tile;
        self.rows = tile;
        self.data.ensure(self.stride * self.rows, cache);
        self.tile_sums.clear();
        self.tile_sums.resize(tiles, 0);
        self.clear();
    }

    /// Zero content of the band
    pub fn clear(&mut self) {
        let len = self.stride * self.rows;
        self.data.as_mut_slice()[..len].fill(0);
        self.tile_sums.fill(0);
    }

    pub fn reset(&mut self, cache: &mut BlockCache) {
        self.data.reset(INITIAL_WIDTH << self.tile_lg, cache);
        self.stride = 0;
        self.rows = 0;
        self.tile_sums.clear();
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Emit coverage line into band row `row`, updating tile sums
    pub fn store_row(&mut self, row: usize, line: &mut CoverageLine) {
        debug_assert!(row < self.rows);
        let stride = self.stride;
        let tile_lg = self.tile_lg;
        let tile_sums = &mut self.tile_sums;
        let out = &mut self.data.as_mut_slice()[row * stride..(row + 1) * stride];
        line.emit(out, |x, alpha| tile_sums[x >> tile_lg] += alpha as u32);
    }

    /// Alpha row `row` of the band
    pub fn row(&self, row: usize) -> &[u8] {
        &self.data.as_slice()[row * self.stride..(row + 1) * self.stride]
    }

    /// Sum of alpha of all pixels of the tile in column `tile`
    pub fn tile_sum(&self, tile: usize) -> u32 {
        self.tile_sums.get(tile).copied().unwrap_or(0)
    }
}
