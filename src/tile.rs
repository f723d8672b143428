//! Alpha tile generator
use crate::{
    context::RendererContext,
    edges::SubpixelBounds,
    geometry::BBox,
    path::FillRule,
    sweep::Sweeper,
};

/// Tile is fully transparent
pub const ALPHA_TRANSPARENT: u8 = 0x00;
/// Tile is partially covered
pub const ALPHA_PARTIAL: u8 = 0x80;
/// Tile is fully covered
pub const ALPHA_OPAQUE: u8 = 0xFF;

/// Iterates over coverage tiles of a rendered path in raster order
///
/// Tiles start at the top-left corner of the bounding box. Scanlines for a row of
/// tiles are swept when the generator enters that row, so a tile must be consumed
/// before the generator is advanced.
pub struct TileGenerator {
    ctx: Option<Box<RendererContext>>,
    sweeper: Sweeper,
    bbox: BBox,
    tile_lg: u32,
    x: i32,
    y: i32,
    tiles: usize,
}

impl TileGenerator {
    pub(crate) fn new(mut ctx: Box<RendererContext>, bounds: SubpixelBounds, rule: FillRule) -> Self {
        let params = ctx.params();
        let mask_x = (1 << params.subpixel_lg_x) - 1;
        let mask_y = (1 << params.subpixel_lg_y) - 1;
        let bbox = BBox::new(
            bounds.min_x >> params.subpixel_lg_x,
            bounds.min_y >> params.subpixel_lg_y,
            (bounds.max_x + mask_x) >> params.subpixel_lg_x,
            (bounds.max_y + mask_y) >> params.subpixel_lg_y,
        );
        let width = bbox.width() as usize;
        let RendererContext {
            line, band, cache, ..
        } = &mut *ctx;
        line.init(width, cache);
        band.init(width, cache);
        let sweeper = Sweeper::new(
            rule,
            bounds,
            bbox.x0 << params.subpixel_lg_x,
            params.subpixel_lg_y,
        );
        let mut tiles = Self {
            ctx: Some(ctx),
            sweeper,
            bbox,
            tile_lg: params.tile_lg,
            x: bbox.x0,
            y: bbox.y0,
            tiles: 0,
        };
        tiles.sweep_band();
        tiles
    }

    /// Sweep scanlines of the current row of tiles into the alpha band
    fn sweep_band(&mut self) {
        let Some(ctx) = self.ctx.as_deref_mut() else {
            return;
        };
        let _span = tracing::debug_span!("band", y = self.y).entered();
        let RendererContext {
            edges,
            active,
            line,
            band,
            cache,
            ..
        } = ctx;
        band.clear();
        let rows = (self.bbox.y1 - self.y).min(1 << self.tile_lg);
        for row in 0..rows {
            self.sweeper
                .sweep_row(self.y + row, edges, active, line, cache);
            band.store_row(row as usize, line);
        }
    }

    pub fn tile_width(&self) -> usize {
        1 << self.tile_lg
    }

    pub fn tile_height(&self) -> usize {
        1 << self.tile_lg
    }

    /// Pixel bounding box of the rendered coverage
    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    /// Column of the top-left pixel of the current tile
    pub fn tile_x(&self) -> i32 {
        self.x
    }

    /// Row of the top-left pixel of the current tile
    pub fn tile_y(&self) -> i32 {
        self.y
    }

    /// Whether all tiles were consumed
    pub fn is_done(&self) -> bool {
        self.y >= self.bbox.y1 || self.ctx.is_none()
    }

    /// Number of tiles consumed so far
    pub fn tiles(&self) -> usize {
        self.tiles
    }

    fn tile_column(&self) -> usize {
        ((self.x - self.bbox.x0) >> self.tile_lg) as usize
    }

    /// Classify coverage of the current tile
    ///
    /// Returns [`ALPHA_TRANSPARENT`] if nothing is covered, [`ALPHA_OPAQUE`] if
    /// every pixel of the tile is fully covered, [`ALPHA_PARTIAL`] otherwise.
    pub fn typical_alpha(&self) -> u8 {
        let Some(ctx) = self.ctx.as_deref() else {
            return ALPHA_TRANSPARENT;
        };
        let sum = ctx.band.tile_sum(self.tile_column());
        let area = (self.tile_width() * self.tile_height()) as u32;
        if sum == 0 {
            ALPHA_TRANSPARENT
        } else if sum == area * 255 {
            ALPHA_OPAQUE
        } else {
            ALPHA_PARTIAL
        }
    }

    /// Copy coverage of the current tile into `buffer`
    ///
    /// Row `r` of the tile is written at `offset + r * row_stride`, pixels outside of
    /// the bounding box are zero.
    pub fn fill_alpha(&self, buffer: &mut [u8], offset: usize, row_stride: usize) {
        let width = self.tile_width();
        let Some(ctx) = self.ctx.as_deref() else {
            for row in 0..self.tile_height() {
                buffer[offset + row * row_stride..][..width].fill(0);
            }
            return;
        };
        let col = self.tile_column() * width;
        for row in 0..self.tile_height() {
            let src = &ctx.band.row(row)[col..col + width];
            buffer[offset + row * row_stride..][..width].copy_from_slice(src);
        }
    }

    /// Move to the next tile in raster order
    pub fn advance(&mut self) {
        if self.is_done() {
            return;
        }
        self.tiles += 1;
        self.x += 1 << self.tile_lg;
        if self.x >= self.bbox.x1 {
            self.x = self.bbox.x0;
            self.y += 1 << self.tile_lg;
            if self.y < self.bbox.y1 {
                self.sweep_band();
            }
        }
    }

    /// Finish rendering and return the context to the pool
    pub fn dispose(mut self) {
        if let Some(ctx) = self.ctx.take() {
            ctx.release();
        }
    }
}

impl Drop for TileGenerator {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            ctx.release();
        }
    }
}

impl std::fmt::Debug for TileGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileGenerator")
            .field("bbox", &self.bbox)
            .field("tile_x", &self.x)
            .field("tile_y", &self.y)
            .field("rule", &self.sweeper.rule())
            .finish()
    }
}
