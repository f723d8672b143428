//! Fill pipeline
//!
//! Rasterizes a path into coverage tiles and composites every non-empty tile
//! onto the destination image.
use crate::{
    blend::{Compositor, CoverageTile, Paint, PixelLayout},
    context::{RasterParams, RendererContext},
    geometry::BBox,
    path::FillRule,
    rasterize::Rasterizer,
    tile::{ALPHA_OPAQUE, ALPHA_TRANSPARENT},
    ImageMut, Path, Transform,
};

/// Summary of a single fill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillStats {
    /// Tiles visited by the generator
    pub tiles: usize,
    /// Tiles skipped because nothing was covered
    pub empty: usize,
    /// Tiles that were fully covered
    pub opaque: usize,
    /// Pixels reused from the previous blend result
    pub cache_hits: usize,
}

/// Rasterizer parameters bound to a compositor
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    compositor: Compositor,
    params: RasterParams,
}

impl Renderer {
    pub fn new(compositor: Compositor, params: RasterParams) -> Self {
        Self { compositor, params }
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn params(&self) -> RasterParams {
        self.params
    }

    /// Fill path transformed by `tr` with paint, pixels are stored in layout `L`
    pub fn fill<L, I>(
        &self,
        path: &Path,
        tr: Transform,
        rule: FillRule,
        paint: Paint<'_>,
        extra_alpha: u8,
        dst: &mut I,
    ) -> FillStats
    where
        L: PixelLayout,
        I: ImageMut<Pixel = L::Unit> + ?Sized,
    {
        let mut stats = FillStats::default();
        let bounds = BBox::from_size(dst.width(), dst.height());
        if bounds.is_empty() || extra_alpha == 0 {
            return stats;
        }
        let _span = tracing::debug_span!("fill", layout = L::NAME, ?rule).entered();

        let ctx = RendererContext::acquire_with(self.params);
        let mut rasterizer = Rasterizer::new(ctx, bounds, rule);
        path.emit_transformed(tr, &mut rasterizer);
        let Some(mut tiles) = rasterizer.end_rendering() else {
            return stats;
        };

        let mut blend = self.compositor.context(paint);
        let (width, height) = (tiles.tile_width(), tiles.tile_height());
        let mut alpha = vec![0u8; width * height];
        while !tiles.is_done() {
            stats.tiles += 1;
            match tiles.typical_alpha() {
                ALPHA_TRANSPARENT => {
                    stats.empty += 1;
                    tiles.advance();
                    continue;
                }
                ALPHA_OPAQUE => {
                    stats.opaque += 1;
                    alpha.fill(255);
                }
                _ => tiles.fill_alpha(&mut alpha, 0, width),
            }
            let tile = CoverageTile::new(tiles.tile_x(), tiles.tile_y(), width, height, &alpha);
            blend.composite_tile::<L, I>(dst, &tile, extra_alpha);
            tiles.advance();
        }
        tiles.dispose();
        stats.cache_hits = blend.cache_hits();
        tracing::debug!("[fill] {:?}", stats);
        stats
    }
}

/// Fill path with paint using process wide configuration
pub fn fill<L, I>(
    path: &Path,
    rule: FillRule,
    paint: Paint<'_>,
    extra_alpha: u8,
    dst: &mut I,
) -> FillStats
where
    L: PixelLayout,
    I: ImageMut<Pixel = L::Unit> + ?Sized,
{
    Renderer::default().fill::<L, I>(path, Transform::identity(), rule, paint, extra_alpha, dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blend::{BlendSettings, IntArgb, Rgba8, Tables},
        config::{BlendTier, Config},
        utils::tests::init_tracing,
        Image, ImageOwned, RGBA,
    };
    use std::sync::Arc;

    fn renderer(tier: BlendTier) -> Renderer {
        let settings = BlendSettings {
            tier,
            ..BlendSettings::from_config(&Config::default())
        };
        let compositor = Compositor::new(settings, Arc::new(Tables::from_config(&Config::default())));
        Renderer::new(
            compositor,
            RasterParams {
                subpixel_lg_x: 3,
                subpixel_lg_y: 3,
                tile_lg: 3,
            },
        )
    }

    fn pixel(image: &ImageOwned<u8>, row: usize, col: usize) -> RGBA {
        Rgba8::load(&image.data()[image.shape().offset(row, col)..])
    }

    #[test]
    fn test_fill_square() {
        init_tracing();
        let renderer = renderer(BlendTier::Standard);
        let mut image: ImageOwned<u8> = ImageOwned::new_packed(20, 20, Rgba8::UNITS);
        let path = Path::builder().move_to((2.0, 2.0)).rect(16.0, 16.0).build();
        let red = RGBA::new(255, 0, 0, 255);
        let stats = renderer.fill::<Rgba8, _>(
            &path,
            Transform::identity(),
            FillRule::NonZero,
            Paint::Solid(red),
            255,
            &mut image,
        );
        // bounding box 16x16 split into 8x8 tiles, all of them fully covered
        assert_eq!(stats.tiles, 4);
        assert_eq!(stats.opaque, 4);
        assert_eq!(stats.cache_hits, 0);
        assert_eq!(pixel(&image, 2, 2), red);
        assert_eq!(pixel(&image, 17, 17), red);
        assert_eq!(pixel(&image, 1, 5), RGBA::TRANSPARENT);
        assert_eq!(pixel(&image, 18, 18), RGBA::TRANSPARENT);
    }

    #[test]
    fn test_fill_transformed() {
        let renderer = renderer(BlendTier::Fast);
        let mut image: ImageOwned<u32> = ImageOwned::new_packed(16, 16, 1);
        image.fill(u32::from_le_bytes([255, 255, 255, 255]));
        let path = Path::builder().move_to((0.0, 0.0)).rect(1.0, 1.0).build();
        let tr = Transform::identity().translate(4.5, 4.0).scale(4.0, 4.0);
        let stats = renderer.fill::<IntArgb, _>(
            &path,
            tr,
            FillRule::EvenOdd,
            Paint::Solid(RGBA::BLACK),
            255,
            &mut image,
        );
        assert!(stats.tiles > 0);
        // half covered pixels on both sides share destination and coverage
        assert!(stats.cache_hits >= 7, "{:?}", stats);
        let at = |row: usize, col: usize| IntArgb::load(&image.data()[image.shape().offset(row, col)..]);
        assert_eq!(at(5, 6), RGBA::BLACK);
        assert_eq!(at(3, 6), RGBA::WHITE);
        // half covered columns on both sides
        let left = at(5, 4);
        let right = at(5, 8);
        assert_eq!(left, right);
        assert!(left != RGBA::WHITE && left != RGBA::BLACK, "{:?}", left);
    }

    #[test]
    fn test_fill_nothing() {
        let renderer = renderer(BlendTier::Exact);
        let mut image: ImageOwned<u8> = ImageOwned::new_packed(8, 8, Rgba8::UNITS);
        // outside of the destination
        let path = Path::builder().move_to((20.0, 20.0)).rect(4.0, 4.0).build();
        let stats = renderer.fill::<Rgba8, _>(
            &path,
            Transform::identity(),
            FillRule::NonZero,
            Paint::Solid(RGBA::WHITE),
            255,
            &mut image,
        );
        assert_eq!(stats, FillStats::default());
        // zero extra alpha
        let path = Path::builder().move_to((0.0, 0.0)).rect(4.0, 4.0).build();
        let stats = fill::<Rgba8, _>(&path, FillRule::NonZero, RGBA::WHITE.into(), 0, &mut image);
        assert_eq!(stats.tiles, 0);
        assert!(image.data().iter().all(|b| *b == 0));
    }
}
