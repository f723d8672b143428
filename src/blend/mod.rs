//! Gamma-correct source-over compositing of coverage tiles
//!
//! Compositor blends a [`Paint`] through a coverage tile onto a destination
//! image stored in some [`PixelLayout`]. Blending happens in linear light using
//! immutable lookup [`Tables`], optionally adjusting coverage to compensate for
//! the perceived thinning of dark shapes over light backgrounds (contrast fix)
//! and preserving perceptual lightness of the result (lum fix).
mod exact;
mod fast;
mod kernel;
mod layout;
mod legacy;
mod standard;

pub use kernel::{decode, lerp, lightness, source_over, source_over_encoded, Source, Target};
pub use layout::{
    packed_pixels_mut, Argb8, Bgra8, IntArgb, IntRgba, PixelLayout, Rgb8, Rgba8,
};

use self::{exact::ExactBlender, fast::FastBlender, legacy::LegacyBlender, standard::StandardBlender};
use crate::{
    config::{config, BlendTier, Config, GammaMode, LumaMode},
    contrast::{ContrastTable, FAST_BUCKETS, STANDARD_BUCKETS},
    gamma::TransferTable,
    utils::mul_u8,
    Image, ImageMut, ImageRef, RGBA,
};
use std::{
    fmt,
    sync::{Arc, OnceLock},
};

/// Lookup tables shared by all compositors
///
/// Gamma and luma tables are built eagerly, contrast tables on first use.
pub struct Tables {
    gamma: TransferTable,
    luma: TransferTable,
    contrast: f64,
    standard: OnceLock<ContrastTable>,
    fast: OnceLock<ContrastTable>,
}

impl Tables {
    pub fn new(gamma: GammaMode, luma: LumaMode, contrast: f64) -> Self {
        let _span = tracing::debug_span!("tables").entered();
        Self {
            gamma: TransferTable::gamma(gamma),
            luma: TransferTable::luma(luma),
            contrast: contrast.clamp(0.0, 1.0),
            standard: OnceLock::new(),
            fast: OnceLock::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gamma, config.luma, config.contrast)
    }

    /// Process wide tables built from [`config()`]
    pub fn global() -> Arc<Self> {
        static TABLES: OnceLock<Arc<Tables>> = OnceLock::new();
        TABLES
            .get_or_init(|| Arc::new(Tables::from_config(config())))
            .clone()
    }

    pub fn gamma(&self) -> &TransferTable {
        &self.gamma
    }

    pub fn luma(&self) -> &TransferTable {
        &self.luma
    }

    /// Strength of contrast correction
    pub fn contrast(&self) -> f64 {
        self.contrast
    }

    pub fn standard(&self) -> &ContrastTable {
        self.standard
            .get_or_init(|| ContrastTable::new(&self.luma, self.contrast, STANDARD_BUCKETS))
    }

    pub fn fast(&self) -> &ContrastTable {
        self.fast
            .get_or_init(|| ContrastTable::new(&self.luma, self.contrast, FAST_BUCKETS))
    }
}

impl fmt::Debug for Tables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tables")
            .field("gamma", &self.gamma)
            .field("luma", &self.luma)
            .field("contrast", &self.contrast)
            .finish()
    }
}

/// Blending implementation actually used for a paint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Exact,
    Standard,
    Fast,
    Legacy,
}

/// Layout agnostic compositor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendSettings {
    pub tier: BlendTier,
    pub gamma_correct: bool,
    pub contrast_fix: bool,
    pub lum_fix: bool,
    pub legacy_blend: bool,
}

impl Default for BlendSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl BlendSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tier: config.blend_tier,
            gamma_correct: config.gamma_correct,
            contrast_fix: config.contrast_fix,
            lum_fix: config.lum_fix,
            legacy_blend: config.legacy_blend,
        }
    }

    /// Tier used to blend paint, `solid` is whether paint is a constant color
    pub fn tier_for(&self, solid: bool) -> Tier {
        if self.legacy_blend || !self.gamma_correct {
            return Tier::Legacy;
        }
        match self.tier {
            BlendTier::Exact => Tier::Exact,
            BlendTier::Standard => Tier::Standard,
            BlendTier::Fast if solid => Tier::Fast,
            BlendTier::Fast => Tier::Standard,
        }
    }
}

/// What is being painted
#[derive(Clone)]
pub enum Paint<'a> {
    /// Constant color
    Solid(RGBA),
    /// Per-pixel colors, aligned with the destination image
    Image(ImageRef<'a, RGBA>),
}

impl Paint<'_> {
    pub fn is_solid(&self) -> bool {
        matches!(self, Paint::Solid(_))
    }
}

impl fmt::Debug for Paint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Paint::Solid(color) => f.debug_tuple("Solid").field(color).finish(),
            Paint::Image(image) => f.debug_tuple("Image").field(&image.shape()).finish(),
        }
    }
}

impl From<RGBA> for Paint<'_> {
    fn from(color: RGBA) -> Self {
        Paint::Solid(color)
    }
}

/// Coverage of a tile positioned in destination pixel coordinates
#[derive(Debug, Clone, Copy)]
pub struct CoverageTile<'a> {
    pub x: i32,
    pub y: i32,
    pub width: usize,
    pub height: usize,
    /// Row `r` of coverage starts at `r * stride`
    pub alpha: &'a [u8],
    pub stride: usize,
}

impl<'a> CoverageTile<'a> {
    pub fn new(x: i32, y: i32, width: usize, height: usize, alpha: &'a [u8]) -> Self {
        Self {
            x,
            y,
            width,
            height,
            alpha,
            stride: width,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Compositor {
    settings: BlendSettings,
    tables: Arc<Tables>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::from_config()
    }
}

impl Compositor {
    pub fn new(settings: BlendSettings, tables: Arc<Tables>) -> Self {
        Self { settings, tables }
    }

    /// Compositor configured from process wide configuration
    pub fn from_config() -> Self {
        Self::new(BlendSettings::from_config(config()), Tables::global())
    }

    pub fn settings(&self) -> &BlendSettings {
        &self.settings
    }

    pub fn tables(&self) -> &Arc<Tables> {
        &self.tables
    }

    /// Blending context for the paint, reuse it across tiles of the same fill
    pub fn context<'a>(&'a self, paint: Paint<'a>) -> BlendContext<'a> {
        let tables = &*self.tables;
        let tier = self.settings.tier_for(paint.is_solid());
        let contrast_on = self.settings.contrast_fix && tables.contrast() > 0.0;
        let solid = match &paint {
            Paint::Solid(color) => Some(Source::new(tables, *color)),
            Paint::Image(_) => None,
        };
        let lum_fix = self.settings.lum_fix;
        let blender = match tier {
            Tier::Exact => {
                let strength = if contrast_on { tables.contrast() } else { 0.0 };
                Blender::Exact(ExactBlender::new(tables, strength, lum_fix))
            }
            Tier::Standard => Blender::Standard(StandardBlender::new(
                tables,
                contrast_on.then(|| tables.standard()),
                lum_fix,
            )),
            Tier::Fast => match solid.as_ref() {
                Some(src) => Blender::Fast(FastBlender::new(
                    tables,
                    src,
                    contrast_on.then(|| tables.fast()),
                    lum_fix,
                )),
                None => Blender::Standard(StandardBlender::new(
                    tables,
                    contrast_on.then(|| tables.standard()),
                    lum_fix,
                )),
            },
            Tier::Legacy => Blender::Legacy(LegacyBlender),
        };
        tracing::trace!("[blend] context {:?} {:?}", tier, paint);
        BlendContext {
            tables,
            paint,
            solid,
            tier,
            blender,
        }
    }

    /// Composite a single tile, see [`BlendContext::composite_tile`]
    pub fn composite_tile<L, I>(
        &self,
        paint: Paint<'_>,
        dst: &mut I,
        tile: &CoverageTile<'_>,
        extra_alpha: u8,
    ) where
        L: PixelLayout,
        I: ImageMut<Pixel = L::Unit> + ?Sized,
    {
        self.context(paint).composite_tile::<L, I>(dst, tile, extra_alpha)
    }
}

#[derive(Debug)]
enum Blender<'a> {
    Exact(ExactBlender<'a>),
    Standard(StandardBlender<'a>),
    Fast(FastBlender<'a>),
    Legacy(LegacyBlender),
}

impl Blender<'_> {
    #[inline]
    fn blend(&mut self, src: &Source, dst: RGBA, coverage: u8) -> RGBA {
        match self {
            Blender::Exact(blender) => blender.blend(src, dst, coverage),
            Blender::Standard(blender) => blender.blend(src, dst, coverage),
            Blender::Fast(blender) => blender.blend(src, dst, coverage),
            Blender::Legacy(blender) => blender.blend(src.color, dst, coverage),
        }
    }
}

/// Paint bound to a blending tier
#[derive(Debug)]
pub struct BlendContext<'a> {
    tables: &'a Tables,
    paint: Paint<'a>,
    solid: Option<Source>,
    tier: Tier,
    blender: Blender<'a>,
}

impl BlendContext<'_> {
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Pixels resolved from the cached result of the previous pixel, fast tier only
    pub fn cache_hits(&self) -> usize {
        match &self.blender {
            Blender::Fast(blender) => blender.hits(),
            _ => 0,
        }
    }

    /// Source pixel at destination position, `None` if paint does not cover it
    #[inline]
    fn source(&self, row: usize, col: usize) -> Option<Source> {
        match (&self.solid, &self.paint) {
            (Some(src), _) => Some(*src),
            (None, Paint::Image(image)) => {
                let color = *image.get(row, col)?;
                Some(Source::new(self.tables, color))
            }
            (None, Paint::Solid(color)) => Some(Source::new(self.tables, *color)),
        }
    }

    /// Blend paint through tile coverage onto destination
    ///
    /// Coverage is multiplied by `extra_alpha`. Pixels with zero coverage are
    /// never touched, opaque paint with full coverage is copied as is. Parts of the
    /// tile outside of the destination are ignored.
    pub fn composite_tile<L, I>(&mut self, dst: &mut I, tile: &CoverageTile<'_>, extra_alpha: u8)
    where
        L: PixelLayout,
        I: ImageMut<Pixel = L::Unit> + ?Sized,
    {
        if extra_alpha == 0 {
            return;
        }
        let shape = dst.shape();
        let data = dst.data_mut();
        for row in 0..tile.height {
            let y = tile.y + row as i32;
            if y < 0 || y as usize >= shape.height {
                continue;
            }
            let y = y as usize;
            let coverage = &tile.alpha[row * tile.stride..][..tile.width];
            for (col, alpha) in coverage.iter().enumerate() {
                if *alpha == 0 {
                    continue;
                }
                let x = tile.x + col as i32;
                if x < 0 || x as usize >= shape.width {
                    continue;
                }
                let x = x as usize;
                let coverage = mul_u8(*alpha as u32, extra_alpha as u32) as u8;
                if coverage == 0 {
                    continue;
                }
                let Some(src) = self.source(y, x) else {
                    continue;
                };
                let offset = shape.offset(y, x);
                let pixel = &mut data[offset..offset + L::UNITS];
                if coverage == 255 && src.color.is_opaque() {
                    L::store(pixel, src.color);
                    continue;
                }
                let color = self.blender.blend(&src, L::load(pixel), coverage);
                L::store(pixel, color);
            }
        }
    }
}
