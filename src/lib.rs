//! Scanline antialiasing rasterizer with gamma-correct alpha compositing.
//!
//! Main features:
//!  - Sweep-line rasterization of paths into fixed size alpha tiles
//!  - Pooled per-thread scratch memory, no allocations in steady state
//!  - Source-over blending in linear light with contrast and luminance correction
//!  - Interleaved and packed pixel layouts
//!
#![deny(warnings)]

pub mod arena;
pub mod blend;
pub mod color;
pub mod config;
pub mod context;
pub mod contrast;
pub mod coverage;
pub mod edges;
pub mod flatten;
pub mod gamma;
mod geometry;
mod image;
mod path;
pub mod rasterize;
pub mod render;
pub mod sort;
pub mod sweep;
pub mod tile;
mod utils;

pub use blend::{
    Argb8, BlendContext, BlendSettings, Bgra8, Compositor, CoverageTile, IntArgb, IntRgba, Paint,
    PixelLayout, Rgb8, Rgba8, Tables, Tier,
};
pub use color::{ColorError, RGBA};
pub use config::{config, BlendTier, Config, ConfigError, GammaMode, LumaMode};
pub use context::{RasterParams, RendererContext};
pub use geometry::{BBox, Point, Scalar, Transform, EPSILON, PI};
pub use image::{to_rgba_bytes, Image, ImageMut, ImageMutRef, ImageOwned, ImageRef, Shape};
#[cfg(feature = "png")]
pub use image::write_png;
pub use path::{is_degenerate, FillRule, Path, PathBuilder, PathCmd, PathConsumer, TransformFilter};
pub use rasterize::{Rasterizer, MAX_COORD};
pub use render::{fill, FillStats, Renderer};
pub use tile::TileGenerator;
use utils::clamp;
