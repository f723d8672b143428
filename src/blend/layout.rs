//! Destination pixel layouts
//!
//! A layout knows how a non-premultiplied sRGB pixel is stored in a buffer of
//! its units: interleaved bytes in some channel order, or a packed `u32`.
use crate::{image::Shape, RGBA};
use bytemuck::Pod;

pub trait PixelLayout {
    /// Element of the underlying buffer
    type Unit: Pod + Default;

    /// Number of units a single pixel occupies
    const UNITS: usize;

    /// Whether layout stores alpha, pixels without alpha are always opaque
    const HAS_ALPHA: bool = true;

    /// Human readable name
    const NAME: &'static str;

    /// Read pixel from its units
    fn load(pixel: &[Self::Unit]) -> RGBA;

    /// Write pixel into its units
    fn store(pixel: &mut [Self::Unit], color: RGBA);

    /// Densely packed shape of the image with this layout
    fn shape(width: usize, height: usize) -> Shape {
        Shape::packed(width, height, Self::UNITS)
    }
}

/// Defines interleaved 8-bit layout with provided positions of channels
macro_rules! interleaved_layout {
    ($(#[$meta:meta])* $name:ident, $units:expr, [$r:expr, $g:expr, $b:expr], $a:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl PixelLayout for $name {
            type Unit = u8;
            const UNITS: usize = $units;
            const HAS_ALPHA: bool = Option::<usize>::is_some(&$a);
            const NAME: &'static str = stringify!($name);

            #[inline]
            fn load(pixel: &[u8]) -> RGBA {
                let alpha: Option<usize> = $a;
                RGBA::new(
                    pixel[$r],
                    pixel[$g],
                    pixel[$b],
                    alpha.map_or(255, |index| pixel[index]),
                )
            }

            #[inline]
            fn store(pixel: &mut [u8], color: RGBA) {
                let [r, g, b, a] = color.to_rgba();
                pixel[$r] = r;
                pixel[$g] = g;
                pixel[$b] = b;
                let alpha: Option<usize> = $a;
                if let Some(index) = alpha {
                    pixel[index] = a;
                }
            }
        }
    };
}

interleaved_layout!(
    /// Bytes in `R, G, B, A` order
    Rgba8, 4, [0, 1, 2], Some(3)
);
interleaved_layout!(
    /// Bytes in `B, G, R, A` order
    Bgra8, 4, [2, 1, 0], Some(3)
);
interleaved_layout!(
    /// Bytes in `A, R, G, B` order
    Argb8, 4, [1, 2, 3], Some(0)
);
interleaved_layout!(
    /// Opaque bytes in `R, G, B` order
    Rgb8, 3, [0, 1, 2], None
);

/// Packed `0xAARRGGBB` value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntArgb;

impl PixelLayout for IntArgb {
    type Unit = u32;
    const UNITS: usize = 1;
    const NAME: &'static str = "IntArgb";

    #[inline]
    fn load(pixel: &[u32]) -> RGBA {
        let [b, g, r, a] = pixel[0].to_le_bytes();
        RGBA::new(r, g, b, a)
    }

    #[inline]
    fn store(pixel: &mut [u32], color: RGBA) {
        let [r, g, b, a] = color.to_rgba();
        pixel[0] = u32::from_le_bytes([b, g, r, a]);
    }
}

/// Packed `0xRRGGBBAA` value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntRgba;

impl PixelLayout for IntRgba {
    type Unit = u32;
    const UNITS: usize = 1;
    const NAME: &'static str = "IntRgba";

    #[inline]
    fn load(pixel: &[u32]) -> RGBA {
        let [a, b, g, r] = pixel[0].to_le_bytes();
        RGBA::new(r, g, b, a)
    }

    #[inline]
    fn store(pixel: &mut [u32], color: RGBA) {
        let [r, g, b, a] = color.to_rgba();
        pixel[0] = u32::from_le_bytes([a, b, g, r]);
    }
}

/// View byte buffer as packed pixels, `None` if it is misaligned or of odd size
pub fn packed_pixels_mut(bytes: &mut [u8]) -> Option<&mut [u32]> {
    bytemuck::try_cast_slice_mut(bytes).ok()
}
