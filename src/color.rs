use std::{fmt, str::FromStr};

/// Rec.709 luminance weights of the linear red, green and blue channels
pub const LUMA_WEIGHTS: [f64; 3] = [0.2126, 0.7152, 0.0722];

/// Same weights in 16-bit fixed point, they sum up to `1 << 16`
const LUMA_WEIGHTS_FIXED: [u32; 3] = [13933, 46871, 4732];

/// Non-premultiplied sRGB color packed as u32 value (ABGR on little-endian)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RGBA(u32);

impl RGBA {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((a as u32) << 24) | ((b as u32) << 16) | ((g as u32) << 8) | (r as u32))
    }

    pub const fn alpha(self) -> u8 {
        ((self.0 >> 24) & 0xff) as u8
    }

    pub const fn blue(self) -> u8 {
        ((self.0 >> 16) & 0xff) as u8
    }

    pub const fn green(self) -> u8 {
        ((self.0 >> 8) & 0xff) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    /// Whether color is fully opaque
    pub const fn is_opaque(self) -> bool {
        self.alpha() == 255
    }

    /// Override alpha component of the color
    pub const fn with_alpha(self, alpha: u8) -> Self {
        Self((self.0 & 0x00ff_ffff) | ((alpha as u32) << 24))
    }

    pub fn to_rgba(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub fn to_rgb(self) -> [u8; 3] {
        let [r, g, b, _] = self.to_rgba();
        [r, g, b]
    }

    /// Relative luminance of the color in `[0, 1]`, alpha is ignored
    pub fn luminance(self) -> f64 {
        let [r, g, b] = self.to_rgb();
        let [wr, wg, wb] = LUMA_WEIGHTS;
        wr * srgb_to_linear(r as f64 / 255.0)
            + wg * srgb_to_linear(g as f64 / 255.0)
            + wb * srgb_to_linear(b as f64 / 255.0)
    }
}

impl From<[u8; 4]> for RGBA {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

impl fmt::Debug for RGBA {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "RGBA({})", self)
    }
}

impl fmt::Display for RGBA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_rgba();
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)?;
        if a != 255 {
            write!(f, "{:02x}", a)?;
        }
        Ok(())
    }
}

impl FromStr for RGBA {
    type Err = ColorError;

    fn from_str(color: &str) -> Result<Self, Self::Err> {
        let hex = color.strip_prefix('#').ok_or(ColorError::HexExpected)?;
        if !matches!(hex.len(), 6 | 8) {
            return Err(ColorError::HexExpected);
        }
        let digit = |byte| match byte {
            b'A'..=b'F' => Ok(byte - b'A' + 10),
            b'a'..=b'f' => Ok(byte - b'a' + 10),
            b'0'..=b'9' => Ok(byte - b'0'),
            _ => Err(ColorError::HexExpected),
        };
        let mut rgba = [255u8; 4];
        for (channel, pair) in rgba.iter_mut().zip(hex.as_bytes().chunks(2)) {
            *channel = (digit(pair[0])? << 4) | digit(pair[1])?;
        }
        Ok(rgba.into())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RGBA {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RGBA {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let color = std::borrow::Cow::<'de, str>::deserialize(deserializer)?;
        color.parse().map_err(serde::de::Error::custom)
    }
}

/// Luminance of linear 16-bit channels, result is in `0..=0xFFFF`
#[inline]
pub fn luminance_u16(r: u16, g: u16, b: u16) -> u16 {
    let [wr, wg, wb] = LUMA_WEIGHTS_FIXED;
    ((wr * r as u32 + wg * g as u32 + wb * b as u32 + 0x8000) >> 16) as u16
}

/// Convert linear RGB color component into a sRGB color component
#[inline]
pub fn linear_to_srgb(value: f64) -> f64 {
    if value <= 0.0031308 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

/// Convert sRGB color component into a linear RGB color component
#[inline]
pub fn srgb_to_linear(value: f64) -> f64 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    HexExpected,
}

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorError::HexExpected => {
                write!(f, "Color expected to be #RRGGBB(AA) in hexidemical format")
            }
        }
    }
}

impl std::error::Error for ColorError {}
