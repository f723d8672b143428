//! Gamma and luma transfer tables
//!
//! A [`TransferTable`] maps an encoded integer domain to 16-bit linear light and
//! back. The gamma table converts 8-bit channels, the luma table converts
//! perceptual lightness in `0..=LUMA_MAX` to luminance.
use crate::{
    color::{linear_to_srgb, srgb_to_linear},
    config::{GammaMode, LumaMode},
};
use std::fmt;

/// Largest linear value
pub const LIN_MAX: u16 = 0xFFFF;
/// Largest 8-bit channel value
pub const CHANNEL_MAX: u16 = 0xFF;
/// Largest lightness value of the luma table
pub const LUMA_MAX: u16 = 0xFFF;

/// `L*` below this value is on the linear segment of the CIE lightness curve
const CIE_KAPPA_EPSILON: f64 = 8.0;
/// `(29/3)^3`, slope of the linear segment
const CIE_KAPPA: f64 = 24389.0 / 27.0;

/// Transfer function between encoded values and linear light, both in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transfer {
    /// sRGB transfer curve
    Srgb,
    /// `linear = encoded ^ gamma`
    Power(f64),
    /// CIE `L*` lightness scaled to `[0, 1]`
    CieLightness,
}

impl Transfer {
    /// Encoded value to linear light
    pub fn decode(&self, value: f64) -> f64 {
        let value = value.clamp(0.0, 1.0);
        match *self {
            Transfer::Srgb => srgb_to_linear(value),
            Transfer::Power(gamma) => value.powf(gamma),
            Transfer::CieLightness => {
                let lightness = value * 100.0;
                if lightness > CIE_KAPPA_EPSILON {
                    ((lightness + 16.0) / 116.0).powi(3)
                } else {
                    lightness / CIE_KAPPA
                }
            }
        }
    }

    /// Linear light to encoded value
    pub fn encode(&self, value: f64) -> f64 {
        let value = value.clamp(0.0, 1.0);
        match *self {
            Transfer::Srgb => linear_to_srgb(value),
            Transfer::Power(gamma) => value.powf(1.0 / gamma),
            Transfer::CieLightness => {
                let lightness = if value > CIE_KAPPA_EPSILON / CIE_KAPPA {
                    116.0 * value.cbrt() - 16.0
                } else {
                    value * CIE_KAPPA
                };
                lightness / 100.0
            }
        }
    }
}

impl From<GammaMode> for Transfer {
    fn from(mode: GammaMode) -> Self {
        match mode {
            GammaMode::Srgb => Transfer::Srgb,
            GammaMode::Power(gamma) => Transfer::Power(gamma),
        }
    }
}

impl From<LumaMode> for Transfer {
    fn from(mode: LumaMode) -> Self {
        match mode {
            LumaMode::CieLightness => Transfer::CieLightness,
            LumaMode::Power(gamma) => Transfer::Power(gamma),
        }
    }
}

/// Pair of lookup tables between encoded domain `0..=max` and linear `0..=LIN_MAX`
///
/// Both directions are monotonic nondecreasing and rounded to nearest.
#[derive(Clone)]
pub struct TransferTable {
    transfer: Transfer,
    max: u16,
    dir: Box<[u16]>,
    inv: Box<[u16]>,
}

impl TransferTable {
    pub fn new(transfer: Transfer, max: u16) -> Self {
        let scale = max as f64;
        let lin = LIN_MAX as f64;
        let dir = (0..=max)
            .map(|value| (transfer.decode(value as f64 / scale) * lin).round() as u16)
            .collect();
        let inv = (0..=LIN_MAX)
            .map(|value| (transfer.encode(value as f64 / lin) * scale).round().min(scale) as u16)
            .collect();
        tracing::debug!("[gamma] table {:?} max: {}", transfer, max);
        Self {
            transfer,
            max,
            dir,
            inv,
        }
    }

    /// Table for 8-bit color channels
    pub fn gamma(mode: GammaMode) -> Self {
        Self::new(mode.into(), CHANNEL_MAX)
    }

    /// Table for lightness in `0..=LUMA_MAX`
    pub fn luma(mode: LumaMode) -> Self {
        Self::new(mode.into(), LUMA_MAX)
    }

    pub fn transfer(&self) -> Transfer {
        self.transfer
    }

    /// Largest encoded value
    pub fn max(&self) -> u16 {
        self.max
    }

    /// Encoded value to linear, input is masked to the table domain
    #[inline]
    pub fn dir(&self, value: u16) -> u16 {
        self.dir[(value.min(self.max)) as usize]
    }

    /// Linear value to encoded
    #[inline]
    pub fn inv(&self, value: u16) -> u16 {
        self.inv[value as usize]
    }

    /// Encode linear value into 8-bit channel, only meaningful for gamma tables
    #[inline]
    pub fn encode_u8(&self, value: u16) -> u8 {
        self.inv[value as usize] as u8
    }

    pub fn dir_table(&self) -> &[u16] {
        &self.dir
    }

    pub fn inv_table(&self) -> &[u16] {
        &self.inv
    }
}

impl fmt::Debug for TransferTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferTable")
            .field("transfer", &self.transfer)
            .field("max", &self.max)
            .finish()
    }
}
