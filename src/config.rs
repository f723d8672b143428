//! Process wide configuration
//!
//! Configuration is read once, the first time anything asks for it. Invalid
//! values never abort rendering, they are replaced with defaults and reported
//! with a warning.
use std::{env, fmt, str::FromStr, sync::OnceLock};

/// Prefix of all environment variables recognized by [`Config::from_env`]
pub const ENV_PREFIX: &str = "SCANBLEND_";

/// Transfer function between encoded channel values and linear light
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GammaMode {
    /// Exact piecewise sRGB curve
    Srgb,
    /// Plain power law `linear = encoded ^ gamma`
    Power(f64),
}

impl Default for GammaMode {
    fn default() -> Self {
        Self::Srgb
    }
}

/// Transfer function between linear luminance and perceptual lightness
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LumaMode {
    /// CIE L* curve (cube root with a linear segment near black)
    CieLightness,
    /// Plain power law `luminance = lightness ^ gamma`
    Power(f64),
}

impl Default for LumaMode {
    fn default() -> Self {
        Self::CieLightness
    }
}

/// Blending implementation used by the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BlendTier {
    /// Per-pixel exact correction, reference implementation
    Exact,
    /// Table driven correction with quantized luminance buckets
    #[default]
    Standard,
    /// Constant color blending with run caching
    Fast,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Channel transfer function used by gamma tables
    pub gamma: GammaMode,
    /// Luminance to lightness transfer function
    pub luma: LumaMode,
    /// Strength of the contrast correction in `[0, 1]`
    pub contrast: f64,
    /// log2 of subpixel positions along x axis
    pub subpixel_lg_x: u32,
    /// log2 of subpixel positions along y axis
    pub subpixel_lg_y: u32,
    /// log2 of tile size
    pub tile_lg: u32,
    /// Blend in linear light instead of encoded space
    pub gamma_correct: bool,
    /// Enable contrast correction of coverage
    pub contrast_fix: bool,
    /// Enable luminance preservation of blended pixels
    pub lum_fix: bool,
    /// Use legacy blending without lookup tables
    pub legacy_blend: bool,
    /// Blending implementation tier
    pub blend_tier: BlendTier,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gamma: GammaMode::Srgb,
            luma: LumaMode::CieLightness,
            contrast: 0.5,
            subpixel_lg_x: 3,
            subpixel_lg_y: 3,
            tile_lg: 5,
            gamma_correct: true,
            contrast_fix: true,
            lum_fix: false,
            legacy_blend: false,
            blend_tier: BlendTier::Standard,
        }
    }
}

pub const MIN_GAMMA: f64 = 0.1;
/// Steeper curves collapse dark 8-bit codes to the same 16-bit linear value
pub const MAX_GAMMA: f64 = 2.4;
pub const MAX_LUMA_GAMMA: f64 = 5.0;
pub const MAX_SUBPIXEL_LG: u32 = 8;
pub const MIN_TILE_LG: u32 = 3;
pub const MAX_TILE_LG: u32 = 8;

impl Config {
    /// Replace invalid values with defaults, returns corrected config and list of errors
    pub fn validated(self) -> (Self, Vec<ConfigError>) {
        let default = Self::default();
        let mut errors = Vec::new();
        let mut config = self;

        if let GammaMode::Power(gamma) = config.gamma {
            if !(MIN_GAMMA..=MAX_GAMMA).contains(&gamma) {
                errors.push(ConfigError::out_of_range("gamma", gamma, "0.1..=2.4"));
                config.gamma = default.gamma;
            }
        }
        if let LumaMode::Power(gamma) = config.luma {
            if !(MIN_GAMMA..=MAX_LUMA_GAMMA).contains(&gamma) {
                errors.push(ConfigError::out_of_range("luma", gamma, "0.1..=5.0"));
                config.luma = default.luma;
            }
        }
        if !(0.0..=1.0).contains(&config.contrast) {
            errors.push(ConfigError::out_of_range("contrast", config.contrast, "0..=1"));
            config.contrast = default.contrast;
        }
        if config.subpixel_lg_x > MAX_SUBPIXEL_LG {
            errors.push(ConfigError::out_of_range(
                "subpixel_lg_x",
                config.subpixel_lg_x,
                "0..=8",
            ));
            config.subpixel_lg_x = default.subpixel_lg_x;
        }
        if config.subpixel_lg_y > MAX_SUBPIXEL_LG {
            errors.push(ConfigError::out_of_range(
                "subpixel_lg_y",
                config.subpixel_lg_y,
                "0..=8",
            ));
            config.subpixel_lg_y = default.subpixel_lg_y;
        }
        if !(MIN_TILE_LG..=MAX_TILE_LG).contains(&config.tile_lg) {
            errors.push(ConfigError::out_of_range("tile_lg", config.tile_lg, "3..=8"));
            config.tile_lg = default.tile_lg;
        }

        for error in errors.iter() {
            tracing::warn!("[config] {}, using default", error);
        }
        (config, errors)
    }

    /// Read configuration from `SCANBLEND_*` environment variables
    ///
    /// Unparsable values are reported and replaced with defaults.
    pub fn from_env() -> (Self, Vec<ConfigError>) {
        Self::from_lookup(|key| env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Build configuration from a key lookup function (keys without prefix)
    pub fn from_lookup<F>(lookup: F) -> (Self, Vec<ConfigError>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut errors = Vec::new();

        fn parse_into<T: FromStr>(
            lookup: &dyn Fn(&str) -> Option<String>,
            key: &'static str,
            target: &mut T,
            errors: &mut Vec<ConfigError>,
        ) {
            if let Some(value) = lookup(&key.to_ascii_uppercase()) {
                match value.trim().parse() {
                    Ok(parsed) => *target = parsed,
                    Err(_) => errors.push(ConfigError::InvalidValue { key, value }),
                }
            }
        }

        parse_into(&lookup, "gamma", &mut config.gamma, &mut errors);
        parse_into(&lookup, "luma", &mut config.luma, &mut errors);
        parse_into(&lookup, "contrast", &mut config.contrast, &mut errors);
        parse_into(&lookup, "subpixel_lg_x", &mut config.subpixel_lg_x, &mut errors);
        parse_into(&lookup, "subpixel_lg_y", &mut config.subpixel_lg_y, &mut errors);
        parse_into(&lookup, "tile_lg", &mut config.tile_lg, &mut errors);
        parse_into(&lookup, "gamma_correct", &mut config.gamma_correct, &mut errors);
        parse_into(&lookup, "contrast_fix", &mut config.contrast_fix, &mut errors);
        parse_into(&lookup, "lum_fix", &mut config.lum_fix, &mut errors);
        parse_into(&lookup, "legacy_blend", &mut config.legacy_blend, &mut errors);
        parse_into(&lookup, "blend_tier", &mut config.blend_tier, &mut errors);

        for error in errors.iter() {
            tracing::warn!("[config] {}, using default", error);
        }
        let (config, more) = config.validated();
        errors.extend(more);
        (config, errors)
    }

    /// Parse configuration from JSON, missing fields are filled with defaults
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<(Self, Vec<ConfigError>), ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Number of subpixel samples along x axis
    pub fn subpixel_positions_x(&self) -> u32 {
        1 << self.subpixel_lg_x
    }

    /// Number of subpixel samples along y axis
    pub fn subpixel_positions_y(&self) -> u32 {
        1 << self.subpixel_lg_y
    }

    /// Size of the square tile in pixels
    pub fn tile_size(&self) -> usize {
        1 << self.tile_lg
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Install process wide configuration
///
/// Must be called before the first render, otherwise configuration is already
/// fixed and provided one is returned back as an error.
pub fn install(config: Config) -> Result<(), Config> {
    let (config, _) = config.validated();
    CONFIG.set(config)
}

/// Process wide configuration, initialized from environment on first access
pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        let (config, _) = Config::from_env();
        tracing::debug!(?config, "[config] loaded");
        config
    })
}

impl FromStr for GammaMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("srgb") {
            return Ok(Self::Srgb);
        }
        value
            .parse()
            .map(Self::Power)
            .map_err(|_| ConfigError::invalid("gamma", value))
    }
}

impl FromStr for LumaMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("cie") || value.eq_ignore_ascii_case("cie_lightness") {
            return Ok(Self::CieLightness);
        }
        value
            .parse()
            .map(Self::Power)
            .map_err(|_| ConfigError::invalid("luma", value))
    }
}

impl FromStr for BlendTier {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "standard" => Ok(Self::Standard),
            "fast" => Ok(Self::Fast),
            _ => Err(ConfigError::invalid("blend_tier", value)),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    /// Value can not be parsed
    InvalidValue { key: &'static str, value: String },
    /// Value is parsed but outside of accepted range
    OutOfRange {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[cfg(feature = "serde")]
    Json(serde_json::Error),
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str) -> Self {
        Self::InvalidValue {
            key,
            value: value.to_string(),
        }
    }

    fn out_of_range(key: &'static str, value: impl fmt::Display, expected: &'static str) -> Self {
        Self::OutOfRange {
            key,
            value: value.to_string(),
            expected,
        }
    }

    /// Configuration key this error refers to
    pub fn key(&self) -> &'static str {
        match self {
            Self::InvalidValue { key, .. } => key,
            Self::OutOfRange { key, .. } => key,
            #[cfg(feature = "serde")]
            Self::Json(_) => "json",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value for {}: {:?}", key, value)
            }
            Self::OutOfRange {
                key,
                value,
                expected,
            } => write!(f, "{} = {} is out of range {}", key, value, expected),
            #[cfg(feature = "serde")]
            Self::Json(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error)
    }
}
