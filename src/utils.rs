//! Utility functions and types used accross the library
use crate::Scalar;

/// Restrict value to a certain interval
#[inline]
pub fn clamp<T>(val: T, min: T, max: T) -> T
where
    T: PartialOrd,
{
    if val < min {
        min
    } else if val > max {
        max
    } else {
        val
    }
}

/// `ceil` converted to integer, saturating at `i32` range (NaN maps to zero)
#[inline]
pub fn ceil_i32(value: Scalar) -> i32 {
    value.ceil() as i32
}

/// Integer division rounding to the nearest value
#[inline]
pub fn div_round(num: u32, den: u32) -> u32 {
    (num + den / 2) / den
}

/// Multiply two values in `0..=255` range and normalize result back to `0..=255`
#[inline]
pub fn mul_u8(a: u32, b: u32) -> u32 {
    // exact `round(a * b / 255)` for all `a, b <= 255`
    let t = a * b + 0x80;
    (t + (t >> 8)) >> 8
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[macro_export]
    macro_rules! assert_approx_eq {
        ( $v0:expr, $v1: expr ) => {{
            assert!(($v0 - $v1).abs() < $crate::EPSILON, "{} != {}", $v0, $v1);
        }};
        ( $v0:expr, $v1: expr, $e: expr ) => {{
            assert!(($v0 - $v1).abs() < $e, "{} != {}", $v0, $v1);
        }};
    }

    /// Install tracing subscriber controlled by `RUST_LOG`, safe to call many times
    pub(crate) fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_mul_u8() {
        for a in 0..=255u32 {
            for b in 0..=255u32 {
                let expected = ((a * b) as f64 / 255.0).round() as u32;
                assert_eq!(mul_u8(a, b), expected, "{} * {}", a, b);
            }
        }
    }

    #[test]
    fn test_helpers() {
        assert_eq!(clamp(5, 0, 3), 3);
        assert_eq!(clamp(-5, 0, 3), 0);
        assert_eq!(ceil_i32(1.2), 2);
        assert_eq!(ceil_i32(-1.2), -1);
        assert_eq!(div_round(7, 2), 4);
    }
}
