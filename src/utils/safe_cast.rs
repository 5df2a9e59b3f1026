//! Safe casting utilities for pixel coordinates and tensor dimensions

use crate::{Error, Result};

/// Safely convert usize to u32 with overflow checking
///
/// # Errors
///
/// Returns an error if the value exceeds u32::MAX
pub fn usize_to_u32(value: usize) -> Result<u32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Value {value} too large to fit in u32")))
}

/// Truncate a relative coordinate scaled by `extent` toward zero.
///
/// Mirrors integer conversion of `relative * extent`: `-0.5` becomes `0`,
/// `12.9` becomes `12`. Non-finite input maps to `0`.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamped into i64 range before the cast
pub fn scale_trunc(relative: f32, extent: u32) -> i64 {
    let value = f64::from(relative) * f64::from(extent);
    if !value.is_finite() {
        return 0;
    }
    value.clamp(i64::MIN as f64, i64::MAX as f64).trunc() as i64
}

/// Clamp a signed pixel coordinate into `[0, max]` and convert to u32
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
#[allow(clippy::cast_sign_loss)]
pub fn i64_to_u32_clamp(value: i64, max: u32) -> u32 {
    value.clamp(0, i64::from(max)) as u32
}

/// Round and clamp a floating-point channel value into the u8 range
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
#[allow(clippy::cast_sign_loss)]
pub fn f32_to_u8_round(value: f32) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_usize_to_u32() {
        assert_eq!(usize_to_u32(42).unwrap(), 42);
        assert_eq!(usize_to_u32(u32::MAX as usize).unwrap(), u32::MAX);
        if std::mem::size_of::<usize>() > 4 {
            assert!(usize_to_u32(u32::MAX as usize + 1).is_err());
        }
    }

    #[test]
    fn test_scale_trunc() {
        assert_eq!(scale_trunc(0.25, 100), 25);
        assert_eq!(scale_trunc(0.129, 100), 12);
        assert_eq!(scale_trunc(-0.005, 100), 0);
        assert_eq!(scale_trunc(-0.1, 100), -10);
        assert_eq!(scale_trunc(f32::NAN, 100), 0);
    }

    #[test]
    fn test_i64_to_u32_clamp() {
        assert_eq!(i64_to_u32_clamp(-5, 100), 0);
        assert_eq!(i64_to_u32_clamp(50, 100), 50);
        assert_eq!(i64_to_u32_clamp(500, 100), 100);
    }

    #[test]
    fn test_f32_to_u8_round() {
        assert_eq!(f32_to_u8_round(-3.0), 0);
        assert_eq!(f32_to_u8_round(127.5), 128);
        assert_eq!(f32_to_u8_round(300.0), 255);
        assert_eq!(f32_to_u8_round(f32::NAN), 0);
    }

    proptest! {
        #[test]
        fn prop_i64_to_u32_clamp_within_bounds(value in any::<i64>(), max in 0..=u32::MAX) {
            let result = i64_to_u32_clamp(value, max);
            prop_assert!(result <= max);
        }

        #[test]
        fn prop_f32_to_u8_round_identity_on_integers(value in 0u8..=255) {
            prop_assert_eq!(f32_to_u8_round(f32::from(value)), value);
        }
    }
}
