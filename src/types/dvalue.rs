//! Data value representing a value of any [DType](crate::models::DType)

use crate::error::ScatterError;

/// A value of any DType.
///
/// This is an alias of the Number type from serde_json, an enum over i64, u64 and f64 where
/// floating point numbers must be finite. Fill values arrive in requests as JSON numbers and are
/// converted to the element type once the DType is known.
pub type DValue = serde_json::Number;

/// Attempt to convert from a [DValue] to a specific numeric type.
// This trait exists because we can't implement TryFrom<DValue> for numeric types because the trait
// and type are in external crates.
pub trait TryFromDValue: Sized {
    /// Try to convert from a [DValue] to a numeric type.
    fn try_from_dvalue(value: DValue) -> Result<Self, ScatterError>;
}

// Signed integers go via i64, unsigned via u64. Floats are never truncated to integers.
macro_rules! impl_try_from_dvalue_int {
    ($wide:ident, $as_wide:ident, $($t:ty),+) => {
        $(
            impl TryFromDValue for $t {
                fn try_from_dvalue(value: DValue) -> Result<Self, ScatterError> {
                    value
                        .$as_wide()
                        .and_then(|wide: $wide| <$t>::try_from(wide).ok())
                        .ok_or(ScatterError::IncompatibleFillValue(value))
                }
            }
        )+
    };
}

impl_try_from_dvalue_int!(i64, as_i64, i32, i64);
impl_try_from_dvalue_int!(u64, as_u64, u32, u64);

impl TryFromDValue for f32 {
    fn try_from_dvalue(value: DValue) -> Result<Self, ScatterError> {
        // Values beyond the f32 range become infinite when cast.
        match value.as_f64().map(|float| float as f32) {
            Some(float) if float.is_finite() => Ok(float),
            _ => Err(ScatterError::IncompatibleFillValue(value)),
        }
    }
}

impl TryFromDValue for f64 {
    fn try_from_dvalue(value: DValue) -> Result<Self, ScatterError> {
        value
            .as_f64()
            .ok_or(ScatterError::IncompatibleFillValue(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_incompatible<T: std::fmt::Debug>(result: Result<T, ScatterError>, expected: &str) {
        match result.unwrap_err() {
            ScatterError::IncompatibleFillValue(value) => assert_eq!(expected, value.to_string()),
            err => panic!("unexpected error {:?}", err),
        }
    }

    #[test]
    fn dvalue_rejects_non_finite() {
        assert!(DValue::from_f64(f64::INFINITY).is_none());
        assert!(DValue::from_f64(f64::NAN).is_none());
    }

    #[test]
    fn try_from_dvalue_i32() {
        assert_eq!(-42, i32::try_from_dvalue((-42).into()).unwrap());
    }

    #[test]
    fn try_from_dvalue_i32_too_large() {
        assert_incompatible(
            i32::try_from_dvalue((i32::MAX as i64 + 1).into()),
            "2147483648",
        );
    }

    #[test]
    fn try_from_dvalue_i64_too_large() {
        assert_incompatible(
            i64::try_from_dvalue((i64::MAX as u64 + 1).into()),
            "9223372036854775808",
        );
    }

    #[test]
    fn try_from_dvalue_i64_float() {
        assert_incompatible(i64::try_from_dvalue(DValue::from_f64(1.5).unwrap()), "1.5");
    }

    #[test]
    fn try_from_dvalue_u32() {
        assert_eq!(42, u32::try_from_dvalue(42.into()).unwrap());
    }

    #[test]
    fn try_from_dvalue_u32_negative() {
        assert_incompatible(u32::try_from_dvalue((-1).into()), "-1");
    }

    #[test]
    fn try_from_dvalue_u64_max() {
        assert_eq!(u64::MAX, u64::try_from_dvalue(u64::MAX.into()).unwrap());
    }

    #[test]
    fn try_from_dvalue_f32_int() {
        assert_eq!(42.0, f32::try_from_dvalue(42_u64.into()).unwrap());
    }

    #[test]
    fn try_from_dvalue_f32_too_large() {
        let value = DValue::from_f64((f32::MAX as f64) * 2.0).unwrap();
        assert_incompatible(f32::try_from_dvalue(value), "6.805646932770577e38");
    }

    #[test]
    fn try_from_dvalue_f64() {
        let value = DValue::from_f64(-0.25).unwrap();
        assert_eq!(-0.25, f64::try_from_dvalue(value).unwrap());
    }
}
