//! Parameter range checks.
//!
//! Out-of-range values are rejected, never clamped: a clamped speed would
//! silently drive the hardware somewhere the caller did not ask for.

use crate::error::ParameterError;

/// Check that `value` lies within `[min, max]`.
///
/// # Errors
///
/// Returns [`ParameterError::OutOfRange`] naming the parameter.
pub fn ensure_range<T>(name: &'static str, value: T, min: T, max: T) -> Result<T, ParameterError>
where
    T: Copy + PartialOrd + Into<i64>,
{
    if value < min || value > max {
        return Err(ParameterError::OutOfRange {
            name,
            value: value.into(),
            min: min.into(),
            max: max.into(),
        });
    }
    Ok(value)
}

/// Check that a list holds between `min` and `max` items.
///
/// # Errors
///
/// Returns [`ParameterError::Count`] naming the parameter.
pub fn ensure_count<T>(
    name: &'static str,
    items: &[T],
    min: usize,
    max: usize,
) -> Result<(), ParameterError> {
    let len = items.len();
    if len < min || len > max {
        return Err(ParameterError::Count {
            name,
            len,
            min,
            max,
        });
    }
    Ok(())
}

/// Validate a duration in milliseconds and convert it to the cube's
/// 10 ms unit (truncating).
///
/// # Errors
///
/// Returns [`ParameterError::OutOfRange`] outside `[min_ms, 2550]`.
pub fn duration_units(name: &'static str, millis: u16, min_ms: u16) -> Result<u8, ParameterError> {
    let millis = ensure_range(name, millis, min_ms, 2550)?;
    Ok(u8::try_from(millis / 10).unwrap_or(u8::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_bounds_inclusively() {
        assert_eq!(ensure_range("speed", -115i16, -115, 115), Ok(-115));
        assert_eq!(ensure_range("speed", 115i16, -115, 115), Ok(115));
    }

    #[test]
    fn should_reject_value_above_max() {
        let err = ensure_range("left speed", 200i16, -115, 115).unwrap_err();
        assert_eq!(
            err,
            ParameterError::OutOfRange {
                name: "left speed",
                value: 200,
                min: -115,
                max: 115,
            }
        );
    }

    #[test]
    fn should_reject_empty_list() {
        let err = ensure_count::<u8>("targets", &[], 1, 29).unwrap_err();
        assert!(matches!(err, ParameterError::Count { len: 0, .. }));
    }

    #[test]
    fn should_truncate_duration_to_ten_ms_units() {
        assert_eq!(duration_units("duration", 0, 0), Ok(0));
        assert_eq!(duration_units("duration", 1005, 0), Ok(100));
        assert_eq!(duration_units("duration", 2550, 0), Ok(255));
    }

    #[test]
    fn should_reject_duration_above_2550() {
        assert!(duration_units("duration", 2551, 0).is_err());
    }

    #[test]
    fn should_reject_duration_below_minimum() {
        assert!(duration_units("note duration", 5, 10).is_err());
    }
}
