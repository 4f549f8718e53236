//! Battery sub-channel: `[level]` in percent.

use crate::error::DecodeError;
use crate::event::CubeEvent;

/// Decode a battery notification or read result.
///
/// # Errors
///
/// Returns [`DecodeError::Empty`] for a zero-length frame and
/// [`DecodeError::InvalidValue`] for a level above 100.
pub fn decode(data: &[u8]) -> Result<CubeEvent, DecodeError> {
    decode_level(data).map(CubeEvent::BatteryLevel)
}

/// Decode a battery frame into its level in percent.
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_level(data: &[u8]) -> Result<u8, DecodeError> {
    let level = *data.first().ok_or(DecodeError::Empty)?;
    if level > 100 {
        return Err(DecodeError::InvalidValue {
            field: "battery level",
            value: u32::from(level),
        });
    }
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_decode_level() {
        assert_eq!(decode(&[0x50]).unwrap(), CubeEvent::BatteryLevel(80));
    }

    #[test]
    fn should_reject_empty_frame_and_impossible_level() {
        assert_eq!(decode(&[]).unwrap_err(), DecodeError::Empty);
        assert!(decode(&[101]).is_err());
    }
}
