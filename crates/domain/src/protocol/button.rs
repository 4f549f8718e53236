//! Button sub-channel: `[0x01, state]` where `0x80` means pressed.

use crate::error::DecodeError;
use crate::event::CubeEvent;
use crate::protocol::FrameReader;

const BUTTON_ID: u8 = 0x01;
const PRESSED: u8 = 0x80;
const RELEASED: u8 = 0x00;

/// Decode a button notification or read result.
///
/// # Errors
///
/// Returns [`DecodeError`] for empty or truncated frames, an unknown button
/// id or a state byte other than `0x00` / `0x80`.
pub fn decode(data: &[u8]) -> Result<CubeEvent, DecodeError> {
    decode_pressed(data).map(|pressed| CubeEvent::ButtonState { pressed })
}

/// Decode a button frame into its pressed flag.
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_pressed(data: &[u8]) -> Result<bool, DecodeError> {
    let id = *data.first().ok_or(DecodeError::Empty)?;
    if id != BUTTON_ID {
        return Err(DecodeError::UnknownOpcode(id));
    }
    let mut r = FrameReader::new("button", data);
    r.require(2)?;
    r.u8()?;
    match r.u8()? {
        PRESSED => Ok(true),
        RELEASED => Ok(false),
        other => Err(DecodeError::InvalidValue {
            field: "button state",
            value: u32::from(other),
        }),
    }
}
