//! ID sub-channel: position and standard ID notifications.
//!
//! | Opcode | Bytes | Payload |
//! |--------|-------|---------|
//! | `0x01` | 13 | cube x, y, angle; sensor x, y, angle (u16 LE each) |
//! | `0x02` | 7 | standard id (u32 LE), angle (u16 LE) |
//! | `0x03` | 1 | position ID lost |
//! | `0x04` | 1 | standard ID lost |

use crate::error::DecodeError;
use crate::event::{CubeEvent, PositionId, StandardId};
use crate::protocol::FrameReader;

const POSITION_ID: u8 = 0x01;
const STANDARD_ID: u8 = 0x02;
const POSITION_ID_MISSED: u8 = 0x03;
const STANDARD_ID_MISSED: u8 = 0x04;

/// Decode one ID notification.
///
/// # Errors
///
/// Returns [`DecodeError`] for empty, truncated or unknown frames.
pub fn decode(data: &[u8]) -> Result<CubeEvent, DecodeError> {
    let opcode = *data.first().ok_or(DecodeError::Empty)?;
    match opcode {
        POSITION_ID => {
            let mut r = FrameReader::new("position id", data);
            r.require(13)?;
            r.u8()?;
            Ok(CubeEvent::PositionSampled(PositionId {
                x: r.u16()?,
                y: r.u16()?,
                angle: r.u16()?,
                sensor_x: r.u16()?,
                sensor_y: r.u16()?,
                sensor_angle: r.u16()?,
            }))
        }
        STANDARD_ID => {
            let mut r = FrameReader::new("standard id", data);
            r.require(7)?;
            r.u8()?;
            Ok(CubeEvent::StandardIdSampled(StandardId {
                id: r.u32()?,
                angle: r.u16()?,
            }))
        }
        POSITION_ID_MISSED => Ok(CubeEvent::PositionLost),
        STANDARD_ID_MISSED => Ok(CubeEvent::StandardIdLost),
        other => Err(DecodeError::UnknownOpcode(other)),
    }
}
