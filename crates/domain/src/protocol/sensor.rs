//! Sensor sub-channel: motion detector, magnet sensor and attitude.
//!
//! ## Requests
//!
//! | Frame | Reply opcode |
//! |-------|--------------|
//! | `81` | `0x01` motion |
//! | `82` | `0x02` magnet |
//! | `83 fmt` | `0x03` attitude in format `fmt` |
//!
//! ## Notifications
//!
//! | Opcode | Payload |
//! |--------|---------|
//! | `0x01` | flat, collision, double tap, orientation, shake (2.1+) |
//! | `0x02` | magnet state id, force, direction x/y/z (force mode) |
//! | `0x03` | `01` roll/pitch/yaw (i16) or `02` w/x/y/z (f32) |

use serde::{Deserialize, Serialize};

use crate::channel::Domain;
use crate::command::Command;
use crate::error::DecodeError;
use crate::event::{
    AttitudeEuler, AttitudeQuaternion, CubeEvent, MagnetForce, MotionStatus, Orientation,
};
use crate::protocol::FrameReader;

const MOTION: u8 = 0x01;
const MAGNET: u8 = 0x02;
const ATTITUDE: u8 = 0x03;
const REQUEST_FLAG: u8 = 0x80;

/// What the magnet sensor reports, as configured on the cube.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MagnetMode {
    Disabled,
    /// Magnet placement id.
    #[default]
    State,
    /// Magnetic force and direction.
    Force,
}

impl MagnetMode {
    /// Raw byte used by the configuration channel.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Disabled => 0x00,
            Self::State => 0x01,
            Self::Force => 0x02,
        }
    }
}

/// Attitude representation requested from the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttitudeFormat {
    Euler,
    Quaternion,
}

impl AttitudeFormat {
    /// Raw format byte.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Euler => 0x01,
            Self::Quaternion => 0x02,
        }
    }
}

/// Kind of reading a sensor request waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingKind {
    Motion,
    Magnet,
    Attitude(AttitudeFormat),
}

/// A decoded sensor frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    Motion(MotionStatus),
    MagnetState(u8),
    /// Force-mode reading; the state id is still reported alongside.
    MagnetForce(u8, MagnetForce),
    AttitudeEuler(AttitudeEuler),
    AttitudeQuaternion(AttitudeQuaternion),
}

impl SensorReading {
    /// Request kind this reading answers.
    #[must_use]
    pub fn kind(&self) -> ReadingKind {
        match self {
            Self::Motion(_) => ReadingKind::Motion,
            Self::MagnetState(_) | Self::MagnetForce(..) => ReadingKind::Magnet,
            Self::AttitudeEuler(_) => ReadingKind::Attitude(AttitudeFormat::Euler),
            Self::AttitudeQuaternion(_) => ReadingKind::Attitude(AttitudeFormat::Quaternion),
        }
    }

    /// Events published for this reading, one per name.
    #[must_use]
    pub fn into_events(self) -> Vec<CubeEvent> {
        match self {
            Self::Motion(status) => status.into_events().to_vec(),
            Self::MagnetState(id) => vec![CubeEvent::MagnetState { id }],
            Self::MagnetForce(_, force) => vec![CubeEvent::MagnetForce(force)],
            Self::AttitudeEuler(euler) => vec![CubeEvent::AttitudeEuler(euler)],
            Self::AttitudeQuaternion(quat) => vec![CubeEvent::AttitudeQuaternion(quat)],
        }
    }
}

/// Encode a read request; the cube answers with one notification of `kind`.
#[must_use]
pub fn encode_request(kind: ReadingKind) -> Command {
    let bytes = match kind {
        ReadingKind::Motion => vec![REQUEST_FLAG | MOTION],
        ReadingKind::Magnet => vec![REQUEST_FLAG | MAGNET],
        ReadingKind::Attitude(format) => vec![REQUEST_FLAG | ATTITUDE, format.as_u8()],
    };
    Command::new(Domain::Sensor, bytes)
}

fn decode_motion(data: &[u8]) -> Result<SensorReading, DecodeError> {
    let mut r = FrameReader::new("motion", data);
    r.require(5)?;
    r.u8()?;
    let is_flat = r.flag()?;
    let is_collision_detected = r.flag()?;
    let is_double_tapped = r.flag()?;
    let raw = r.u8()?;
    let orientation = Orientation::from_raw(raw).ok_or(DecodeError::InvalidValue {
        field: "orientation",
        value: u32::from(raw),
    })?;
    let shake_level = if r.remaining() > 0 { r.u8()? } else { 0 };
    Ok(SensorReading::Motion(MotionStatus {
        is_sloped: !is_flat,
        is_collision_detected,
        is_double_tapped,
        orientation,
        shake_level,
    }))
}

fn decode_magnet(data: &[u8], mode: MagnetMode) -> Result<SensorReading, DecodeError> {
    let mut r = FrameReader::new("magnet", data);
    r.require(2)?;
    r.u8()?;
    let state = r.u8()?;
    if mode != MagnetMode::Force {
        return Ok(SensorReading::MagnetState(state));
    }
    r.require(6)?;
    Ok(SensorReading::MagnetForce(
        state,
        MagnetForce {
            force: r.u8()?,
            direction_x: r.i8()?,
            direction_y: r.i8()?,
            direction_z: r.i8()?,
        },
    ))
}

fn decode_attitude(data: &[u8]) -> Result<SensorReading, DecodeError> {
    let mut r = FrameReader::new("attitude", data);
    r.require(2)?;
    r.u8()?;
    match r.u8()? {
        0x01 => {
            r.require(8)?;
            Ok(SensorReading::AttitudeEuler(AttitudeEuler {
                roll: r.i16()?,
                pitch: r.i16()?,
                yaw: r.i16()?,
            }))
        }
        0x02 => {
            r.require(18)?;
            Ok(SensorReading::AttitudeQuaternion(AttitudeQuaternion {
                w: r.f32()?,
                x: r.f32()?,
                y: r.f32()?,
                z: r.f32()?,
            }))
        }
        other => Err(DecodeError::InvalidValue {
            field: "attitude format",
            value: u32::from(other),
        }),
    }
}

/// Decode one sensor notification; `magnet_mode` selects how magnet
/// frames are interpreted.
///
/// # Errors
///
/// Returns [`DecodeError`] for empty, truncated or unknown frames.
pub fn decode(data: &[u8], magnet_mode: MagnetMode) -> Result<SensorReading, DecodeError> {
    let opcode = *data.first().ok_or(DecodeError::Empty)?;
    match opcode {
        MOTION => decode_motion(data),
        MAGNET => decode_magnet(data, magnet_mode),
        ATTITUDE => decode_attitude(data),
        other => Err(DecodeError::UnknownOpcode(other)),
    }
}
