//! Motor sub-channel: movement commands and their responses.
//!
//! ## Commands
//!
//! | Opcode | Layout | Frame |
//! |--------|--------|-------|
//! | `0x01` | 2.1+ | untimed move: `01 01 ldir lspd 02 rdir rspd` |
//! | `0x02` | all | timed move: `02 01 ldir lspd 02 rdir rspd dur` |
//! | `0x04` | 2.1+ | target move: `04 req timeout type max speed_type 00 write (x y angle)*` |
//! | `0x05` | 2.1+ | acceleration move: `05 spd acc rot(u16) rot_dir travel_dir prio dur` |
//!
//! Direction bytes are `0x01` forward / `0x02` backward; durations are in
//! 10 ms units and `0` means "until the next command".
//!
//! ## Notifications
//!
//! | Opcode | Payload |
//! |--------|---------|
//! | `0x83` | single-target response: request id, result |
//! | `0x84` | multi-target response: request id, result |
//! | `0xe0` | wheel speed feedback: left, right |

use serde::{Deserialize, Serialize};

use crate::channel::Domain;
use crate::command::Command;
use crate::error::{CubeError, DecodeError};
use crate::event::{CubeEvent, MotorResponse, MotorSpeed, MoveToOutcome};
use crate::id::RequestId;
use crate::protocol::FrameReader;
use crate::range::{duration_units, ensure_count, ensure_range};
use crate::version::{FirmwareLayout, ProtocolVersion};

const MOVE: u8 = 0x01;
const MOVE_TIMED: u8 = 0x02;
const MOVE_TO_TARGETS: u8 = 0x04;
const ACCELERATION_MOVE: u8 = 0x05;
const MOVE_TO_RESPONSE: u8 = 0x83;
const MOVE_TO_TARGETS_RESPONSE: u8 = 0x84;
const SPEED_FEEDBACK: u8 = 0xe0;

const LEFT_MOTOR: u8 = 0x01;
const RIGHT_MOTOR: u8 = 0x02;
const FORWARD: u8 = 0x01;
const BACKWARD: u8 = 0x02;

/// Maximum wheel and translation speed accepted by the cube.
pub const MAX_SPEED: i16 = 115;
/// Maximum number of targets in one target move.
pub const MAX_TARGETS: usize = 29;
/// Coordinate value meaning "keep the current coordinate".
const KEEP_COORDINATE: u16 = 0xffff;

/// Motor commands available in one firmware layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorLayout {
    /// Untimed moves use the short `0x01` frame.
    pub untimed_move: bool,
    /// Target moves (`0x04`) are available.
    pub target_move: bool,
    /// Acceleration moves (`0x05`) are available.
    pub acceleration_move: bool,
}

const MOTOR_LAYOUTS: [(FirmwareLayout, MotorLayout); 4] = [
    (
        FirmwareLayout::V2_0,
        MotorLayout {
            untimed_move: false,
            target_move: false,
            acceleration_move: false,
        },
    ),
    (
        FirmwareLayout::V2_1,
        MotorLayout {
            untimed_move: true,
            target_move: true,
            acceleration_move: true,
        },
    ),
    (
        FirmwareLayout::V2_2,
        MotorLayout {
            untimed_move: true,
            target_move: true,
            acceleration_move: true,
        },
    ),
    (
        FirmwareLayout::V2_3,
        MotorLayout {
            untimed_move: true,
            target_move: true,
            acceleration_move: true,
        },
    ),
];

impl MotorLayout {
    /// Row of the motor layout table for `layout`.
    #[must_use]
    pub fn for_layout(layout: FirmwareLayout) -> Self {
        MOTOR_LAYOUTS
            .iter()
            .find(|(key, _)| *key == layout)
            .map_or(MOTOR_LAYOUTS[0].1, |(_, row)| *row)
    }
}

/// How the cube turns to reach a target angle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotateType {
    /// Absolute angle, shortest direction.
    #[default]
    Absolute,
    /// Absolute angle, turning in the positive direction.
    AbsolutePositive,
    /// Absolute angle, turning in the negative direction.
    AbsoluteNegative,
    /// Angle relative to the current heading, positive direction.
    RelativePositive,
    /// Angle relative to the current heading, negative direction.
    RelativeNegative,
    /// Do not rotate at the target.
    None,
}

impl RotateType {
    fn bits(self) -> u16 {
        match self {
            Self::Absolute => 0,
            Self::AbsolutePositive => 1,
            Self::AbsoluteNegative => 2,
            Self::RelativePositive => 3,
            Self::RelativeNegative => 4,
            Self::None => 5,
        }
    }
}

/// One waypoint of a target move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveToTarget {
    /// Target X; `None` keeps the current X.
    pub x: Option<u16>,
    /// Target Y; `None` keeps the current Y.
    pub y: Option<u16>,
    /// Target angle in degrees; `None` does not rotate.
    pub angle: Option<u16>,
    /// Rotation rule; defaults to [`RotateType::Absolute`] with an angle and
    /// [`RotateType::None`] without one.
    pub rotate_type: Option<RotateType>,
}

impl MoveToTarget {
    /// Target at `(x, y)` keeping the current heading.
    #[must_use]
    pub fn point(x: u16, y: u16) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Target at `(x, y)` facing `angle` degrees.
    #[must_use]
    pub fn pose(x: u16, y: u16, angle: u16) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            angle: Some(angle),
            rotate_type: None,
        }
    }
}

/// Path style of a target move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveType {
    #[default]
    RotateWhileMoving,
    RotateWhileMovingForwardOnly,
    RotateThenMove,
}

/// Speed profile of a target move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeedType {
    #[default]
    Constant,
    Accelerate,
    Decelerate,
    AccelerateThenDecelerate,
}

/// Options of a target move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveToOptions {
    pub move_type: MoveType,
    /// Maximum speed, `[10, 115]`.
    pub max_speed: u8,
    pub speed_type: SpeedType,
    /// Cube-side timeout in seconds; `0` lets the cube use its default.
    pub timeout_secs: u8,
    /// `true` supersedes an in-flight target move; `false` queues behind it.
    pub overwrite: bool,
}

impl Default for MoveToOptions {
    fn default() -> Self {
        Self {
            move_type: MoveType::default(),
            max_speed: 115,
            speed_type: SpeedType::default(),
            timeout_secs: 0,
            overwrite: true,
        }
    }
}

/// Which speed wins when translation and rotation exceed the motor limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccelerationPriority {
    #[default]
    Translation,
    Rotation,
}

/// Parameters of an acceleration move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccelerationMove {
    /// Translation speed, `[-115, 115]`; negative drives backwards.
    pub translation_speed: i16,
    /// Rotation speed in degrees per second, `[-32767, 32767]`.
    pub rotation_speed: i16,
    /// Speed increment per 100 ms; `0` reaches the speed immediately.
    pub acceleration: u8,
    pub priority: AccelerationPriority,
    /// Duration in milliseconds, `[0, 2550]`; `0` is unlimited.
    pub duration_ms: u16,
}

fn wheel(speed: i16) -> (u8, u8) {
    let direction = if speed < 0 { BACKWARD } else { FORWARD };
    let magnitude = u8::try_from(speed.unsigned_abs()).unwrap_or(u8::MAX);
    (direction, magnitude)
}

fn unsupported(feature: &'static str, version: &ProtocolVersion) -> CubeError {
    CubeError::Unsupported {
        feature,
        version: version.clone(),
    }
}

/// Encode a differential move.
///
/// # Errors
///
/// Returns [`CubeError::OutOfRange`] for speeds outside `[-115, 115]` or a
/// duration above 2550 ms.
pub fn encode_move(
    version: &ProtocolVersion,
    left: i16,
    right: i16,
    duration_ms: u16,
) -> Result<Command, CubeError> {
    let left = ensure_range("left speed", left, -MAX_SPEED, MAX_SPEED)?;
    let right = ensure_range("right speed", right, -MAX_SPEED, MAX_SPEED)?;
    let duration = duration_units("duration", duration_ms, 0)?;
    let layout = MotorLayout::for_layout(version.layout());

    let (left_dir, left_speed) = wheel(left);
    let (right_dir, right_speed) = wheel(right);
    let mut bytes = vec![
        MOVE_TIMED,
        LEFT_MOTOR,
        left_dir,
        left_speed,
        RIGHT_MOTOR,
        right_dir,
        right_speed,
    ];
    if duration == 0 && layout.untimed_move {
        bytes[0] = MOVE;
    } else {
        bytes.push(duration);
    }
    Ok(Command::new(Domain::Motor, bytes))
}

/// Encode a stop (both wheels at zero, untimed).
///
/// # Errors
///
/// Never fails in practice; shares the signature of [`encode_move`].
pub fn encode_stop(version: &ProtocolVersion) -> Result<Command, CubeError> {
    encode_move(version, 0, 0, 0)
}

fn encode_target(target: &MoveToTarget, out: &mut Vec<u8>) -> Result<(), CubeError> {
    let x = match target.x {
        Some(x) => ensure_range("target x", x, 0, KEEP_COORDINATE - 1)?,
        None => KEEP_COORDINATE,
    };
    let y = match target.y {
        Some(y) => ensure_range("target y", y, 0, KEEP_COORDINATE - 1)?,
        None => KEEP_COORDINATE,
    };
    let angle = ensure_range("target angle", target.angle.unwrap_or(0), 0, 0x1fff)?;
    let rotate = target.rotate_type.unwrap_or(if target.angle.is_some() {
        RotateType::Absolute
    } else {
        RotateType::None
    });
    out.extend_from_slice(&x.to_le_bytes());
    out.extend_from_slice(&y.to_le_bytes());
    out.extend_from_slice(&((rotate.bits() << 13) | angle).to_le_bytes());
    Ok(())
}

/// Encode a target move carrying `request_id`.
///
/// # Errors
///
/// Returns [`CubeError::Unsupported`] before protocol 2.1, or
/// [`CubeError::OutOfRange`] for an empty or oversized target list, a max
/// speed outside `[10, 115]` or an out-of-range coordinate.
pub fn encode_move_to(
    version: &ProtocolVersion,
    request_id: RequestId,
    targets: &[MoveToTarget],
    options: &MoveToOptions,
) -> Result<Command, CubeError> {
    if !MotorLayout::for_layout(version.layout()).target_move {
        return Err(unsupported("move_to", version));
    }
    ensure_count("targets", targets, 1, MAX_TARGETS)?;
    let max_speed = ensure_range("max speed", options.max_speed, 10, 115)?;

    let mut bytes = Vec::with_capacity(8 + targets.len() * 6);
    bytes.extend_from_slice(&[
        MOVE_TO_TARGETS,
        request_id.as_u8(),
        options.timeout_secs,
        options.move_type as u8,
        max_speed,
        options.speed_type as u8,
        0x00,
        u8::from(!options.overwrite),
    ]);
    for target in targets {
        encode_target(target, &mut bytes)?;
    }
    Ok(Command::new(Domain::Motor, bytes))
}

/// Encode an acceleration move.
///
/// # Errors
///
/// Returns [`CubeError::Unsupported`] before protocol 2.1, or
/// [`CubeError::OutOfRange`] for a translation speed outside `[-115, 115]`,
/// a rotation speed outside `[-32767, 32767]` or a duration above 2550 ms.
pub fn encode_acceleration_move(
    version: &ProtocolVersion,
    params: &AccelerationMove,
) -> Result<Command, CubeError> {
    if !MotorLayout::for_layout(version.layout()).acceleration_move {
        return Err(unsupported("acceleration_move", version));
    }
    let translation = ensure_range(
        "translation speed",
        params.translation_speed,
        -MAX_SPEED,
        MAX_SPEED,
    )?;
    let rotation = ensure_range("rotation speed", params.rotation_speed, -32767, 32767)?;
    let duration = duration_units("duration", params.duration_ms, 0)?;

    let speed = u8::try_from(translation.unsigned_abs()).unwrap_or(u8::MAX);
    let mut bytes = vec![ACCELERATION_MOVE, speed, params.acceleration];
    bytes.extend_from_slice(&rotation.unsigned_abs().to_le_bytes());
    bytes.extend_from_slice(&[
        u8::from(rotation < 0),
        u8::from(translation < 0),
        params.priority as u8,
        duration,
    ]);
    Ok(Command::new(Domain::Motor, bytes))
}

/// Decode one motor notification.
///
/// # Errors
///
/// Returns [`DecodeError`] for empty, truncated or unknown frames and for
/// unknown result codes.
pub fn decode(data: &[u8]) -> Result<CubeEvent, DecodeError> {
    let opcode = *data.first().ok_or(DecodeError::Empty)?;
    match opcode {
        MOVE_TO_RESPONSE | MOVE_TO_TARGETS_RESPONSE => {
            let mut r = FrameReader::new("motor response", data);
            r.require(3)?;
            r.u8()?;
            let request_id = RequestId::from_raw(r.u8()?);
            let raw = r.u8()?;
            let outcome = MoveToOutcome::from_raw(raw).ok_or(DecodeError::InvalidValue {
                field: "move result",
                value: u32::from(raw),
            })?;
            Ok(CubeEvent::MotorCommandResponse(MotorResponse {
                request_id,
                multiple_targets: opcode == MOVE_TO_TARGETS_RESPONSE,
                outcome,
            }))
        }
        SPEED_FEEDBACK => {
            let mut r = FrameReader::new("motor speed", data);
            r.require(3)?;
            r.u8()?;
            Ok(CubeEvent::MotorSpeed(MotorSpeed {
                left: r.u8()?,
                right: r.u8()?,
            }))
        }
        other => Err(DecodeError::UnknownOpcode(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ParameterError};

    const V2_0: ProtocolVersion = ProtocolVersion::new(2, 0, 0);
    const V2_1: ProtocolVersion = ProtocolVersion::new(2, 1, 0);

    // ── Differential move ───────────────────────────────────────────────

    #[test]
    fn should_encode_untimed_move_with_timed_layout_on_2_0() {
        let cmd = encode_move(&V2_0, 50, 40, 0).unwrap();
        assert_eq!(cmd.domain(), Domain::Motor);
        assert_eq!(
            cmd.bytes(),
            &[0x02, 0x01, 0x01, 0x32, 0x02, 0x01, 0x28, 0x00]
        );
    }

    #[test]
    fn should_encode_untimed_move_with_short_layout_on_2_1() {
        let cmd = encode_move(&V2_1, 50, 40, 0).unwrap();
        assert_eq!(cmd.bytes(), &[0x01, 0x01, 0x01, 0x32, 0x02, 0x01, 0x28]);
    }

    #[test]
    fn should_encode_timed_move_identically_across_layouts() {
        let expected = [0x02, 0x01, 0x02, 0x73, 0x02, 0x01, 0x73, 0x64];
        assert_eq!(encode_move(&V2_0, -115, 115, 1000).unwrap().bytes(), &expected);
        assert_eq!(encode_move(&V2_1, -115, 115, 1000).unwrap().bytes(), &expected);
    }

    #[test]
    fn should_encode_stop_as_zero_speed_move() {
        assert_eq!(
            encode_stop(&V2_1).unwrap().bytes(),
            &[0x01, 0x01, 0x01, 0x00, 0x02, 0x01, 0x00]
        );
    }

    #[test]
    fn should_reject_wheel_speed_above_115() {
        let err = encode_move(&V2_1, 200, 0, 0).unwrap_err();
        let CubeError::OutOfRange(ParameterError::OutOfRange { name, value, .. }) = &err else {
            panic!("expected out of range, got {err:?}");
        };
        assert_eq!(*name, "left speed");
        assert_eq!(*value, 200);
    }

    #[test]
    fn should_reject_negative_wheel_speed_below_minus_115() {
        let err = encode_move(&V2_1, 0, -116, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn should_reject_move_duration_above_2550() {
        let err = encode_move(&V2_1, 10, 10, 2551).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    // ── Target move ─────────────────────────────────────────────────────

    #[test]
    fn should_encode_single_target_move() {
        let cmd = encode_move_to(
            &V2_1,
            RequestId::from_raw(1),
            &[MoveToTarget::pose(200, 200, 90)],
            &MoveToOptions::default(),
        )
        .unwrap();
        assert_eq!(
            cmd.bytes(),
            &[
                0x04, 0x01, 0x00, 0x00, 0x73, 0x00, 0x00, 0x00, // header
                0xc8, 0x00, 0xc8, 0x00, 0x5a, 0x00, // target
            ]
        );
    }

    #[test]
    fn should_encode_append_mode_and_keep_coordinates() {
        let options = MoveToOptions {
            move_type: MoveType::RotateThenMove,
            max_speed: 80,
            speed_type: SpeedType::AccelerateThenDecelerate,
            timeout_secs: 5,
            overwrite: false,
        };
        let target = MoveToTarget {
            x: None,
            y: Some(300),
            angle: None,
            rotate_type: None,
        };
        let cmd = encode_move_to(&V2_1, RequestId::from_raw(7), &[target], &options).unwrap();
        assert_eq!(
            cmd.bytes(),
            &[
                0x04, 0x07, 0x05, 0x02, 0x50, 0x03, 0x00, 0x01, // header
                0xff, 0xff, 0x2c, 0x01, 0x00, 0xa0, // target
            ]
        );
    }

    #[test]
    fn should_encode_relative_rotation_in_upper_bits() {
        let target = MoveToTarget {
            rotate_type: Some(RotateType::RelativeNegative),
            ..MoveToTarget::pose(10, 10, 45)
        };
        let cmd = encode_move_to(
            &V2_1,
            RequestId::from_raw(0),
            &[target],
            &MoveToOptions::default(),
        )
        .unwrap();
        assert_eq!(&cmd.bytes()[12..14], &[0x2d, 0x80]);
    }

    #[test]
    fn should_reject_move_to_on_2_0() {
        let err = encode_move_to(
            &V2_0,
            RequestId::from_raw(0),
            &[MoveToTarget::point(1, 1)],
            &MoveToOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn should_reject_empty_and_oversized_target_lists() {
        let options = MoveToOptions::default();
        let empty = encode_move_to(&V2_1, RequestId::from_raw(0), &[], &options).unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::OutOfRange);

        let many = vec![MoveToTarget::point(1, 1); MAX_TARGETS + 1];
        let err = encode_move_to(&V2_1, RequestId::from_raw(0), &many, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn should_reject_max_speed_below_10() {
        let options = MoveToOptions {
            max_speed: 5,
            ..MoveToOptions::default()
        };
        let err = encode_move_to(
            &V2_1,
            RequestId::from_raw(0),
            &[MoveToTarget::point(1, 1)],
            &options,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    // ── Acceleration move ───────────────────────────────────────────────

    #[test]
    fn should_encode_acceleration_move() {
        let params = AccelerationMove {
            translation_speed: 50,
            rotation_speed: -30,
            acceleration: 10,
            priority: AccelerationPriority::Translation,
            duration_ms: 500,
        };
        let cmd = encode_acceleration_move(&V2_1, &params).unwrap();
        assert_eq!(
            cmd.bytes(),
            &[0x05, 0x32, 0x0a, 0x1e, 0x00, 0x01, 0x00, 0x00, 0x32]
        );
    }

    #[test]
    fn should_encode_backward_acceleration_move_with_rotation_priority() {
        let params = AccelerationMove {
            translation_speed: -115,
            rotation_speed: 32767,
            acceleration: 255,
            priority: AccelerationPriority::Rotation,
            duration_ms: 0,
        };
        let cmd = encode_acceleration_move(&V2_1, &params).unwrap();
        assert_eq!(
            cmd.bytes(),
            &[0x05, 0x73, 0xff, 0xff, 0x7f, 0x00, 0x01, 0x01, 0x00]
        );
    }

    #[test]
    fn should_reject_rotation_speed_of_minus_32768() {
        let params = AccelerationMove {
            rotation_speed: i16::MIN,
            ..AccelerationMove::default()
        };
        let err = encode_acceleration_move(&V2_1, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn should_reject_acceleration_move_on_2_0() {
        let err = encode_acceleration_move(&V2_0, &AccelerationMove::default()).unwrap_err();
        assert!(matches!(
            err,
            CubeError::Unsupported {
                feature: "acceleration_move",
                ..
            }
        ));
    }

    // ── Decoding ────────────────────────────────────────────────────────

    #[test]
    fn should_decode_multi_target_response() {
        let event = decode(&[0x84, 0x07, 0x00]).unwrap();
        assert_eq!(
            event,
            CubeEvent::MotorCommandResponse(MotorResponse {
                request_id: RequestId::from_raw(7),
                multiple_targets: true,
                outcome: MoveToOutcome::Success,
            })
        );
    }

    #[test]
    fn should_decode_single_target_response_with_trailing_bytes() {
        let CubeEvent::MotorCommandResponse(response) = decode(&[0x83, 0x02, 0x05, 0xaa]).unwrap()
        else {
            panic!("expected a motor response");
        };
        assert!(!response.multiple_targets);
        assert_eq!(response.outcome, MoveToOutcome::Overwritten);
    }

    #[test]
    fn should_decode_speed_feedback() {
        assert_eq!(
            decode(&[0xe0, 0x32, 0x28]).unwrap(),
            CubeEvent::MotorSpeed(MotorSpeed {
                left: 50,
                right: 40
            })
        );
    }

    #[test]
    fn should_reject_unknown_result_code() {
        let err = decode(&[0x84, 0x01, 0x42]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { value: 0x42, .. }));
    }

    #[test]
    fn should_reject_truncated_response() {
        assert!(matches!(
            decode(&[0x84, 0x01]).unwrap_err(),
            DecodeError::Truncated { .. }
        ));
    }
}
