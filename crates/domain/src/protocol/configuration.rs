//! Configuration sub-channel: version query and sensor/notification settings.
//!
//! ## Commands
//!
//! | Opcode | Layout | Frame |
//! |--------|--------|-------|
//! | `0x01` | all | `01 00` protocol version request |
//! | `0x05` | all | `05 00 degree` flat threshold |
//! | `0x06` | all | `06 00 level` collision threshold |
//! | `0x17` | all | `17 00 level` double-tap interval |
//! | `0x18` | 2.3+ | `18 00 interval condition` ID notification |
//! | `0x19` | 2.3+ | `19 00 sensitivity` ID missed notification |
//! | `0x1b` | 2.2+ | `1b 00 mode` (2.2), `1b 00 mode interval condition` (2.3+) |
//! | `0x1c` | 2.1+ | `1c 00 enable` motor speed feedback |
//! | `0x1d` | 2.2+ | `1d 00 format interval condition` attitude control |
//!
//! ## Notifications
//!
//! | Opcode | Payload |
//! |--------|---------|
//! | `0x81` | `81 00` followed by the ASCII version string |
//! | `0x98`, `0x99`, `0x9b`, `0x9c`, `0x9d` | `op 00 result`, `0x00` = success |

use serde::{Deserialize, Serialize};

use crate::channel::Domain;
use crate::command::Command;
use crate::error::{CubeError, DecodeError};
use crate::event::{ConfigurationResponse, ConfigurationSetting};
use crate::protocol::FrameReader;
use crate::protocol::sensor::{AttitudeFormat, MagnetMode};
use crate::range::{duration_units, ensure_range};
use crate::version::{FirmwareLayout, ProtocolVersion};

const VERSION_REQUEST: u8 = 0x01;
const FLAT_THRESHOLD: u8 = 0x05;
const COLLISION_THRESHOLD: u8 = 0x06;
const DOUBLE_TAP_INTERVAL: u8 = 0x17;
const ID_NOTIFICATION: u8 = 0x18;
const ID_MISSED_NOTIFICATION: u8 = 0x19;
const MAGNET_DETECTION: u8 = 0x1b;
const MOTOR_SPEED_FEEDBACK: u8 = 0x1c;
const ATTITUDE_CONTROL: u8 = 0x1d;
const RESPONSE_FLAG: u8 = 0x80;
const RESERVED: u8 = 0x00;

/// How the magnet setting frame is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnetLayout {
    /// No magnet setting.
    Absent,
    /// Mode byte only.
    ModeOnly,
    /// Mode, interval and notification condition.
    WithInterval,
}

/// Settings available in one firmware layout.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurationLayout {
    pub id_notification: bool,
    pub id_missed_notification: bool,
    pub magnet: MagnetLayout,
    pub motor_speed_feedback: bool,
    pub attitude_control: bool,
}

const CONFIGURATION_LAYOUTS: [(FirmwareLayout, ConfigurationLayout); 4] = [
    (
        FirmwareLayout::V2_0,
        ConfigurationLayout {
            id_notification: false,
            id_missed_notification: false,
            magnet: MagnetLayout::Absent,
            motor_speed_feedback: false,
            attitude_control: false,
        },
    ),
    (
        FirmwareLayout::V2_1,
        ConfigurationLayout {
            id_notification: false,
            id_missed_notification: false,
            magnet: MagnetLayout::Absent,
            motor_speed_feedback: true,
            attitude_control: false,
        },
    ),
    (
        FirmwareLayout::V2_2,
        ConfigurationLayout {
            id_notification: false,
            id_missed_notification: false,
            magnet: MagnetLayout::ModeOnly,
            motor_speed_feedback: true,
            attitude_control: true,
        },
    ),
    (
        FirmwareLayout::V2_3,
        ConfigurationLayout {
            id_notification: true,
            id_missed_notification: true,
            magnet: MagnetLayout::WithInterval,
            motor_speed_feedback: true,
            attitude_control: true,
        },
    ),
];

impl ConfigurationLayout {
    /// Row of the configuration layout table for `layout`.
    #[must_use]
    pub fn for_layout(layout: FirmwareLayout) -> Self {
        CONFIGURATION_LAYOUTS
            .iter()
            .find(|(key, _)| *key == layout)
            .map_or(CONFIGURATION_LAYOUTS[0].1, |(_, row)| *row)
    }
}

/// When the cube sends a periodic notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationCondition {
    /// Every interval.
    #[default]
    Always,
    /// Only when the value changed.
    OnChange,
    /// When the value changed, or 300 ms after the last notification.
    /// Only meaningful for ID notifications.
    OnChangeOrEvery300Ms,
}

impl NotificationCondition {
    fn as_u8(self) -> u8 {
        match self {
            Self::Always => 0x00,
            Self::OnChange => 0x01,
            Self::OnChangeOrEvery300Ms => 0xff,
        }
    }
}

/// A decoded configuration notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationReply {
    /// Raw version string, NUL padding included.
    Version(String),
    /// Acknowledgement of a setting write.
    Response(ConfigurationResponse),
}

fn unsupported(feature: &'static str, version: &ProtocolVersion) -> CubeError {
    CubeError::Unsupported {
        feature,
        version: version.clone(),
    }
}

fn setting(opcode: u8, args: &[u8]) -> Command {
    let mut bytes = Vec::with_capacity(2 + args.len());
    bytes.extend_from_slice(&[opcode, RESERVED]);
    bytes.extend_from_slice(args);
    Command::new(Domain::Configuration, bytes)
}

/// Encode the protocol version request.
#[must_use]
pub fn encode_version_request() -> Command {
    setting(VERSION_REQUEST, &[])
}

/// Encode the flat-detection threshold.
///
/// # Errors
///
/// Returns [`CubeError::OutOfRange`] outside `[1, 45]` degrees.
pub fn encode_flat_threshold(degree: u8) -> Result<Command, CubeError> {
    let degree = ensure_range("flat threshold", degree, 1, 45)?;
    Ok(setting(FLAT_THRESHOLD, &[degree]))
}

/// Encode the collision-detection threshold.
///
/// # Errors
///
/// Returns [`CubeError::OutOfRange`] outside `[1, 10]`.
pub fn encode_collision_threshold(level: u8) -> Result<Command, CubeError> {
    let level = ensure_range("collision threshold", level, 1, 10)?;
    Ok(setting(COLLISION_THRESHOLD, &[level]))
}

/// Encode the double-tap interval threshold.
///
/// # Errors
///
/// Returns [`CubeError::OutOfRange`] outside `[1, 7]`.
pub fn encode_double_tap_interval(level: u8) -> Result<Command, CubeError> {
    let level = ensure_range("double tap interval", level, 1, 7)?;
    Ok(setting(DOUBLE_TAP_INTERVAL, &[level]))
}

/// Encode the ID notification frequency.
///
/// # Errors
///
/// Returns [`CubeError::Unsupported`] before protocol 2.3 and
/// [`CubeError::OutOfRange`] for an interval above 2550 ms.
pub fn encode_id_notification(
    version: &ProtocolVersion,
    interval_ms: u16,
    condition: NotificationCondition,
) -> Result<Command, CubeError> {
    if !ConfigurationLayout::for_layout(version.layout()).id_notification {
        return Err(unsupported("id_notification", version));
    }
    let interval = duration_units("id notification interval", interval_ms, 0)?;
    Ok(setting(ID_NOTIFICATION, &[interval, condition.as_u8()]))
}

/// Encode the ID missed notification sensitivity.
///
/// # Errors
///
/// Returns [`CubeError::Unsupported`] before protocol 2.3 and
/// [`CubeError::OutOfRange`] for a sensitivity above 2550 ms.
pub fn encode_id_missed_notification(
    version: &ProtocolVersion,
    sensitivity_ms: u16,
) -> Result<Command, CubeError> {
    if !ConfigurationLayout::for_layout(version.layout()).id_missed_notification {
        return Err(unsupported("id_missed_notification", version));
    }
    let sensitivity = duration_units("id missed sensitivity", sensitivity_ms, 0)?;
    Ok(setting(ID_MISSED_NOTIFICATION, &[sensitivity]))
}

/// Encode the magnet detection mode. From protocol 2.3 the frame also
/// carries the interval (20 ms units) and notification condition.
///
/// # Errors
///
/// Returns [`CubeError::Unsupported`] before protocol 2.2, or for force
/// mode before 2.3, and [`CubeError::OutOfRange`] for an interval outside
/// `[20, 5100]` ms on 2.3+.
pub fn encode_magnet_detection(
    version: &ProtocolVersion,
    mode: MagnetMode,
    interval_ms: u16,
    condition: NotificationCondition,
) -> Result<Command, CubeError> {
    match ConfigurationLayout::for_layout(version.layout()).magnet {
        MagnetLayout::Absent => Err(unsupported("magnet_detection", version)),
        MagnetLayout::ModeOnly if mode == MagnetMode::Force => {
            Err(unsupported("magnet_force", version))
        }
        MagnetLayout::ModeOnly => Ok(setting(MAGNET_DETECTION, &[mode.as_u8()])),
        MagnetLayout::WithInterval => {
            let interval = ensure_range("magnet interval", interval_ms, 20, 5100)?;
            let units = u8::try_from(interval / 20).unwrap_or(u8::MAX);
            Ok(setting(
                MAGNET_DETECTION,
                &[mode.as_u8(), units, condition.as_u8()],
            ))
        }
    }
}

/// Encode the motor speed feedback switch.
///
/// # Errors
///
/// Returns [`CubeError::Unsupported`] before protocol 2.1.
pub fn encode_motor_speed_feedback(
    version: &ProtocolVersion,
    enabled: bool,
) -> Result<Command, CubeError> {
    if !ConfigurationLayout::for_layout(version.layout()).motor_speed_feedback {
        return Err(unsupported("motor_speed_feedback", version));
    }
    Ok(setting(MOTOR_SPEED_FEEDBACK, &[u8::from(enabled)]))
}

/// Encode periodic attitude notifications.
///
/// # Errors
///
/// Returns [`CubeError::Unsupported`] before protocol 2.2 and
/// [`CubeError::OutOfRange`] for an interval outside `[10, 2550]` ms.
pub fn encode_attitude_control(
    version: &ProtocolVersion,
    format: AttitudeFormat,
    interval_ms: u16,
    condition: NotificationCondition,
) -> Result<Command, CubeError> {
    if !ConfigurationLayout::for_layout(version.layout()).attitude_control {
        return Err(unsupported("attitude_control", version));
    }
    let interval = duration_units("attitude interval", interval_ms, 10)?;
    Ok(setting(
        ATTITUDE_CONTROL,
        &[format.as_u8(), interval, condition.as_u8()],
    ))
}

fn setting_for(opcode: u8) -> Option<ConfigurationSetting> {
    match opcode & !RESPONSE_FLAG {
        ID_NOTIFICATION => Some(ConfigurationSetting::IdNotification),
        ID_MISSED_NOTIFICATION => Some(ConfigurationSetting::IdMissedNotification),
        MAGNET_DETECTION => Some(ConfigurationSetting::MagnetDetection),
        MOTOR_SPEED_FEEDBACK => Some(ConfigurationSetting::MotorSpeedFeedback),
        ATTITUDE_CONTROL => Some(ConfigurationSetting::AttitudeControl),
        _ => None,
    }
}

/// Decode one configuration notification.
///
/// # Errors
///
/// Returns [`DecodeError`] for empty, truncated or unknown frames.
pub fn decode(data: &[u8]) -> Result<ConfigurationReply, DecodeError> {
    let opcode = *data.first().ok_or(DecodeError::Empty)?;
    if opcode == RESPONSE_FLAG | VERSION_REQUEST {
        let r = FrameReader::new("protocol version", data);
        r.require(3)?;
        let text = String::from_utf8_lossy(&data[2..]).into_owned();
        return Ok(ConfigurationReply::Version(text));
    }
    if opcode & RESPONSE_FLAG == 0 {
        return Err(DecodeError::UnknownOpcode(opcode));
    }
    let setting = setting_for(opcode).ok_or(DecodeError::UnknownOpcode(opcode))?;
    let mut r = FrameReader::new("configuration response", data);
    r.require(3)?;
    r.u8()?;
    r.u8()?;
    let success = r.u8()? == 0x00;
    Ok(ConfigurationReply::Response(ConfigurationResponse {
        setting,
        success,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const V2_0: ProtocolVersion = ProtocolVersion::new(2, 0, 0);
    const V2_1: ProtocolVersion = ProtocolVersion::new(2, 1, 0);
    const V2_2: ProtocolVersion = ProtocolVersion::new(2, 2, 0);
    const V2_3: ProtocolVersion = ProtocolVersion::new(2, 3, 0);

    // ── Encoding ────────────────────────────────────────────────────────

    #[test]
    fn should_encode_version_request() {
        let cmd = encode_version_request();
        assert_eq!(cmd.domain(), Domain::Configuration);
        assert_eq!(cmd.bytes(), &[0x01, 0x00]);
    }

    #[test]
    fn should_encode_thresholds() {
        assert_eq!(encode_flat_threshold(10).unwrap().bytes(), &[0x05, 0x00, 0x0a]);
        assert_eq!(
            encode_collision_threshold(7).unwrap().bytes(),
            &[0x06, 0x00, 0x07]
        );
        assert_eq!(
            encode_double_tap_interval(5).unwrap().bytes(),
            &[0x17, 0x00, 0x05]
        );
    }

    #[test]
    fn should_reject_thresholds_out_of_range() {
        assert_eq!(
            encode_flat_threshold(0).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        assert_eq!(
            encode_flat_threshold(46).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        assert_eq!(
            encode_collision_threshold(11).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        assert_eq!(
            encode_double_tap_interval(8).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
    }

    #[test]
    fn should_encode_id_notification_on_2_3_only() {
        let cmd =
            encode_id_notification(&V2_3, 500, NotificationCondition::OnChangeOrEvery300Ms)
                .unwrap();
        assert_eq!(cmd.bytes(), &[0x18, 0x00, 0x32, 0xff]);

        let err = encode_id_notification(&V2_2, 500, NotificationCondition::Always).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn should_encode_id_missed_notification() {
        assert_eq!(
            encode_id_missed_notification(&V2_3, 200).unwrap().bytes(),
            &[0x19, 0x00, 0x14]
        );
        assert_eq!(
            encode_id_missed_notification(&V2_1, 200).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
    }

    #[test]
    fn should_encode_magnet_mode_only_on_2_2() {
        let cmd =
            encode_magnet_detection(&V2_2, MagnetMode::State, 100, NotificationCondition::OnChange)
                .unwrap();
        assert_eq!(cmd.bytes(), &[0x1b, 0x00, 0x01]);
    }

    #[test]
    fn should_encode_magnet_interval_and_condition_on_2_3() {
        let cmd =
            encode_magnet_detection(&V2_3, MagnetMode::Force, 100, NotificationCondition::OnChange)
                .unwrap();
        assert_eq!(cmd.bytes(), &[0x1b, 0x00, 0x02, 0x05, 0x01]);
    }

    #[test]
    fn should_reject_magnet_force_before_2_3() {
        let err =
            encode_magnet_detection(&V2_2, MagnetMode::Force, 100, NotificationCondition::Always)
                .unwrap_err();
        assert!(matches!(
            err,
            CubeError::Unsupported {
                feature: "magnet_force",
                ..
            }
        ));
    }

    #[test]
    fn should_reject_magnet_interval_below_20() {
        let err =
            encode_magnet_detection(&V2_3, MagnetMode::State, 10, NotificationCondition::Always)
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn should_encode_motor_speed_feedback_from_2_1() {
        assert_eq!(
            encode_motor_speed_feedback(&V2_1, true).unwrap().bytes(),
            &[0x1c, 0x00, 0x01]
        );
        assert_eq!(
            encode_motor_speed_feedback(&V2_0, true).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
    }

    #[test]
    fn should_encode_attitude_control() {
        let cmd = encode_attitude_control(
            &V2_2,
            AttitudeFormat::Quaternion,
            100,
            NotificationCondition::Always,
        )
        .unwrap();
        assert_eq!(cmd.bytes(), &[0x1d, 0x00, 0x02, 0x0a, 0x00]);
    }

    #[test]
    fn should_reject_attitude_interval_below_10() {
        let err =
            encode_attitude_control(&V2_3, AttitudeFormat::Euler, 5, NotificationCondition::Always)
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    // ── Decoding ────────────────────────────────────────────────────────

    #[test]
    fn should_decode_version_string() {
        let reply = decode(b"\x81\x002.1.0").unwrap();
        assert_eq!(reply, ConfigurationReply::Version("2.1.0".to_string()));
    }

    #[test]
    fn should_decode_setting_response() {
        assert_eq!(
            decode(&[0x9c, 0x00, 0x00]).unwrap(),
            ConfigurationReply::Response(ConfigurationResponse {
                setting: ConfigurationSetting::MotorSpeedFeedback,
                success: true,
            })
        );
        assert_eq!(
            decode(&[0x9b, 0x00, 0x01]).unwrap(),
            ConfigurationReply::Response(ConfigurationResponse {
                setting: ConfigurationSetting::MagnetDetection,
                success: false,
            })
        );
    }

    #[test]
    fn should_reject_unknown_and_truncated_frames() {
        assert_eq!(decode(&[0x90, 0x00, 0x00]).unwrap_err(), DecodeError::UnknownOpcode(0x90));
        assert_eq!(decode(&[0x05, 0x00]).unwrap_err(), DecodeError::UnknownOpcode(0x05));
        assert!(matches!(
            decode(&[0x98, 0x00]).unwrap_err(),
            DecodeError::Truncated { .. }
        ));
        assert!(matches!(
            decode(&[0x81, 0x00]).unwrap_err(),
            DecodeError::Truncated { .. }
        ));
    }
}
