//! Events: decoded notifications published to listeners.
//!
//! Every event carries an [`EventName`] from a closed vocabulary. Listeners
//! subscribe by name; one decoded frame publishes at most one event per name.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::RequestId;

/// Closed vocabulary of event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventName {
    PositionSampled,
    PositionLost,
    StandardIdSampled,
    StandardIdLost,
    Slope,
    Collision,
    DoubleTap,
    Orientation,
    ShakeLevel,
    MagnetState,
    MagnetForce,
    AttitudeEuler,
    AttitudeQuaternion,
    ButtonState,
    BatteryLevel,
    MotorCommandResponse,
    MotorSpeed,
    ConfigurationResponse,
}

impl EventName {
    /// Kebab-case wire name, e.g. `"position-sampled"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PositionSampled => "position-sampled",
            Self::PositionLost => "position-lost",
            Self::StandardIdSampled => "standard-id-sampled",
            Self::StandardIdLost => "standard-id-lost",
            Self::Slope => "slope",
            Self::Collision => "collision",
            Self::DoubleTap => "double-tap",
            Self::Orientation => "orientation",
            Self::ShakeLevel => "shake-level",
            Self::MagnetState => "magnet-state",
            Self::MagnetForce => "magnet-force",
            Self::AttitudeEuler => "attitude-euler",
            Self::AttitudeQuaternion => "attitude-quaternion",
            Self::ButtonState => "button-state",
            Self::BatteryLevel => "battery-level",
            Self::MotorCommandResponse => "motor-command-response",
            Self::MotorSpeed => "motor-speed",
            Self::ConfigurationResponse => "configuration-response",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position read from the mat under the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionId {
    /// Cube centre X coordinate.
    pub x: u16,
    /// Cube centre Y coordinate.
    pub y: u16,
    /// Cube angle in degrees.
    pub angle: u16,
    /// Optical sensor X coordinate.
    pub sensor_x: u16,
    /// Optical sensor Y coordinate.
    pub sensor_y: u16,
    /// Optical sensor angle in degrees.
    pub sensor_angle: u16,
}

/// Standard ID printed on a card or sticker under the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardId {
    pub id: u32,
    pub angle: u16,
}

/// Which face of the cube points up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    Top,
    Bottom,
    Back,
    Front,
    Right,
    Left,
}

impl Orientation {
    /// Decode the posture byte (1–6).
    #[must_use]
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Top),
            2 => Some(Self::Bottom),
            3 => Some(Self::Back),
            4 => Some(Self::Front),
            5 => Some(Self::Right),
            6 => Some(Self::Left),
            _ => None,
        }
    }

    /// Posture byte sent by the cube.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Top => 1,
            Self::Bottom => 2,
            Self::Back => 3,
            Self::Front => 4,
            Self::Right => 5,
            Self::Left => 6,
        }
    }
}

/// Snapshot of the motion detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionStatus {
    pub is_sloped: bool,
    pub is_collision_detected: bool,
    pub is_double_tapped: bool,
    pub orientation: Orientation,
    /// Shake level 0–10. Always 0 on firmware without shake detection.
    pub shake_level: u8,
}

/// Magnetic force and direction, reported in force mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnetForce {
    pub force: u8,
    pub direction_x: i8,
    pub direction_y: i8,
    pub direction_z: i8,
}

/// Attitude as Euler angles, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttitudeEuler {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
}

/// Attitude as a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttitudeQuaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Result code of a target move, as reported by the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveToOutcome {
    /// Target reached.
    Success,
    /// The cube gave up after its own timeout.
    Timeout,
    /// The cube left the mat.
    IdMissed,
    /// Target and options could not be combined.
    InvalidParameters,
    /// The cube was in a state that refused the move.
    InvalidState,
    /// Superseded by a newer target move.
    Overwritten,
    /// Firmware does not implement this move.
    NotSupported,
    /// The cube's target queue is full.
    QueueFull,
}

impl MoveToOutcome {
    /// Decode a result byte.
    #[must_use]
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(Self::Success),
            0x01 => Some(Self::Timeout),
            0x02 => Some(Self::IdMissed),
            0x03 => Some(Self::InvalidParameters),
            0x04 => Some(Self::InvalidState),
            0x05 => Some(Self::Overwritten),
            0x06 => Some(Self::NotSupported),
            0x07 => Some(Self::QueueFull),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::Timeout => 0x01,
            Self::IdMissed => 0x02,
            Self::InvalidParameters => 0x03,
            Self::InvalidState => 0x04,
            Self::Overwritten => 0x05,
            Self::NotSupported => 0x06,
            Self::QueueFull => 0x07,
        }
    }
}

/// Response to a single- or multi-target move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorResponse {
    pub request_id: RequestId,
    /// `true` for the multi-target opcode.
    pub multiple_targets: bool,
    pub outcome: MoveToOutcome,
}

/// Wheel speeds reported when speed feedback is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorSpeed {
    pub left: u8,
    pub right: u8,
}

/// Setting acknowledged by the configuration channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigurationSetting {
    IdNotification,
    IdMissedNotification,
    MagnetDetection,
    MotorSpeedFeedback,
    AttitudeControl,
}

/// Acknowledgement of a configuration write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationResponse {
    pub setting: ConfigurationSetting,
    pub success: bool,
}

/// A decoded notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum CubeEvent {
    PositionSampled(PositionId),
    PositionLost,
    StandardIdSampled(StandardId),
    StandardIdLost,
    Slope { is_sloped: bool },
    Collision { is_collision_detected: bool },
    DoubleTap { is_double_tapped: bool },
    Orientation(Orientation),
    ShakeLevel(u8),
    MagnetState { id: u8 },
    MagnetForce(MagnetForce),
    AttitudeEuler(AttitudeEuler),
    AttitudeQuaternion(AttitudeQuaternion),
    ButtonState { pressed: bool },
    BatteryLevel(u8),
    MotorCommandResponse(MotorResponse),
    MotorSpeed(MotorSpeed),
    ConfigurationResponse(ConfigurationResponse),
}

impl CubeEvent {
    /// Name listeners subscribe to for this event.
    #[must_use]
    pub fn name(&self) -> EventName {
        match self {
            Self::PositionSampled(_) => EventName::PositionSampled,
            Self::PositionLost => EventName::PositionLost,
            Self::StandardIdSampled(_) => EventName::StandardIdSampled,
            Self::StandardIdLost => EventName::StandardIdLost,
            Self::Slope { .. } => EventName::Slope,
            Self::Collision { .. } => EventName::Collision,
            Self::DoubleTap { .. } => EventName::DoubleTap,
            Self::Orientation(_) => EventName::Orientation,
            Self::ShakeLevel(_) => EventName::ShakeLevel,
            Self::MagnetState { .. } => EventName::MagnetState,
            Self::MagnetForce(_) => EventName::MagnetForce,
            Self::AttitudeEuler(_) => EventName::AttitudeEuler,
            Self::AttitudeQuaternion(_) => EventName::AttitudeQuaternion,
            Self::ButtonState { .. } => EventName::ButtonState,
            Self::BatteryLevel(_) => EventName::BatteryLevel,
            Self::MotorCommandResponse(_) => EventName::MotorCommandResponse,
            Self::MotorSpeed(_) => EventName::MotorSpeed,
            Self::ConfigurationResponse(_) => EventName::ConfigurationResponse,
        }
    }
}

impl MotionStatus {
    /// Split a motion snapshot into one event per facet.
    #[must_use]
    pub fn into_events(self) -> [CubeEvent; 5] {
        [
            CubeEvent::Slope {
                is_sloped: self.is_sloped,
            },
            CubeEvent::Collision {
                is_collision_detected: self.is_collision_detected,
            },
            CubeEvent::DoubleTap {
                is_double_tapped: self.is_double_tapped,
            },
            CubeEvent::Orientation(self.orientation),
            CubeEvent::ShakeLevel(self.shake_level),
        ]
    }
}
