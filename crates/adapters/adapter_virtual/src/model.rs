//! Simulated cube state and the replies it produces for written frames.

use cubelink_domain::channel::Domain;
use cubelink_domain::event::{
    AttitudeEuler, AttitudeQuaternion, MagnetForce, MotionStatus, MoveToOutcome, Orientation,
};
use cubelink_domain::protocol::sensor::MagnetMode;

/// Observable state of the virtual cube.
///
/// Tests mutate it through [`VirtualCube::update`](crate::VirtualCube::update)
/// to script what the cube reports next.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeModel {
    /// Version string answered to a version request.
    pub firmware: String,
    pub battery: u8,
    pub button_pressed: bool,
    pub motion: MotionStatus,
    /// Include the shake byte in motion frames. Protocol 2.0 firmware
    /// leaves it out.
    pub reports_shake: bool,
    pub magnet_state: u8,
    pub magnet_force: MagnetForce,
    /// Last mode written through the configuration channel.
    pub magnet_mode: MagnetMode,
    pub attitude_euler: AttitudeEuler,
    pub attitude_quaternion: AttitudeQuaternion,
    /// Outcome reported for every target move; `None` never answers.
    pub move_to_outcome: Option<MoveToOutcome>,
    /// Answer version requests at all.
    pub answers_version: bool,
}

impl Default for CubeModel {
    fn default() -> Self {
        Self {
            firmware: "2.3.0".to_owned(),
            battery: 80,
            button_pressed: false,
            motion: MotionStatus {
                is_sloped: false,
                is_collision_detected: false,
                is_double_tapped: false,
                orientation: Orientation::Top,
                shake_level: 0,
            },
            reports_shake: true,
            magnet_state: 0,
            magnet_force: MagnetForce {
                force: 0,
                direction_x: 0,
                direction_y: 0,
                direction_z: 0,
            },
            magnet_mode: MagnetMode::State,
            attitude_euler: AttitudeEuler {
                roll: 0,
                pitch: 0,
                yaw: 0,
            },
            attitude_quaternion: AttitudeQuaternion {
                w: 1.0,
                x: 0.0,
                y: 0.0,
                z: 0.0,
            },
            move_to_outcome: Some(MoveToOutcome::Success),
            answers_version: true,
        }
    }
}

impl CubeModel {
    /// Model of a cube running the given protocol version.
    #[must_use]
    pub fn with_firmware(firmware: impl Into<String>) -> Self {
        let firmware = firmware.into();
        Self {
            reports_shake: !firmware.starts_with("2.0"),
            firmware,
            ..Self::default()
        }
    }

    /// Notifications the cube sends back after `data` was written to
    /// `domain`, in order.
    pub(crate) fn respond(&mut self, domain: Domain, data: &[u8]) -> Vec<(Domain, Vec<u8>)> {
        let Some(&opcode) = data.first() else {
            return Vec::new();
        };
        match (domain, opcode) {
            (Domain::Configuration, 0x01) if self.answers_version => {
                let mut frame = vec![0x81, 0x00];
                frame.extend_from_slice(self.firmware.as_bytes());
                vec![(Domain::Configuration, frame)]
            }
            (Domain::Configuration, 0x18 | 0x19 | 0x1b | 0x1c | 0x1d) => {
                if opcode == 0x1b
                    && let Some(mode) = data.get(2).copied().and_then(magnet_mode)
                {
                    self.magnet_mode = mode;
                }
                vec![(Domain::Configuration, vec![opcode | 0x80, 0x00, 0x00])]
            }
            (Domain::Sensor, 0x81) => vec![(Domain::Sensor, self.motion_frame())],
            (Domain::Sensor, 0x82) => vec![(Domain::Sensor, self.magnet_frame())],
            (Domain::Sensor, 0x83) => data
                .get(1)
                .and_then(|format| self.attitude_frame(*format))
                .map(|frame| vec![(Domain::Sensor, frame)])
                .unwrap_or_default(),
            (Domain::Motor, 0x04) => match (data.get(1), self.move_to_outcome) {
                (Some(request_id), Some(outcome)) => {
                    vec![(Domain::Motor, vec![0x84, *request_id, outcome.as_u8()])]
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Value returned by a read of `domain`, if it is readable.
    pub(crate) fn read(&self, domain: Domain) -> Option<Vec<u8>> {
        match domain {
            Domain::Button => Some(vec![0x01, if self.button_pressed { 0x80 } else { 0x00 }]),
            Domain::Battery => Some(vec![self.battery]),
            _ => None,
        }
    }

    fn motion_frame(&self) -> Vec<u8> {
        let motion = &self.motion;
        let mut frame = vec![
            0x01,
            u8::from(!motion.is_sloped),
            u8::from(motion.is_collision_detected),
            u8::from(motion.is_double_tapped),
            motion.orientation.as_u8(),
        ];
        if self.reports_shake {
            frame.push(motion.shake_level);
        }
        frame
    }

    fn magnet_frame(&self) -> Vec<u8> {
        let mut frame = vec![0x02, self.magnet_state];
        if self.magnet_mode == MagnetMode::Force {
            let force = &self.magnet_force;
            frame.extend_from_slice(&[
                force.force,
                force.direction_x.to_le_bytes()[0],
                force.direction_y.to_le_bytes()[0],
                force.direction_z.to_le_bytes()[0],
            ]);
        }
        frame
    }

    fn attitude_frame(&self, format: u8) -> Option<Vec<u8>> {
        let mut frame = vec![0x03, format];
        match format {
            0x01 => {
                let euler = &self.attitude_euler;
                for value in [euler.roll, euler.pitch, euler.yaw] {
                    frame.extend_from_slice(&value.to_le_bytes());
                }
            }
            0x02 => {
                let quat = &self.attitude_quaternion;
                for value in [quat.w, quat.x, quat.y, quat.z] {
                    frame.extend_from_slice(&value.to_le_bytes());
                }
            }
            _ => return None,
        }
        Some(frame)
    }
}

fn magnet_mode(raw: u8) -> Option<MagnetMode> {
    match raw {
        0x00 => Some(MagnetMode::Disabled),
        0x01 => Some(MagnetMode::State),
        0x02 => Some(MagnetMode::Force),
        _ => None,
    }
}
