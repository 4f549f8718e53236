//! Per-domain command codecs and notification decoders.
//!
//! Each submodule owns the byte layouts of one sub-channel. Encoders
//! validate parameters and return a [`Command`](crate::command::Command);
//! decoders return typed payloads or a [`DecodeError`](crate::error::DecodeError)
//! and ignore any trailing bytes a newer firmware may append.
//!
//! | Module | Sub-channel | Encodes | Decodes |
//! |--------|-------------|---------|---------|
//! | [`motion_id`] | ID | - | position / standard ID |
//! | [`motor`] | motor | move, target move, acceleration move | responses, speed |
//! | [`light`] | light | on, scenario, off | - |
//! | [`sound`] | sound | preset, melody, stop | - |
//! | [`sensor`] | sensor | status requests | motion, magnet, attitude |
//! | [`button`] | button | - | press state |
//! | [`battery`] | battery | - | level |
//! | [`configuration`] | configuration | version request, settings | version, acks |

mod frame;

pub mod battery;
pub mod button;
pub mod configuration;
pub mod light;
pub mod motion_id;
pub mod motor;
pub mod sensor;
pub mod sound;

pub use frame::FrameReader;
