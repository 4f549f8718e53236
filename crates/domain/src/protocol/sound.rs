//! Sound sub-channel: preset sound effects and melodies.
//!
//! | Opcode | Frame |
//! |--------|-------|
//! | `0x01` | stop playback |
//! | `0x02` | `02 id volume` |
//! | `0x03` | `03 repeat count (dur note volume)*` |

use serde::{Deserialize, Serialize};

use crate::channel::Domain;
use crate::command::Command;
use crate::error::CubeError;
use crate::range::{duration_units, ensure_count, ensure_range};

const STOP: u8 = 0x01;
const PRESET: u8 = 0x02;
const MELODY: u8 = 0x03;
const FULL_VOLUME: u8 = 0xff;

/// Highest preset sound id.
pub const MAX_SOUND_ID: u8 = 10;
/// Note number meaning "silence".
pub const REST: u8 = 128;
/// Maximum number of notes in one melody.
pub const MAX_OPERATIONS: usize = 59;

/// One note of a melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundOperation {
    /// Note length, `[10, 2550]` ms.
    pub duration_ms: u16,
    /// MIDI note number `[0, 127]`, or [`REST`].
    pub note: u8,
}

/// Encode a preset sound effect.
///
/// # Errors
///
/// Returns [`CubeError::OutOfRange`] for an id above 10.
pub fn encode_preset(sound_id: u8) -> Result<Command, CubeError> {
    let sound_id = ensure_range("sound id", sound_id, 0, MAX_SOUND_ID)?;
    Ok(Command::new(Domain::Sound, vec![PRESET, sound_id, FULL_VOLUME]))
}

/// Encode a melody repeated `repeat` times (`0` loops forever).
///
/// # Errors
///
/// Returns [`CubeError::OutOfRange`] for an empty or oversized melody, a
/// note above 128 or a note length outside `[10, 2550]` ms.
pub fn encode_melody(operations: &[SoundOperation], repeat: u8) -> Result<Command, CubeError> {
    ensure_count("sound operations", operations, 1, MAX_OPERATIONS)?;
    let count = u8::try_from(operations.len()).unwrap_or(u8::MAX);
    let mut bytes = Vec::with_capacity(3 + operations.len() * 3);
    bytes.extend_from_slice(&[MELODY, repeat, count]);
    for operation in operations {
        let duration = duration_units("note duration", operation.duration_ms, 10)?;
        let note = ensure_range("note", operation.note, 0, REST)?;
        bytes.extend_from_slice(&[duration, note, FULL_VOLUME]);
    }
    Ok(Command::new(Domain::Sound, bytes))
}

/// Encode the stop command.
#[must_use]
pub fn encode_stop() -> Command {
    Command::new(Domain::Sound, vec![STOP])
}
