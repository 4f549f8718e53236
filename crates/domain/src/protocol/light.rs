//! Light sub-channel: indicator LED control.
//!
//! | Opcode | Frame |
//! |--------|-------|
//! | `0x01` | all lights off |
//! | `0x03` | `03 dur 01 01 r g b` |
//! | `0x04` | `04 repeat count (dur 01 01 r g b)*` |

use serde::{Deserialize, Serialize};

use crate::channel::Domain;
use crate::command::Command;
use crate::error::CubeError;
use crate::range::{duration_units, ensure_count};

const TURN_OFF: u8 = 0x01;
const TURN_ON: u8 = 0x03;
const SCENARIO: u8 = 0x04;
const LIGHT_COUNT: u8 = 0x01;
const LIGHT_ID: u8 = 0x01;

/// Maximum number of operations in one scenario.
pub const MAX_OPERATIONS: usize = 29;

/// One lit interval of the indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightOperation {
    /// How long to stay lit, `[0, 2550]` ms; `0` keeps the light on.
    pub duration_ms: u16,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl LightOperation {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), CubeError> {
        let duration = duration_units("light duration", self.duration_ms, 0)?;
        out.extend_from_slice(&[
            duration, LIGHT_COUNT, LIGHT_ID, self.red, self.green, self.blue,
        ]);
        Ok(())
    }
}

/// Encode a single light-on command.
///
/// # Errors
///
/// Returns [`CubeError::OutOfRange`] for a duration above 2550 ms.
pub fn encode_turn_on(operation: &LightOperation) -> Result<Command, CubeError> {
    let mut bytes = vec![TURN_ON];
    operation.encode(&mut bytes)?;
    Ok(Command::new(Domain::Light, bytes))
}

/// Encode a light scenario repeated `repeat` times (`0` loops forever).
///
/// # Errors
///
/// Returns [`CubeError::OutOfRange`] for an empty scenario, more than 29
/// operations, or an operation lasting more than 2550 ms.
pub fn encode_scenario(operations: &[LightOperation], repeat: u8) -> Result<Command, CubeError> {
    ensure_count("light operations", operations, 1, MAX_OPERATIONS)?;
    let count = u8::try_from(operations.len()).unwrap_or(u8::MAX);
    let mut bytes = Vec::with_capacity(3 + operations.len() * 6);
    bytes.extend_from_slice(&[SCENARIO, repeat, count]);
    for operation in operations {
        operation.encode(&mut bytes)?;
    }
    Ok(Command::new(Domain::Light, bytes))
}

/// Encode the all-off command.
#[must_use]
pub fn encode_turn_off() -> Command {
    Command::new(Domain::Light, vec![TURN_OFF])
}
